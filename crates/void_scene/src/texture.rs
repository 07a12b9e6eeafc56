//! Texture attributes
//!
//! Textures are shared: the same `TextureRef` is commonly referenced from
//! many state sets and from live engine threads (resource compilers, the
//! renderer). Code that wants to change a texture it does not own must work
//! on a [`Texture::shallow_clone`] instead.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::image::ImageRef;
use crate::user_data::{impl_user_data_holder, UserData};

/// Shared, lockable texture handle
pub type TextureRef = Arc<RwLock<Texture>>;

/// Texture filtering
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
    LinearMipmapLinear,
}

/// Texture coordinate wrapping
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WrapMode {
    #[default]
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

/// A texture attribute owning zero or more images
#[derive(Clone, Debug)]
pub struct Texture {
    name: String,
    min_filter: FilterMode,
    mag_filter: FilterMode,
    wrap_s: WrapMode,
    wrap_t: WrapMode,
    /// Release image memory once the texture is uploaded
    unref_image_data_after_apply: bool,
    images: Vec<ImageRef>,
    user_data: Option<UserData>,
}

impl_user_data_holder!(Texture);

impl Default for Texture {
    fn default() -> Self {
        Self {
            name: String::new(),
            min_filter: FilterMode::LinearMipmapLinear,
            mag_filter: FilterMode::Linear,
            wrap_s: WrapMode::ClampToEdge,
            wrap_t: WrapMode::ClampToEdge,
            unref_image_data_after_apply: true,
            images: Vec::new(),
            user_data: None,
        }
    }
}

impl Texture {
    /// Create an empty texture
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder-style image
    pub fn with_image(mut self, image: ImageRef) -> Self {
        self.images.push(image);
        self
    }

    /// Builder-style user data
    pub fn with_user_data(mut self, data: UserData) -> Self {
        self.user_data = Some(data);
        self
    }

    /// Builder-style filtering
    pub fn with_filters(mut self, min: FilterMode, mag: FilterMode) -> Self {
        self.min_filter = min;
        self.mag_filter = mag;
        self
    }

    /// Builder-style wrapping
    pub fn with_wrap(mut self, s: WrapMode, t: WrapMode) -> Self {
        self.wrap_s = s;
        self.wrap_t = t;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filters(&self) -> (FilterMode, FilterMode) {
        (self.min_filter, self.mag_filter)
    }

    pub fn wrap(&self) -> (WrapMode, WrapMode) {
        (self.wrap_s, self.wrap_t)
    }

    pub fn unref_image_data_after_apply(&self) -> bool {
        self.unref_image_data_after_apply
    }

    pub fn set_unref_image_data_after_apply(&mut self, unref: bool) {
        self.unref_image_data_after_apply = unref;
    }

    /// Image handles owned by this texture
    pub fn images(&self) -> &[ImageRef] {
        &self.images
    }

    /// Number of images
    pub fn num_images(&self) -> usize {
        self.images.len()
    }

    /// Image at an index
    pub fn image(&self, index: usize) -> Option<&ImageRef> {
        self.images.get(index)
    }

    /// Append an image
    pub fn add_image(&mut self, image: ImageRef) {
        self.images.push(image);
    }

    /// Shallow copy.
    ///
    /// The copy shares image handles and the user data container with
    /// `self`; only the texture object itself is new.
    pub fn shallow_clone(&self) -> Texture {
        self.clone()
    }

    /// Wrap into a shared handle
    pub fn into_ref(self) -> TextureRef {
        Arc::new(RwLock::new(self))
    }
}
