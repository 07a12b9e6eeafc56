//! Image resources
//!
//! Pixel data plus the file name it was loaded from. The file name doubles
//! as a reference carrier: once an image is moved into a cache bin, the name
//! is rewritten to point at the cache entry instead of the original file.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::user_data::{impl_user_data_holder, UserData};

/// Shared, lockable image handle
pub type ImageRef = Arc<RwLock<Image>>;

/// Pixel layout of image data
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit single channel
    Luminance8,
    /// 8-bit RGB
    Rgb8,
    /// 8-bit RGBA
    Rgba8,
}

impl PixelFormat {
    /// Bytes used by one pixel
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Luminance8 => 1,
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }
}

/// How a serializer should store an image found inside a graph
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WriteHint {
    /// Serializer decides (stores pixels inline)
    #[default]
    NoPreference,
    /// Always store pixels inline
    StoreInline,
    /// Store only the file name; pixels live elsewhere
    ExternalFile,
}

/// An image resource
#[derive(Clone)]
pub struct Image {
    file_name: String,
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
    write_hint: WriteHint,
    user_data: Option<UserData>,
}

impl_user_data_holder!(Image);

impl Image {
    /// Create an image from raw pixel data
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            file_name: String::new(),
            width,
            height,
            format,
            data,
            write_hint: WriteHint::NoPreference,
            user_data: None,
        }
    }

    /// An image with a name but no pixels (an unresolved reference)
    pub fn placeholder(file_name: impl Into<String>) -> Self {
        Self::new(0, 0, PixelFormat::Rgba8, Vec::new()).with_file_name(file_name)
    }

    /// Builder-style file name
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    /// Builder-style write hint
    pub fn with_write_hint(mut self, hint: WriteHint) -> Self {
        self.write_hint = hint;
        self
    }

    /// Builder-style user data
    pub fn with_user_data(mut self, data: UserData) -> Self {
        self.user_data = Some(data);
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn set_file_name(&mut self, file_name: impl Into<String>) {
        self.file_name = file_name.into();
    }

    pub fn write_hint(&self) -> WriteHint {
        self.write_hint
    }

    pub fn set_write_hint(&mut self, hint: WriteHint) {
        self.write_hint = hint;
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Raw pixel bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// True when the image holds no pixels
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the data length matches the dimensions and format
    pub fn is_consistent(&self) -> bool {
        self.data.len() == self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// Wrap into a shared handle
    pub fn into_ref(self) -> ImageRef {
        Arc::new(RwLock::new(self))
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("file_name", &self.file_name)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .field("write_hint", &self.write_hint)
            .field("user_data", &self.user_data.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user_data::{UserDataContainer, UserDataHolder};

    #[test]
    fn test_consistency() {
        let image = Image::new(2, 2, PixelFormat::Rgb8, vec![0; 12]);
        assert!(image.is_consistent());

        let short = Image::new(2, 2, PixelFormat::Rgba8, vec![0; 12]);
        assert!(!short.is_consistent());
    }

    #[test]
    fn test_placeholder() {
        let image = Image::placeholder("missing.png");
        assert!(image.is_empty());
        assert_eq!(image.file_name(), "missing.png");
        assert_eq!(image.write_hint(), WriteHint::NoPreference);
    }

    #[test]
    fn test_take_user_data() {
        let mut image = Image::new(1, 1, PixelFormat::Luminance8, vec![9])
            .with_user_data(UserDataContainer::new().with("marker", 1u32).into_shared());

        assert!(image.has_user_data());
        let taken = image.take_user_data();
        assert!(taken.is_some());
        assert!(!image.has_user_data());
    }
}
