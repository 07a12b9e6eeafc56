//! # void_scene - Scene Graph Model
//!
//! The in-memory scene graph shared by the renderer, loaders and caches:
//! - [`Node`] trees (groups, transforms, geodes with drawables)
//! - [`StateSet`] render state with per-unit texture attributes
//! - Shared [`Texture`] and [`Image`] resources (`Arc<RwLock<_>>` handles)
//! - [`UserDataContainer`] for transient, non-serializable annotations
//! - Visitor traversal ([`NodeVisitor`], [`TextureAndImageVisitor`])
//!
//! ## Example
//!
//! ```ignore
//! use void_scene::prelude::*;
//!
//! let image = Image::new(1, 1, PixelFormat::Rgba8, vec![255; 4])
//!     .with_file_name("textures/grass.png")
//!     .into_ref();
//!
//! let mut state = StateSet::new();
//! state.set_texture_attribute(0, Texture::new("grass").with_image(image).into_ref(), StateValue::ON);
//!
//! let root = Node::group("terrain")
//!     .with_child(Node::geode("tile").with_state_set(state));
//! ```

pub mod user_data;
pub mod image;
pub mod texture;
pub mod state;
pub mod node;
pub mod visitor;

pub use image::{Image, ImageRef, PixelFormat, WriteHint};
pub use node::{Drawable, Geometry, Node, NodeKind, IDENTITY, NODE_MASK_ALL};
pub use state::{
    AttributeEntry, AttributeList, AttributeSlot, AttributeType, GenericAttribute, StateAttribute,
    StateSet, StateValue,
};
pub use texture::{FilterMode, Texture, TextureRef, WrapMode};
pub use user_data::{UserData, UserDataContainer, UserDataHolder};
pub use visitor::{visit_textures_and_images, NodeVisitor, TextureAndImageVisitor};

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::image::{Image, ImageRef, PixelFormat, WriteHint};
    pub use crate::node::{Drawable, Geometry, Node, NodeKind};
    pub use crate::state::{AttributeType, GenericAttribute, StateAttribute, StateSet, StateValue};
    pub use crate::texture::{Texture, TextureRef};
    pub use crate::user_data::{UserDataContainer, UserDataHolder};
    pub use crate::visitor::{NodeVisitor, TextureAndImageVisitor};
}
