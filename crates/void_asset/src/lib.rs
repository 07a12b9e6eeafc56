//! # void_asset - Resource Reading and Writing
//!
//! Pluggable resource I/O:
//! - [`ReaderWriterRegistry`] dispatching by file extension
//! - [`Options`] carrying serializer hints, attached objects and the registry
//! - A versioned binary codec for scene graphs and images ([`codec`])
//! - [`FileImageReaderWriter`] for PNG/JPG/BMP on disk
//!
//! ## Example
//!
//! ```ignore
//! use void_asset::prelude::*;
//!
//! let mut registry = ReaderWriterRegistry::new();
//! registry.register(FileImageReaderWriter::new());
//!
//! let options = Options::new().with_registry(std::sync::Arc::new(registry));
//! let bytes = encode_node(&root, Some(&options))?;
//! let copy = decode_node(&bytes, Some(&options))?;
//! ```

pub mod codec;
pub mod file;
pub mod loader;
pub mod options;

pub use codec::{decode_image, decode_node, encode_image, encode_node, CodecError, CodecResult, FORMAT_VERSION};
pub use file::FileImageReaderWriter;
pub use loader::{
    lower_case_file_extension, name_less_extension, LoadError, LoadResult, Object, ReaderWriter,
    ReaderWriterRegistry,
};
pub use options::{Options, INCLUDE_DATA, WRITE_IMAGE_HINT};

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::codec::{decode_image, decode_node, encode_image, encode_node, CodecError};
    pub use crate::file::FileImageReaderWriter;
    pub use crate::loader::{LoadError, LoadResult, Object, ReaderWriter, ReaderWriterRegistry};
    pub use crate::options::Options;
}
