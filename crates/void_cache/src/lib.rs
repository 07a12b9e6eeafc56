//! # void_cache - Scene Graph Cache Bins
//!
//! Persist scene graphs and reload them later:
//! - [`CacheBin`] key/value stores ([`MemoryCacheBin`], [`FileSystemCacheBin`])
//! - [`CacheBin::write_node`] sanitizes a graph, stores each referenced
//!   image once under a derived key and then stores the graph
//! - [`CacheBinReaderWriter`] routes `"<key>.osgearth_cachebin"` references
//!   back to the bin while a cached graph is decoded
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use void_cache::prelude::*;
//!
//! let bin: Arc<dyn CacheBin> = Arc::new(FileSystemCacheBin::from_config(&CacheConfig::default())?);
//! bin.write_node("tile_7_12", &mut root, &Metadata::new(), None);
//!
//! let options = read_options(bin.clone());
//! let tile = bin.read_object("tile_7_12", Some(&options))?.into_node();
//! ```

pub mod bin;
pub mod config;
pub mod error;
pub mod externalize;
pub mod filesystem;
pub mod key;
pub mod memory;
pub mod prepare;
pub mod resolver;

pub use bin::{
    BinStats, CacheBin, CacheBinHandle, CacheBinOptionsExt, Metadata, Payload, PayloadKind, RecordStatus,
    StoredRecord, DEFAULT_CLONE_LOCK_TIMEOUT,
};
pub use config::CacheConfig;
pub use error::{CacheError, ConfigError, ReadResult};
pub use externalize::{ExternalizeStats, WriteExternalReferences};
pub use filesystem::FileSystemCacheBin;
pub use key::{cache_reference, hash_string, image_cache_key, is_cache_key, CACHE_BIN_EXTENSION, IMAGE_PREFIX};
pub use memory::MemoryCacheBin;
pub use prepare::PrepareForCaching;
pub use resolver::{read_options, CacheBinReaderWriter};

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::bin::{CacheBin, CacheBinOptionsExt, Metadata, RecordStatus};
    pub use crate::config::CacheConfig;
    pub use crate::error::{CacheError, ReadResult};
    pub use crate::filesystem::FileSystemCacheBin;
    pub use crate::memory::MemoryCacheBin;
    pub use crate::resolver::{read_options, CacheBinReaderWriter};
}
