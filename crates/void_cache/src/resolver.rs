//! Read-side routing of cache references
//!
//! Images in a cached graph are named `"<key>.osgearth_cachebin"`. While the
//! graph is decoded, those names are loaded through the reader/writer
//! registry; [`CacheBinReaderWriter`] claims the extension and reads the
//! record from the cache bin attached to the read options.

use std::sync::Arc;

use void_asset::{
    lower_case_file_extension, name_less_extension, FileImageReaderWriter, LoadError, LoadResult, Object, Options,
    ReaderWriter, ReaderWriterRegistry,
};
use void_scene::Image;

use crate::bin::{CacheBin, CacheBinOptionsExt};
use crate::error::ReadResult;
use crate::key::CACHE_BIN_EXTENSION;

/// Reader for `.osgearth_cachebin` references
#[derive(Debug, Default)]
pub struct CacheBinReaderWriter;

impl CacheBinReaderWriter {
    pub fn new() -> Self {
        Self
    }

    /// Register with a registry
    pub fn register(registry: &mut ReaderWriterRegistry) {
        registry.register(Self);
    }

    fn resolve<T>(
        &self,
        url: &str,
        options: Option<&Options>,
        read: impl FnOnce(&dyn CacheBin, &str) -> ReadResult<T>,
    ) -> LoadResult<T> {
        if lower_case_file_extension(url).as_deref() != Some(CACHE_BIN_EXTENSION) {
            return Err(LoadError::NotHandled(url.to_string()));
        }

        let Some(bin) = options.and_then(|o| o.cache_bin()) else {
            log::debug!("[CacheBinReaderWriter] No cache bin in options for \"{}\"", url);
            return Err(LoadError::NotFound(url.to_string()));
        };

        let key = name_less_extension(url);
        log::debug!("[CacheBinReaderWriter] Reading \"{}\"", key);

        read(bin.as_ref(), key).map_err(|e| {
            log::debug!("[CacheBinReaderWriter] \"{}\" not available: {}", key, e);
            LoadError::NotFound(url.to_string())
        })
    }
}

impl ReaderWriter for CacheBinReaderWriter {
    fn extensions(&self) -> &[&str] {
        &[CACHE_BIN_EXTENSION]
    }

    fn description(&self) -> &str {
        "Cache bin references"
    }

    fn read_object(&self, url: &str, options: Option<&Options>) -> LoadResult<Object> {
        self.resolve(url, options, |bin, key| bin.read_object(key, options))
    }

    fn read_image(&self, url: &str, options: Option<&Options>) -> LoadResult<Image> {
        self.resolve(url, options, |bin, key| bin.read_image(key, options))
    }
}

/// Read options able to load graphs written to `bin`.
///
/// The registry resolves cache references first and falls back to image
/// files on disk for anything that was never externalized.
pub fn read_options(bin: Arc<dyn CacheBin>) -> Options {
    let mut registry = ReaderWriterRegistry::new();
    CacheBinReaderWriter::register(&mut registry);
    registry.register(FileImageReaderWriter::new());

    Options::new().with_registry(Arc::new(registry)).with_cache_bin(bin)
}
