//! Load and write options
//!
//! `Options` is the context threaded through every read and write: plugin
//! string hints for serializers, arbitrary objects attached by the caller
//! (a cache bin, for instance) and the reader/writer registry used to
//! resolve external references. Cloning is shallow.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::loader::ReaderWriterRegistry;

/// Plugin string key controlling how images are written
pub const WRITE_IMAGE_HINT: &str = "WriteImageHint";

/// Value of [`WRITE_IMAGE_HINT`] forcing full pixel data into the output
pub const INCLUDE_DATA: &str = "IncludeData";

/// Read/write context
#[derive(Clone, Default)]
pub struct Options {
    plugin_string_data: BTreeMap<String, String>,
    objects: BTreeMap<TypeId, Arc<dyn Any + Send + Sync>>,
    registry: Option<Arc<ReaderWriterRegistry>>,
}

impl Options {
    /// Create empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Shallow copy of `options`, or fresh options when there are none
    pub fn clone_or_create(options: Option<&Options>) -> Self {
        options.cloned().unwrap_or_default()
    }

    /// Set a plugin string hint
    pub fn set_plugin_string_data(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.plugin_string_data.insert(key.into(), value.into());
    }

    /// Get a plugin string hint
    pub fn plugin_string_data(&self, key: &str) -> Option<&str> {
        self.plugin_string_data.get(key).map(|s| s.as_str())
    }

    /// Remove a plugin string hint
    pub fn remove_plugin_string_data(&mut self, key: &str) -> Option<String> {
        self.plugin_string_data.remove(key)
    }

    /// Whether serializers must embed full image data
    pub fn include_image_data(&self) -> bool {
        self.plugin_string_data(WRITE_IMAGE_HINT) == Some(INCLUDE_DATA)
    }

    /// Attach an object, replacing any previous object of the same type
    pub fn insert_object<T: Any + Send + Sync>(&mut self, object: T) {
        self.objects.insert(TypeId::of::<T>(), Arc::new(object));
    }

    /// Get an attached object by type
    pub fn get_object<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.objects.get(&TypeId::of::<T>())?.downcast_ref::<T>()
    }

    /// Detach an object by type
    pub fn remove_object<T: Any + Send + Sync>(&mut self) -> bool {
        self.objects.remove(&TypeId::of::<T>()).is_some()
    }

    /// Builder-style registry
    pub fn with_registry(mut self, registry: Arc<ReaderWriterRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn set_registry(&mut self, registry: Option<Arc<ReaderWriterRegistry>>) {
        self.registry = registry;
    }

    /// Registry used to resolve external references
    pub fn registry(&self) -> Option<&Arc<ReaderWriterRegistry>> {
        self.registry.as_ref()
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("plugin_string_data", &self.plugin_string_data)
            .field("objects", &self.objects.len())
            .field("registry", &self.registry.is_some())
            .finish()
    }
}
