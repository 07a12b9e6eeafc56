//! Reader/Writer registry - Pluggable resource loading
//!
//! Reader/writers are registered by the file extensions they understand.
//! A read request is routed to every reader/writer registered for the
//! extension of the requested URL until one of them handles it. A
//! reader/writer that does not recognise a request answers
//! [`LoadError::NotHandled`] so the next candidate gets a chance.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use void_scene::{Image, Node};

use crate::options::Options;

/// Error during resource loading
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The reader/writer recognised the request but the resource does not exist
    #[error("Resource not found: {0}")]
    NotFound(String),
    /// No reader/writer accepted the request
    #[error("Not handled: {0}")]
    NotHandled(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(String),
    /// Decode/encode error
    #[error("Parse error: {0}")]
    Parse(String),
    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for resource loading
pub type LoadResult<T> = Result<T, LoadError>;

/// A generically loaded resource
#[derive(Clone, Debug)]
pub enum Object {
    Node(Node),
    Image(Image),
}

impl Object {
    pub fn into_node(self) -> Option<Node> {
        match self {
            Self::Node(node) => Some(node),
            Self::Image(_) => None,
        }
    }

    pub fn into_image(self) -> Option<Image> {
        match self {
            Self::Image(image) => Some(image),
            Self::Node(_) => None,
        }
    }
}

/// Trait for reader/writers
pub trait ReaderWriter: Send + Sync {
    /// File extensions this reader/writer handles (lowercase, without dot)
    fn extensions(&self) -> &[&str];

    /// Human-readable description
    fn description(&self) -> &str {
        ""
    }

    /// Load a generic object
    fn read_object(&self, url: &str, _options: Option<&Options>) -> LoadResult<Object> {
        Err(LoadError::NotHandled(url.to_string()))
    }

    /// Load an image
    fn read_image(&self, url: &str, _options: Option<&Options>) -> LoadResult<Image> {
        Err(LoadError::NotHandled(url.to_string()))
    }

    /// Write an image
    fn write_image(&self, _image: &Image, url: &str, _options: Option<&Options>) -> LoadResult<()> {
        Err(LoadError::NotHandled(url.to_string()))
    }

    /// Whether `url` carries one of this reader/writer's extensions
    fn accepts_extension(&self, url: &str) -> bool {
        match lower_case_file_extension(url) {
            Some(ext) => self.extensions().iter().any(|e| *e == ext),
            None => false,
        }
    }
}

/// Lowercase extension of a URL, without the dot
pub fn lower_case_file_extension(url: &str) -> Option<String> {
    Path::new(url)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// A URL with its final extension removed
pub fn name_less_extension(url: &str) -> &str {
    match url.rfind('.') {
        Some(dot) if !url[dot..].contains(|c: char| c == '/' || c == '\\') => &url[..dot],
        _ => url,
    }
}

/// Registry of reader/writers
#[derive(Default)]
pub struct ReaderWriterRegistry {
    /// Reader/writers by extension -> list of indices into all
    by_extension: BTreeMap<String, Vec<usize>>,
    /// All registered reader/writers
    all: Vec<Arc<dyn ReaderWriter>>,
}

impl ReaderWriterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reader/writer
    pub fn register<R: ReaderWriter + 'static>(&mut self, reader_writer: R) {
        self.register_arc(Arc::new(reader_writer));
    }

    /// Register a shared reader/writer
    pub fn register_arc(&mut self, reader_writer: Arc<dyn ReaderWriter>) {
        let idx = self.all.len();
        for &ext in reader_writer.extensions() {
            self.by_extension.entry(ext.to_lowercase()).or_default().push(idx);
        }
        log::debug!(
            "Registered reader/writer \"{}\" for {:?}",
            reader_writer.description(),
            reader_writer.extensions()
        );
        self.all.push(reader_writer);
    }

    /// Check if an extension is supported
    pub fn supports_extension(&self, ext: &str) -> bool {
        self.by_extension.contains_key(&ext.to_lowercase())
    }

    /// Get all registered extensions
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.by_extension.keys().map(|s| s.as_str())
    }

    /// Number of registered reader/writers
    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Load a generic object
    pub fn read_object(&self, url: &str, options: Option<&Options>) -> LoadResult<Object> {
        self.dispatch(url, |rw| rw.read_object(url, options))
    }

    /// Load an image
    pub fn read_image(&self, url: &str, options: Option<&Options>) -> LoadResult<Image> {
        self.dispatch(url, |rw| rw.read_image(url, options))
    }

    /// Write an image
    pub fn write_image(&self, image: &Image, url: &str, options: Option<&Options>) -> LoadResult<()> {
        self.dispatch(url, |rw| rw.write_image(image, url, options))
    }

    /// Try each reader/writer for the URL's extension until one handles it
    fn dispatch<T>(
        &self,
        url: &str,
        op: impl Fn(&dyn ReaderWriter) -> LoadResult<T>,
    ) -> LoadResult<T> {
        let ext = lower_case_file_extension(url)
            .ok_or_else(|| LoadError::UnsupportedFormat(format!("No file extension: {}", url)))?;

        let indices = self
            .by_extension
            .get(&ext)
            .ok_or_else(|| LoadError::NotHandled(url.to_string()))?;

        for &idx in indices {
            match op(self.all[idx].as_ref()) {
                Err(LoadError::NotHandled(_)) => continue,
                result => return result,
            }
        }

        Err(LoadError::NotHandled(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use void_scene::PixelFormat;

    struct SolidColor;

    impl ReaderWriter for SolidColor {
        fn extensions(&self) -> &[&str] {
            &["solid"]
        }

        fn read_image(&self, url: &str, _options: Option<&Options>) -> LoadResult<Image> {
            if url.starts_with("missing") {
                return Err(LoadError::NotFound(url.to_string()));
            }
            Ok(Image::new(1, 1, PixelFormat::Rgba8, vec![255, 0, 0, 255]).with_file_name(url))
        }
    }

    struct Declines;

    impl ReaderWriter for Declines {
        fn extensions(&self) -> &[&str] {
            &["solid"]
        }
    }

    #[test]
    fn test_registry_extensions() {
        let mut registry = ReaderWriterRegistry::new();
        registry.register(SolidColor);

        assert!(registry.supports_extension("solid"));
        assert!(registry.supports_extension("SOLID")); // Case insensitive
        assert!(!registry.supports_extension("png"));
    }

    #[test]
    fn test_dispatch_skips_not_handled() {
        let mut registry = ReaderWriterRegistry::new();
        registry.register(Declines);
        registry.register(SolidColor);

        let image = registry.read_image("red.SOLID", None).unwrap();
        assert_eq!(image.data(), &[255, 0, 0, 255]);

        // Declines answers NotHandled for objects, SolidColor too
        assert!(matches!(registry.read_object("red.solid", None), Err(LoadError::NotHandled(_))));
    }

    #[test]
    fn test_not_found_stops_dispatch() {
        let mut registry = ReaderWriterRegistry::new();
        registry.register(SolidColor);

        assert!(matches!(registry.read_image("missing.solid", None), Err(LoadError::NotFound(_))));
        assert!(matches!(registry.read_image("other.png", None), Err(LoadError::NotHandled(_))));
        assert!(matches!(registry.read_image("noext", None), Err(LoadError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(lower_case_file_extension("a/b/Tex.PNG").as_deref(), Some("png"));
        assert_eq!(lower_case_file_extension("noext"), None);
        assert_eq!(name_less_extension("i_abc.osgearth_cachebin"), "i_abc");
        assert_eq!(name_less_extension("dir.v2/file"), "dir.v2/file");
        assert_eq!(name_less_extension("plain"), "plain");
    }

    #[test]
    fn test_accepts_extension() {
        assert!(SolidColor.accepts_extension("x.Solid"));
        assert!(!SolidColor.accepts_extension("x.png"));
    }
}
