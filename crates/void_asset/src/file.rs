//! File-backed image reader/writer for PNG, JPG, BMP

use std::io::ErrorKind;
use std::path::Path;

use image::{ColorType, ExtendedColorType, GenericImageView};
use void_scene::{Image, PixelFormat, WriteHint};

use crate::loader::{LoadError, LoadResult, ReaderWriter};
use crate::options::Options;

/// Reads and writes images on the local filesystem
#[derive(Debug, Default)]
pub struct FileImageReaderWriter;

impl FileImageReaderWriter {
    pub fn new() -> Self {
        Self
    }

    /// Decode an image from encoded bytes
    pub fn decode(data: &[u8], url: &str) -> LoadResult<Image> {
        let img = image::load_from_memory(data)
            .map_err(|e| LoadError::Parse(format!("Failed to decode image {}: {}", url, e)))?;

        let (width, height) = img.dimensions();
        let (format, data) = match img.color() {
            ColorType::L8 => (PixelFormat::Luminance8, img.into_luma8().into_raw()),
            ColorType::Rgb8 => (PixelFormat::Rgb8, img.into_rgb8().into_raw()),
            _ => (PixelFormat::Rgba8, img.to_rgba8().into_raw()),
        };

        Ok(Image::new(width, height, format, data)
            .with_file_name(url)
            .with_write_hint(WriteHint::ExternalFile))
    }
}

fn extended_color_type(format: PixelFormat) -> ExtendedColorType {
    match format {
        PixelFormat::Luminance8 => ExtendedColorType::L8,
        PixelFormat::Rgb8 => ExtendedColorType::Rgb8,
        PixelFormat::Rgba8 => ExtendedColorType::Rgba8,
    }
}

impl ReaderWriter for FileImageReaderWriter {
    fn extensions(&self) -> &[&str] {
        &["png", "jpg", "jpeg", "bmp"]
    }

    fn description(&self) -> &str {
        "Image files"
    }

    fn read_image(&self, url: &str, _options: Option<&Options>) -> LoadResult<Image> {
        let data = std::fs::read(url).map_err(|e| match e.kind() {
            ErrorKind::NotFound => LoadError::NotFound(url.to_string()),
            _ => LoadError::Io(format!("{}: {}", url, e)),
        })?;
        Self::decode(&data, url)
    }

    fn write_image(&self, image: &Image, url: &str, _options: Option<&Options>) -> LoadResult<()> {
        if !image.is_consistent() || image.is_empty() {
            return Err(LoadError::Parse(format!("Image {} has no valid pixel data", url)));
        }

        let path = Path::new(url);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| LoadError::Io(e.to_string()))?;
        }

        image::save_buffer(
            path,
            image.data(),
            image.width(),
            image.height(),
            extended_color_type(image.format()),
        )
        .map_err(|e| LoadError::Io(format!("Failed to write {}: {}", url, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = env::temp_dir().join(format!("void_asset_file_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_png_write_then_read() {
        let dir = temp_dir("png");
        let path = dir.join("tex/checker.png");
        let url = path.to_str().unwrap();

        let pixels = vec![255, 0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 255, 255, 255, 255, 255];
        let image = Image::new(2, 2, PixelFormat::Rgba8, pixels.clone());

        let rw = FileImageReaderWriter::new();
        rw.write_image(&image, url, None).unwrap();

        let loaded = rw.read_image(url, None).unwrap();
        assert_eq!(loaded.width(), 2);
        assert_eq!(loaded.height(), 2);
        assert_eq!(loaded.format(), PixelFormat::Rgba8);
        assert_eq!(loaded.data(), pixels.as_slice());
        assert_eq!(loaded.file_name(), url);
        assert_eq!(loaded.write_hint(), WriteHint::ExternalFile);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = temp_dir("missing");
        let url = dir.join("nope.png");
        let result = FileImageReaderWriter.read_image(url.to_str().unwrap(), None);
        assert!(matches!(result, Err(LoadError::NotFound(_))));
    }

    #[test]
    fn test_garbage_is_parse_error() {
        assert!(matches!(
            FileImageReaderWriter::decode(b"not an image", "junk.png"),
            Err(LoadError::Parse(_))
        ));
    }

    #[test]
    fn test_empty_image_is_not_written() {
        let dir = temp_dir("empty");
        let url = dir.join("empty.png");
        let result = FileImageReaderWriter.write_image(&Image::placeholder("empty.png"), url.to_str().unwrap(), None);
        assert!(matches!(result, Err(LoadError::Parse(_))));
    }
}
