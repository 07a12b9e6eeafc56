//! Externally referenced images
//!
//! [`WriteExternalReferences`] finds every image reachable from a texture
//! in a graph and stores its pixels in the cache bin under a key derived
//! from the image's file name. The image is then renamed to
//! `"<key>.osgearth_cachebin"` and marked [`WriteHint::ExternalFile`], so the
//! serialized graph only carries the reference and every graph using the
//! same file shares one image record.
//!
//! The check-then-write on a derived key happens under one process-wide
//! mutex, so concurrent writers referencing the same file store it once.

use parking_lot::Mutex;
use void_asset::{Options, INCLUDE_DATA, WRITE_IMAGE_HINT};
use void_scene::{visit_textures_and_images, ImageRef, Node, TextureAndImageVisitor, WriteHint};

use crate::bin::{CacheBin, Metadata, Payload, RecordStatus};
use crate::key::{cache_reference, image_cache_key, is_cache_key};

static GLOBAL_MUTEX: Mutex<()> = parking_lot::const_mutex(());

/// Externalizer counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalizeStats {
    /// Images stored in the bin by this pass
    pub images_written: usize,
    /// Images whose key already had a current record
    pub images_already_cached: usize,
    /// Images already pointing at a cache key
    pub images_skipped: usize,
    /// Images with an empty file name
    pub blank_identifiers: usize,
    /// Image writes the bin rejected
    pub write_failures: usize,
}

/// Pulls images out of a graph into their own cache records
pub struct WriteExternalReferences<'a, B: CacheBin + ?Sized> {
    bin: &'a B,
    write_options: Option<&'a Options>,
    stats: ExternalizeStats,
}

impl<'a, B: CacheBin + ?Sized> WriteExternalReferences<'a, B> {
    pub fn new(bin: &'a B, write_options: Option<&'a Options>) -> Self {
        Self {
            bin,
            write_options,
            stats: ExternalizeStats::default(),
        }
    }

    /// Process every image under `root`, node masks ignored
    pub fn run(&mut self, root: &mut Node) {
        visit_textures_and_images(root, self);
    }

    pub fn stats(&self) -> &ExternalizeStats {
        &self.stats
    }

    fn write_image(&mut self, image: &ImageRef, cache_key: &str) {
        let mut options = Options::clone_or_create(self.write_options);
        options.set_plugin_string_data(WRITE_IMAGE_HINT, INCLUDE_DATA);

        let image = image.read();
        log::info!(
            "[WriteExternalReferences] Writing image \"{}\" to the cache as \"{}\"",
            image.file_name(),
            cache_key
        );

        if self.bin.write(cache_key, Payload::Image(&image), &Metadata::new(), Some(&options)) {
            self.stats.images_written += 1;
        } else {
            log::warn!("[WriteExternalReferences] Write of \"{}\" failed", cache_key);
            self.stats.write_failures += 1;
        }
    }
}

impl<B: CacheBin + ?Sized> TextureAndImageVisitor for WriteExternalReferences<'_, B> {
    fn apply_image(&mut self, image: &ImageRef) {
        let path = image.read().file_name().to_string();
        if path.is_empty() {
            log::warn!("[WriteExternalReferences] Image with blank file name");
            self.stats.blank_identifiers += 1;
            return;
        }

        if is_cache_key(&path) {
            self.stats.images_skipped += 1;
            return;
        }

        let _lock = GLOBAL_MUTEX.lock();

        // Another writer may have renamed it while we waited
        let path = image.read().file_name().to_string();
        if is_cache_key(&path) {
            self.stats.images_skipped += 1;
            return;
        }

        let cache_key = image_cache_key(&path);
        if self.bin.record_status(&cache_key) == RecordStatus::Ok {
            self.stats.images_already_cached += 1;
        } else {
            self.write_image(image, &cache_key);
        }

        let mut image = image.write();
        image.set_file_name(cache_reference(&cache_key));
        image.set_write_hint(WriteHint::ExternalFile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCacheBin;
    use void_scene::{Image, PixelFormat, StateSet, StateValue, Texture};

    fn graph_with_images(names: &[&str]) -> (Node, Vec<ImageRef>) {
        let mut root = Node::group("root");
        let mut images = Vec::new();
        for (i, name) in names.iter().enumerate() {
            let image = Image::new(1, 1, PixelFormat::Luminance8, vec![i as u8])
                .with_file_name(*name)
                .into_ref();
            let mut ss = StateSet::new();
            ss.set_texture_attribute(0, Texture::new(*name).with_image(image.clone()).into_ref(), StateValue::ON);
            root.add_child(Node::geode(format!("leaf{}", i)).with_state_set(ss).with_node_mask(0));
            images.push(image);
        }
        (root, images)
    }

    #[test]
    fn test_images_are_written_and_renamed() {
        let bin = MemoryCacheBin::new("mem");
        let (mut root, images) = graph_with_images(&["/data/a.png", "/data/b.png"]);

        let mut pass = WriteExternalReferences::new(&bin, None);
        pass.run(&mut root);

        assert_eq!(pass.stats().images_written, 2);
        for (image, name) in images.iter().zip(["/data/a.png", "/data/b.png"]) {
            let key = image_cache_key(name);
            let image = image.read();
            assert_eq!(image.file_name(), cache_reference(&key));
            assert_eq!(image.write_hint(), WriteHint::ExternalFile);
            assert_eq!(bin.record_status(&key), RecordStatus::Ok);
        }
    }

    #[test]
    fn test_second_pass_is_idempotent() {
        let bin = MemoryCacheBin::new("mem");
        let (mut root, images) = graph_with_images(&["/data/a.png"]);

        WriteExternalReferences::new(&bin, None).run(&mut root);
        let renamed = images[0].read().file_name().to_string();

        let mut again = WriteExternalReferences::new(&bin, None);
        again.run(&mut root);

        assert_eq!(images[0].read().file_name(), renamed);
        assert_eq!(again.stats().images_skipped, 1);
        assert_eq!(bin.write_count(&image_cache_key("/data/a.png")), 1);
    }

    #[test]
    fn test_blank_and_cached_images() {
        let bin = MemoryCacheBin::new("mem");
        let (mut first, _) = graph_with_images(&["/data/a.png"]);
        WriteExternalReferences::new(&bin, None).run(&mut first);

        let (mut root, images) = graph_with_images(&["", "/data/a.png"]);
        let mut pass = WriteExternalReferences::new(&bin, None);
        pass.run(&mut root);

        assert_eq!(pass.stats().blank_identifiers, 1);
        assert_eq!(pass.stats().images_already_cached, 1);
        assert_eq!(pass.stats().images_written, 0);
        assert_eq!(images[0].read().file_name(), "");
        assert!(is_cache_key(images[1].read().file_name()));
    }

    #[test]
    fn test_expired_record_is_rewritten() {
        let bin = MemoryCacheBin::new("mem");
        let key = image_cache_key("/data/a.png");
        let (mut first, _) = graph_with_images(&["/data/a.png"]);
        WriteExternalReferences::new(&bin, None).run(&mut first);
        bin.expire(&key);

        let (mut root, _) = graph_with_images(&["/data/a.png"]);
        WriteExternalReferences::new(&bin, None).run(&mut root);

        assert_eq!(bin.write_count(&key), 2);
        assert_eq!(bin.record_status(&key), RecordStatus::Ok);
    }

    #[test]
    fn test_write_failure_still_renames() {
        let bin = MemoryCacheBin::new("mem");
        bin.fail_writes_matching("i_");
        let (mut root, images) = graph_with_images(&["/data/a.png"]);

        let mut pass = WriteExternalReferences::new(&bin, None);
        pass.run(&mut root);

        assert_eq!(pass.stats().write_failures, 1);
        assert!(is_cache_key(images[0].read().file_name()));
    }

    #[test]
    fn test_stored_image_carries_pixels() {
        let bin = MemoryCacheBin::new("mem");
        let (mut root, _) = graph_with_images(&["/data/a.png"]);
        WriteExternalReferences::new(&bin, None).run(&mut root);

        let stored = bin.read_image(&image_cache_key("/data/a.png"), None).unwrap();
        assert_eq!(stored.data(), &[0]);
    }
}
