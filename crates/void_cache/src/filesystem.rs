//! Filesystem cache bin
//!
//! One file per key under `<root>/<bin_id>/`.
//!
//! # Write Strategy
//!
//! - Records are `bincode`-encoded [`StoredRecord`]s
//! - Writes are atomic (write to a unique temp file, then rename)
//! - Records older than `max_age` read as expired
//! - Files that fail to decode read as misses

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use void_asset::{Object, Options};
use void_scene::Image;

use crate::bin::{BinStats, CacheBin, Metadata, Payload, RecordStatus, StoredRecord, DEFAULT_CLONE_LOCK_TIMEOUT};
use crate::config::CacheConfig;
use crate::error::{CacheError, ReadResult};

const RECORD_EXTENSION: &str = "bin";

/// Cache bin storing each record in its own file
pub struct FileSystemCacheBin {
    id: String,
    dir: PathBuf,
    max_age: Option<Duration>,
    clone_lock_timeout: Duration,
    stats: Mutex<BinStats>,
    temp_counter: AtomicU64,
}

impl FileSystemCacheBin {
    /// Open (creating if needed) the bin `id` under `root`
    pub fn open(root: impl AsRef<Path>, id: impl Into<String>) -> std::io::Result<Self> {
        let id = id.into();
        let dir = root.as_ref().join(escape_key(&id));
        fs::create_dir_all(&dir)?;
        log::info!("Cache bin \"{}\" opened at {:?}", id, dir);

        Ok(Self {
            id,
            dir,
            max_age: None,
            clone_lock_timeout: DEFAULT_CLONE_LOCK_TIMEOUT,
            stats: Mutex::new(BinStats::default()),
            temp_counter: AtomicU64::new(0),
        })
    }

    /// Open the bin described by a config
    pub fn from_config(config: &CacheConfig) -> std::io::Result<Self> {
        Ok(Self::open(&config.root_path, config.bin_id.clone())?
            .with_max_age(config.max_age())
            .with_clone_lock_timeout(config.clone_lock_timeout()))
    }

    pub fn with_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_clone_lock_timeout(mut self, timeout: Duration) -> Self {
        self.clone_lock_timeout = timeout;
        self
    }

    /// Directory holding this bin's records
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stats(&self) -> BinStats {
        self.stats.lock().clone()
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", escape_key(key), RECORD_EXTENSION))
    }

    fn load(&self, key: &str) -> ReadResult<StoredRecord> {
        let path = self.path_for(key);
        let data = fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => CacheError::NotFound(key.to_string()),
            _ => CacheError::Io(e),
        })?;

        let record: StoredRecord = bincode::deserialize(&data).map_err(|e| {
            log::warn!("[FileSystemCacheBin {}] Corrupt record {:?}: {}", self.id, path, e);
            CacheError::NotFound(key.to_string())
        })?;

        if self.is_expired(&record) {
            return Err(CacheError::Expired(key.to_string()));
        }
        Ok(record)
    }

    fn is_expired(&self, record: &StoredRecord) -> bool {
        self.max_age.map_or(false, |max_age| record.age() >= max_age)
    }

    fn store(&self, key: &str, record: &StoredRecord) -> Result<(), CacheError> {
        let final_path = self.path_for(key);
        let temp_path = self.dir.join(format!(
            ".{}.{}.{}.tmp",
            escape_key(key),
            std::process::id(),
            self.temp_counter.fetch_add(1, Ordering::Relaxed)
        ));

        let data = bincode::serialize(record).map_err(void_asset::CodecError::from)?;

        // Write to temp file
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(&data)?;
            writer.flush()?;
        }

        // Atomic rename
        if let Err(e) = fs::rename(&temp_path, &final_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        log::debug!("[FileSystemCacheBin {}] Wrote \"{}\": {} bytes", self.id, key, data.len());
        Ok(())
    }

    fn read_with<T>(&self, key: &str, decode: impl FnOnce(&StoredRecord) -> ReadResult<T>) -> ReadResult<T> {
        let result = self.load(key).and_then(|record| decode(&record));

        let mut stats = self.stats.lock();
        stats.reads += 1;
        if result.is_err() {
            stats.misses += 1;
        }
        result
    }
}

/// Map a key onto a safe file name; bytes outside `[A-Za-z0-9_-]` become `%XX`
fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'-' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

impl CacheBin for FileSystemCacheBin {
    fn id(&self) -> &str {
        &self.id
    }

    fn write(&self, key: &str, payload: Payload<'_>, metadata: &Metadata, options: Option<&Options>) -> bool {
        let result = StoredRecord::encode(payload, metadata, options)
            .map_err(CacheError::from)
            .and_then(|record| self.store(key, &record));

        let mut stats = self.stats.lock();
        match result {
            Ok(()) => {
                stats.writes += 1;
                true
            }
            Err(e) => {
                stats.write_failures += 1;
                log::warn!("[FileSystemCacheBin {}] Failed to write \"{}\": {}", self.id, key, e);
                false
            }
        }
    }

    fn read_object(&self, key: &str, options: Option<&Options>) -> ReadResult<Object> {
        self.read_with(key, |record| record.decode_object(key, options))
    }

    fn read_image(&self, key: &str, options: Option<&Options>) -> ReadResult<Image> {
        self.read_with(key, |record| record.decode_image(key, options))
    }

    fn read_metadata(&self, key: &str) -> ReadResult<Metadata> {
        self.read_with(key, |record| Ok(record.metadata.clone()))
    }

    fn record_status(&self, key: &str) -> RecordStatus {
        match self.load(key) {
            Ok(_) => RecordStatus::Ok,
            Err(CacheError::Expired(_)) => RecordStatus::Expired,
            Err(_) => RecordStatus::NotFound,
        }
    }

    fn clone_lock_timeout(&self) -> Duration {
        self.clone_lock_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use void_scene::{Node, PixelFormat};

    fn temp_root(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("void_cache_fs_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn image() -> Image {
        Image::new(2, 1, PixelFormat::Rgb8, vec![9, 8, 7, 6, 5, 4]).with_file_name("strip.png")
    }

    #[test]
    fn test_records_survive_reopen() {
        let root = temp_root("reopen");
        {
            let bin = FileSystemCacheBin::open(&root, "tiles").unwrap();
            assert!(bin.write("img", Payload::Image(&image()), &Metadata::new(), None));
            assert!(bin.write("graph", Payload::Node(&Node::group("terrain")), &Metadata::new(), None));
            assert_eq!(bin.stats().writes, 2);
        }

        let bin = FileSystemCacheBin::open(&root, "tiles").unwrap();
        assert_eq!(bin.record_status("img"), RecordStatus::Ok);
        assert_eq!(bin.read_image("img", None).unwrap().data(), &[9, 8, 7, 6, 5, 4]);
        let node = bin.read_object("graph", None).unwrap().into_node().unwrap();
        assert_eq!(node.name(), "terrain");

        // No temp files left behind
        let leftovers = fs::read_dir(bin.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_max_age_expires_records() {
        let root = temp_root("expire");
        let bin = FileSystemCacheBin::open(&root, "tiles").unwrap().with_max_age(Some(Duration::ZERO));
        bin.write("img", Payload::Image(&image()), &Metadata::new(), None);

        assert_eq!(bin.record_status("img"), RecordStatus::Expired);
        assert!(matches!(bin.read_image("img", None), Err(CacheError::Expired(_))));

        let bin = bin.with_max_age(None);
        assert_eq!(bin.record_status("img"), RecordStatus::Ok);

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_corrupt_record_is_a_miss() {
        let root = temp_root("corrupt");
        let bin = FileSystemCacheBin::open(&root, "tiles").unwrap();
        fs::write(bin.path_for("broken"), b"\x01garbage").unwrap();

        assert_eq!(bin.record_status("broken"), RecordStatus::NotFound);
        assert!(matches!(bin.read_object("broken", None), Err(CacheError::NotFound(_))));
        assert_eq!(bin.stats().misses, 1);

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_keys_are_escaped() {
        assert_eq!(escape_key("i_3fa9"), "i_3fa9");
        assert_eq!(escape_key("a/b c.png"), "a%2Fb%20c%2Epng");

        let root = temp_root("escape");
        let bin = FileSystemCacheBin::open(&root, "tiles").unwrap();
        assert!(bin.write("../outside", Payload::Image(&image()), &Metadata::new(), None));
        assert!(bin.path_for("../outside").starts_with(bin.dir()));
        assert!(bin.read_image("../outside", None).is_ok());

        fs::remove_dir_all(&root).ok();
    }
}
