//! In-memory cache bin

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use void_asset::{Object, Options};
use void_scene::Image;

use crate::bin::{BinStats, CacheBin, Metadata, Payload, RecordStatus, StoredRecord, DEFAULT_CLONE_LOCK_TIMEOUT};
use crate::error::{CacheError, ReadResult};

struct Entry {
    record: Arc<StoredRecord>,
    expired: bool,
}

/// Cache bin keeping serialized records in a map
pub struct MemoryCacheBin {
    id: String,
    records: RwLock<BTreeMap<String, Entry>>,
    write_counts: Mutex<BTreeMap<String, usize>>,
    fail_prefix: RwLock<Option<String>>,
    stats: Mutex<BinStats>,
    clone_lock_timeout: Duration,
}

impl MemoryCacheBin {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            records: RwLock::new(BTreeMap::new()),
            write_counts: Mutex::new(BTreeMap::new()),
            fail_prefix: RwLock::new(None),
            stats: Mutex::new(BinStats::default()),
            clone_lock_timeout: DEFAULT_CLONE_LOCK_TIMEOUT,
        }
    }

    pub fn with_clone_lock_timeout(mut self, timeout: Duration) -> Self {
        self.clone_lock_timeout = timeout;
        self
    }

    /// Mark a record stale
    pub fn expire(&self, key: &str) -> bool {
        match self.records.write().get_mut(key) {
            Some(entry) => {
                entry.expired = true;
                true
            }
            None => false,
        }
    }

    /// Make every write to a key starting with `prefix` fail
    pub fn fail_writes_matching(&self, prefix: impl Into<String>) {
        *self.fail_prefix.write() = Some(prefix.into());
    }

    pub fn clear_write_failures(&self) {
        *self.fail_prefix.write() = None;
    }

    /// Number of write calls made for `key`, failed ones included
    pub fn write_count(&self, key: &str) -> usize {
        self.write_counts.lock().get(key).copied().unwrap_or(0)
    }

    /// Number of write calls made for keys starting with `prefix`
    pub fn write_count_matching(&self, prefix: &str) -> usize {
        self.write_counts
            .lock()
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(_, n)| *n)
            .sum()
    }

    pub fn keys(&self) -> Vec<String> {
        self.records.read().keys().cloned().collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn stats(&self) -> BinStats {
        self.stats.lock().clone()
    }

    fn read_with<T>(&self, key: &str, decode: impl FnOnce(&StoredRecord) -> ReadResult<T>) -> ReadResult<T> {
        // Decoding may resolve images through this same bin
        let found = match self.records.read().get(key) {
            None => Err(CacheError::NotFound(key.to_string())),
            Some(entry) if entry.expired => Err(CacheError::Expired(key.to_string())),
            Some(entry) => Ok(entry.record.clone()),
        };
        let result = found.and_then(|record| decode(&record));

        let mut stats = self.stats.lock();
        stats.reads += 1;
        if result.is_err() {
            stats.misses += 1;
        }
        result
    }
}

impl CacheBin for MemoryCacheBin {
    fn id(&self) -> &str {
        &self.id
    }

    fn write(&self, key: &str, payload: Payload<'_>, metadata: &Metadata, options: Option<&Options>) -> bool {
        *self.write_counts.lock().entry(key.to_string()).or_insert(0) += 1;

        let injected_failure = self
            .fail_prefix
            .read()
            .as_deref()
            .map_or(false, |prefix| key.starts_with(prefix));

        let stored = if injected_failure {
            log::warn!("[MemoryCacheBin {}] Write to \"{}\" rejected", self.id, key);
            false
        } else {
            match StoredRecord::encode(payload, metadata, options) {
                Ok(record) => {
                    self.records
                        .write()
                        .insert(key.to_string(), Entry { record: Arc::new(record), expired: false });
                    true
                }
                Err(e) => {
                    log::warn!("[MemoryCacheBin {}] Failed to encode \"{}\": {}", self.id, key, e);
                    false
                }
            }
        };

        let mut stats = self.stats.lock();
        if stored {
            stats.writes += 1;
        } else {
            stats.write_failures += 1;
        }
        stored
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
        match self.records.read().get(key) {
            None => RecordStatus::NotFound,
            Some(entry) if entry.expired => RecordStatus::Expired,
            Some(_) => RecordStatus::Ok,
        }
    }

    fn clone_lock_timeout(&self) -> Duration {
        self.clone_lock_timeout
    }
}
