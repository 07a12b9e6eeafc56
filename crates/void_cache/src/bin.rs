//! Cache bin interface
//!
//! A cache bin is a key/value store for serialized scene graphs and images,
//! each stored with a small string metadata map. [`CacheBin::write_node`]
//! runs the full write pipeline: the graph is sanitized
//! ([`PrepareForCaching`]), its images are pulled out into records of their
//! own ([`WriteExternalReferences`]) and finally the graph itself is
//! serialized under the caller's key.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use void_asset::{codec, CodecResult, Object, Options};
use void_scene::{Image, Node};

use crate::error::{CacheError, ReadResult};
use crate::externalize::WriteExternalReferences;
use crate::prepare::PrepareForCaching;

/// Metadata stored alongside a record
pub type Metadata = BTreeMap<String, String>;

/// How long the sanitizer waits for a texture another thread is writing
pub const DEFAULT_CLONE_LOCK_TIMEOUT: Duration = Duration::from_millis(250);

/// State of a record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordStatus {
    /// Present and current
    Ok,
    /// Present but stale
    Expired,
    /// Absent
    NotFound,
}

/// What a record holds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadKind {
    Node,
    Image,
}

impl PayloadKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Node => "a node",
            Self::Image => "an image",
        }
    }
}

/// Something to write into a bin
#[derive(Clone, Copy, Debug)]
pub enum Payload<'a> {
    Node(&'a Node),
    Image(&'a Image),
}

impl Payload<'_> {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::Node(_) => PayloadKind::Node,
            Self::Image(_) => PayloadKind::Image,
        }
    }

    /// Serialize with the codec, honoring the write options
    pub fn encode(&self, options: Option<&Options>) -> CodecResult<Vec<u8>> {
        match self {
            Self::Node(node) => codec::encode_node(node, options),
            Self::Image(image) => codec::encode_image(image, options),
        }
    }
}

/// A serialized record as both backends keep it
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredRecord {
    pub kind: PayloadKind,
    /// Milliseconds since the Unix epoch
    pub created_at: u64,
    pub metadata: Metadata,
    pub data: Vec<u8>,
}

impl StoredRecord {
    pub fn encode(payload: Payload<'_>, metadata: &Metadata, options: Option<&Options>) -> CodecResult<Self> {
        Ok(Self {
            kind: payload.kind(),
            created_at: now_millis(),
            metadata: metadata.clone(),
            data: payload.encode(options)?,
        })
    }

    /// Age of the record, zero if the clock went backwards
    pub fn age(&self) -> Duration {
        Duration::from_millis(now_millis().saturating_sub(self.created_at))
    }

    fn expect_kind(&self, key: &str, expected: PayloadKind) -> ReadResult<()> {
        if self.kind != expected {
            return Err(CacheError::WrongKind {
                key: key.to_string(),
                expected: expected.name(),
                found: self.kind.name(),
            });
        }
        Ok(())
    }

    pub fn decode_object(&self, key: &str, options: Option<&Options>) -> ReadResult<Object> {
        self.expect_kind(key, PayloadKind::Node)?;
        Ok(Object::Node(codec::decode_node(&self.data, options)?))
    }

    pub fn decode_image(&self, key: &str, options: Option<&Options>) -> ReadResult<Image> {
        self.expect_kind(key, PayloadKind::Image)?;
        Ok(codec::decode_image(&self.data, options)?)
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Key/value store for serialized graphs and images
pub trait CacheBin: Send + Sync {
    /// Identifier of this bin
    fn id(&self) -> &str;

    /// Serialize and store a payload under `key`.
    ///
    /// Returns false when the payload could not be serialized or stored.
    fn write(&self, key: &str, payload: Payload<'_>, metadata: &Metadata, options: Option<&Options>) -> bool;

    /// Read a graph record
    fn read_object(&self, key: &str, options: Option<&Options>) -> ReadResult<Object>;

    /// Read an image record
    fn read_image(&self, key: &str, options: Option<&Options>) -> ReadResult<Image>;

    /// Read the metadata stored with a record
    fn read_metadata(&self, key: &str) -> ReadResult<Metadata>;

    /// Check a record without reading it
    fn record_status(&self, key: &str) -> RecordStatus;

    /// How long graph sanitizing waits for a texture lock
    fn clone_lock_timeout(&self) -> Duration {
        DEFAULT_CLONE_LOCK_TIMEOUT
    }

    /// Write a graph with its images stored as separate, shared records.
    ///
    /// `root` is rewritten in place: user data is stripped, textures are
    /// replaced by private clones and image identifiers point at their
    /// cache keys. Asset failures are logged and never fail the call; this
    /// always returns true once the graph write has been attempted.
    fn write_node(&self, key: &str, root: &mut Node, metadata: &Metadata, options: Option<&Options>) -> bool {
        if !self.write_node_strict(key, root, metadata, options) {
            log::warn!("[CacheBin {}] Failed to write graph \"{}\"", self.id(), key);
        }
        true
    }

    /// Like [`CacheBin::write_node`] but reports whether the graph record
    /// itself was stored.
    fn write_node_strict(&self, key: &str, root: &mut Node, metadata: &Metadata, options: Option<&Options>) -> bool {
        let mut prepare = PrepareForCaching::new(self.clone_lock_timeout());
        prepare.run(root);
        log::debug!(
            "[CacheBin {}] Prepared \"{}\": {} textures cloned, {} user data cleared",
            self.id(),
            key,
            prepare.textures(),
            prepare.user_data_clears()
        );

        let mut externalize = WriteExternalReferences::new(self, options);
        externalize.run(root);
        let stats = externalize.stats();
        log::debug!(
            "[CacheBin {}] Externalized \"{}\": {} written, {} already cached, {} failed",
            self.id(),
            key,
            stats.images_written,
            stats.images_already_cached,
            stats.write_failures
        );

        self.write(key, Payload::Node(root), metadata, options)
    }
}

/// A cache bin attached to an [`Options`]
#[derive(Clone)]
pub struct CacheBinHandle(pub Arc<dyn CacheBin>);

/// Attach and find a cache bin in load/write options
pub trait CacheBinOptionsExt {
    fn set_cache_bin(&mut self, bin: Arc<dyn CacheBin>);
    fn cache_bin(&self) -> Option<Arc<dyn CacheBin>>;
    fn with_cache_bin(self, bin: Arc<dyn CacheBin>) -> Self;
}

impl CacheBinOptionsExt for Options {
    fn set_cache_bin(&mut self, bin: Arc<dyn CacheBin>) {
        self.insert_object(CacheBinHandle(bin));
    }

    fn cache_bin(&self) -> Option<Arc<dyn CacheBin>> {
        self.get_object::<CacheBinHandle>().map(|h| h.0.clone())
    }

    fn with_cache_bin(mut self, bin: Arc<dyn CacheBin>) -> Self {
        self.set_cache_bin(bin);
        self
    }
}

/// Per-bin counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinStats {
    pub writes: u64,
    pub write_failures: u64,
    pub reads: u64,
    pub misses: u64,
}
