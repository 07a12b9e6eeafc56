//! Cache errors

use thiserror::Error;
use void_asset::CodecError;

/// Error reading from a cache bin
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("No record for key \"{0}\"")]
    NotFound(String),

    #[error("Record \"{0}\" has expired")]
    Expired(String),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record \"{key}\" holds {found}, expected {expected}")]
    WrongKind {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Result of a cache bin read
pub type ReadResult<T> = Result<T, CacheError>;

/// Error loading cache configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}
