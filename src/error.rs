//! Error types.

use std::path::PathBuf;

use thiserror::Error;

/// Prompt cache persistence errors.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The persisted document exists but could not be read.
    #[error("failed to read cache file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The persisted document is not a JSON object of prompt → descriptor.
    #[error("cache file {path} is corrupt: {source}")]
    PersistedStateCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An entry of the persisted document is not a usable descriptor.
    #[error("cache file {path} has an invalid entry for {prompt:?}: {source}")]
    InvalidEntry {
        path: PathBuf,
        prompt: String,
        #[source]
        source: DescriptorError,
    },

    /// The cache could not be written back to disk. The cache stays dirty.
    #[error("failed to write cache file {path}: {source}")]
    PersistenceWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serializing the in-memory cache failed.
    #[error("failed to serialize cache: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CacheError {
    /// Whether the persisted document exists but cannot be used as a cache.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::PersistedStateCorrupt { .. } | Self::InvalidEntry { .. })
    }
}

/// Reasons a generated payload is not a valid descriptor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("missing or empty componentType")]
    MissingComponentType,

    #[error("style must be an object of scalar values (offending key: {0})")]
    InvalidStyle(String),

    #[error("children must be a string, a descriptor or a list of descriptors")]
    InvalidChildren,
}

/// Client-side resolution errors. Rendered as an error view, never thrown.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("resolution endpoint returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid descriptor in response: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("no component was generated for this prompt")]
    NotFound,
}
