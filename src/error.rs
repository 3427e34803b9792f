use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while creating, validating or rewriting descriptors.
#[derive(Debug, Error)]
pub enum TorrentError {
    /// No external hasher build exists for this OS/CPU pair.
    #[error("unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    /// The lookup tree has no binary at the resolved location.
    #[error("external hasher not found: {0}")]
    BinaryNotFound(PathBuf),

    /// The external hasher ran but did not produce a usable descriptor.
    #[error("external hasher failed: {0}")]
    ExternalBackend(String),

    /// A descriptor file exists but is structurally unusable.
    #[error("invalid descriptor {path}: {reason}")]
    InvalidOutput { path: PathBuf, reason: String },

    /// Content on disk no longer matches the sizes recorded in the descriptor.
    #[error("size mismatch: descriptor records {expected} bytes, found {actual} on disk")]
    SizeMismatch { expected: u64, actual: u64 },

    /// An inherited descriptor lacks the fields needed to canonicalize it.
    #[error("malformed inherited descriptor: {0}")]
    MalformedDescriptor(String),

    /// Filtering left nothing to hash.
    #[error("no eligible files under {0}")]
    EmptyContent(PathBuf),

    #[error("bencode error: {0}")]
    Bencode(#[from] serde_bencode::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TorrentError>;
