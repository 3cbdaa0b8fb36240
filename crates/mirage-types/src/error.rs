//! Error types for mirage.

use std::io;

/// Errors produced by the mirage workspace engine.
#[derive(Debug, thiserror::Error)]
pub enum MirageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of a [`MirageError`], for callers that branch on
/// the failure class rather than the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidOperation,
    StorageUnavailable,
    Config,
    Io,
    Parse,
}

impl MirageError {
    /// The taxonomy bucket this error falls into.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::InvalidOperation(_) => ErrorKind::InvalidOperation,
            Self::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
            Self::TomlParse(_) | Self::Json(_) => ErrorKind::Parse,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, MirageError>;
