//! Error types for the vision trainer core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A settings update named a field that does not exist.
    #[error("Unknown setting path: {0}")]
    UnknownSettingPath(String),

    /// A settings update carried a value that cannot be stored at its path.
    #[error("Invalid value for {path}: {reason}")]
    InvalidValue {
        /// Dotted path of the rejected update.
        path: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Settings or configuration serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persistence backend failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Platform capability failure (fullscreen and friends).
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

/// Errors raised by a [`SettingsStorage`](crate::store::SettingsStorage) backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The storage medium cannot be reached (private mode, sandbox, ...).
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// The storage medium refused the write because it is full.
    #[error("Storage quota exceeded")]
    QuotaExceeded,

    /// An I/O error occurred during file-backed persistence.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by platform collaborators.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The environment rejected a fullscreen request.
    #[error("Fullscreen request rejected: {0}")]
    FullscreenRejected(String),

    /// The capability does not exist on this platform.
    #[error("Unsupported capability: {0}")]
    Unsupported(String),
}
