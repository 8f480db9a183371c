//! Error types for the container runtime.

use std::path::PathBuf;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the container runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Command-line arguments did not match the expected grammar.
    #[error("invalid arguments: {0}")]
    Config(String),

    // =========================================================================
    // Image/Registry Errors
    // =========================================================================
    /// Failed to parse an image reference.
    #[error("invalid image reference '{reference}': {reason}")]
    InvalidImageReference { reference: String, reason: String },

    /// Registry returned a non-200 status or malformed content.
    #[error("registry error for '{reference}': {reason}")]
    Registry { reference: String, reason: String },

    /// Layer could not be decompressed or applied.
    #[error("failed to extract layer: {0}")]
    Extract(String),

    // =========================================================================
    // Isolation Errors
    // =========================================================================
    /// A namespace/mount/pivot_root syscall returned a nonzero code.
    #[error("{operation} failed with rc={code}")]
    Syscall { operation: String, code: i64 },

    /// Writing to cgroupfs failed.
    #[error("cgroup operation failed at {path}: {reason}")]
    Cgroup { path: PathBuf, reason: String },

    /// A network helper command exited nonzero.
    #[error("network setup failed: {0}")]
    Network(String),

    // =========================================================================
    // Container Store Errors
    // =========================================================================
    /// Container id does not exist in the store.
    #[error("container not found: {0}")]
    NotFound(String),

    /// Refusing to remove a container whose process is still alive.
    #[error("cannot remove running container {0}; stop it first")]
    StillRunning(String),

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
