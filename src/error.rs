//! Error types for the bridge.

use thiserror::Error;

/// Result type used throughout the bridge.
pub type BridgeResult<T> = Result<T, BridgeError>;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// The host refused or failed to evaluate a MaxScript program.
    #[error("MaxScript evaluation failed: {0}")]
    Script(String),

    /// Any other failure reported by the host application.
    #[error("Host error: {0}")]
    Host(String),

    /// The running host version lacks an API we tried to use.
    #[error("Host capability not available: {0}")]
    MissingCapability(String),

    #[error("3ds Max release {release} is not supported (requires {minimum} or later)")]
    UnsupportedVersion { release: u32, minimum: u32 },

    #[error("No action registered for identifier '{0}'")]
    ActionNotFound(String),

    #[error("'{0}' is not a valid MaxScript identifier")]
    InvalidIdentifier(String),

    #[error("Bootstrap failed: {0}")]
    Bootstrap(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("No engine is currently running")]
    NoEngine,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
