//! Runtime error types.

use entcaps_config::ConfigError;
use entcaps_core::CapsError;
use thiserror::Error;

/// Errors returned by the capability service.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The service actor has stopped.
    #[error("capability service is not running")]
    ServiceClosed,

    /// Every contact handle has been allocated.
    #[error("contact handle space exhausted")]
    HandlesExhausted,

    /// A capability error surfaced to the caller.
    #[error(transparent)]
    Caps(#[from] CapsError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
