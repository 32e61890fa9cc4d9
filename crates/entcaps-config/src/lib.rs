#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Configuration for the entity capability runtime.
//!
//! A single [`CapsConfig`] holds the trust threshold, discovery deadline,
//! channel sizing and logging settings.
//!
//! # Usage
//!
//! ```rust
//! use entcaps_config::CapsConfig;
//!
//! let config = CapsConfig::from_toml_str("[trust]\nconfirmations_required = 3\n").unwrap();
//! assert_eq!(config.trust.confirmations_required, 3);
//! assert_eq!(config.discovery.query_timeout_secs, 20);
//! ```
//!
//! # Precedence
//!
//! 1. Config file, deep-merged over the defaults
//! 2. `ENTCAPS_*` environment variables, only for fields the file left unset
//! 3. Embedded defaults (`defaults.toml` compiled into the binary)

/// Configuration error types.
pub mod error;
/// Config file loading and merging.
pub mod loader;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use types::*;

impl CapsConfig {
    /// Load configuration from a file, with env fallbacks.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file is unreadable or malformed, or
    /// the final configuration fails validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load(Some(path))
    }

    /// Load the defaults plus env fallbacks, with no config file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if an env var is malformed or the result
    /// fails validation.
    pub fn load_defaults() -> ConfigResult<Self> {
        loader::load(None)
    }

    /// Parse configuration from a TOML string layered over the defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the string is malformed or fails
    /// validation.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        loader::from_toml_str(content)
    }

    /// Per-query discovery deadline.
    #[must_use]
    pub fn query_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.discovery.query_timeout_secs)
    }
}
