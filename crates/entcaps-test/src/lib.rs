//! Entcaps Test - Shared test utilities for the capability runtime.
//!
//! Provides a scripted [`MockDiscoTransport`], a [`RecordingSink`] and
//! disco reply fixtures.
//!
//! # Usage
//!
//! ```rust,ignore
//! use entcaps_config::CapsConfig;
//! use entcaps_runtime::CapabilityService;
//! use entcaps_test::{MockDiscoTransport, jingle_audio_reply, presence_with_caps, unhashed_advertisement};
//!
//! #[tokio::test]
//! async fn test_discovery() {
//!     let (transport, mut inbox) = MockDiscoTransport::new();
//!     let service = CapabilityService::spawn(&CapsConfig::default(), transport);
//!
//!     service.handle_presence(presence_with_caps(1, unhashed_advertisement("0.1"))).await.unwrap();
//!     inbox.expect_query().await.reply(jingle_audio_reply());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;

use entcaps_telemetry::{LogConfig, LogFormat, LogTarget, setup_logging};

/// Install a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; silent by default. Output goes through the test
/// harness so it only shows for failing tests.
pub fn init_test_logging() {
    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "off".to_owned());
    let config = LogConfig::new(level)
        .with_format(LogFormat::Compact)
        .with_target(LogTarget::Test)
        .without_ansi();
    // Another test may already have installed it.
    let _ = setup_logging(&config);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_logging_is_idempotent() {
        init_test_logging();
        init_test_logging();
        assert!(tracing::dispatcher::has_been_set());
    }
}
