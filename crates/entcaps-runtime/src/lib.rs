//! Entcaps Runtime - Capability discovery and aggregation.
//!
//! This crate provides:
//! - [`BundleTrustCache`]: process-wide trust state per capability signature
//! - [`DiscoveryScheduler`]: disco#info queries with deadlines, over a
//!   [`DiscoTransport`]
//! - [`CapabilityAggregator`]: joins each presence update's signatures into
//!   one capability change
//! - The exposure boundary: contact handles and channel classes
//! - [`CapabilityService`]: the actor wiring all of the above
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use entcaps_config::CapsConfig;
//! use entcaps_core::{CapsAdvertisement, FullJid, PresenceUpdate};
//! use entcaps_runtime::{CapabilityService, DiscoTransport};
//!
//! # async fn example(transport: Arc<dyn DiscoTransport>) -> entcaps_runtime::RuntimeResult<()> {
//! let service = CapabilityService::spawn(&CapsConfig::default(), transport);
//! let mut changes = service.subscribe();
//!
//! let from = FullJid::parse("bob@example.com/Laptop")?;
//! service
//!     .handle_presence(
//!         PresenceUpdate::available(from)
//!             .with_caps(CapsAdvertisement::new("http://example.com/client", "1.0")),
//!     )
//!     .await?;
//!
//! if let Some(change) = changes.recv().await {
//!     println!("{} now has {:?}", change.contact, change.new);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod aggregator;
pub mod cache;
pub mod error;
pub mod exposure;
pub mod scheduler;
pub mod service;
pub mod transport;

pub use aggregator::{BeginOutcome, CapabilityAggregator, ContactChange, JobId};
pub use cache::{BundleLookup, BundleSnapshot, BundleTrustCache, TrustState};
pub use error::{RuntimeError, RuntimeResult};
pub use exposure::{
    ChannelClass, ContactCapabilities, ContactRegistry, MediaFlags, channel_classes, media_flags,
};
pub use scheduler::{DiscoveryScheduler, QueryId, QueryOutcome, Resolution};
pub use service::{CapabilityService, PresenceReceipt};
pub use transport::DiscoTransport;
