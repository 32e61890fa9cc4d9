//! Entcaps Events - Capability change notification.
//!
//! Every completed aggregation that changes a contact's effective capability
//! set produces exactly one [`CapabilityChange`]. The [`ChangeNotifier`]
//! delivers it two ways:
//!
//! 1. **Async receivers**: `notifier.subscribe()` returns a [`ChangeReceiver`].
//! 2. **Synchronous sinks**: implementations of [`CapabilitySink`] registered
//!    with the [`SinkRegistry`] are called before `publish` returns.
//!
//! Changes for a single contact are delivered in publication order.
//!
//! # Example
//!
//! ```rust
//! use entcaps_core::{BareJid, Capabilities, ContactHandle};
//! use entcaps_events::ChangeNotifier;
//!
//! # async fn example() {
//! let notifier = ChangeNotifier::new();
//! let mut receiver = notifier.subscribe();
//!
//! notifier.publish(
//!     ContactHandle(1),
//!     BareJid::parse("bob@example.com").unwrap(),
//!     Capabilities::TEXT,
//!     Capabilities::TEXT | Capabilities::FILE_TRANSFER,
//! );
//!
//! let change = receiver.recv().await.unwrap();
//! assert_eq!(change.added(), Capabilities::FILE_TRANSFER);
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod event;
mod notifier;
mod subscriber;

pub use event::{CapabilityChange, EventMetadata};
pub use notifier::{ChangeNotifier, ChangeReceiver, DEFAULT_CHANNEL_CAPACITY};
pub use subscriber::{CapabilitySink, SinkId, SinkRegistry};
