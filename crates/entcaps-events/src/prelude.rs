//! Prelude module - commonly used types for convenient import.
//!
//! Use `use entcaps_events::prelude::*;` to import all essential types.

// Notifier
pub use crate::{ChangeNotifier, ChangeReceiver, DEFAULT_CHANNEL_CAPACITY};

// Events
pub use crate::{CapabilityChange, EventMetadata};

// Synchronous sinks
pub use crate::{CapabilitySink, SinkId, SinkRegistry};
