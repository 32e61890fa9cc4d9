//! Prelude module - commonly used types for convenient import.
//!
//! Use `use entcaps_runtime::prelude::*;` to import all essential types.

// Errors
pub use crate::{RuntimeError, RuntimeResult};

// Service
pub use crate::{CapabilityService, PresenceReceipt};

// Trust cache
pub use crate::{BundleLookup, BundleSnapshot, BundleTrustCache, TrustState};

// Discovery
pub use crate::{DiscoTransport, DiscoveryScheduler, QueryId};

// Aggregation
pub use crate::{CapabilityAggregator, ContactChange, JobId};

// Exposure
pub use crate::{ChannelClass, ContactCapabilities, MediaFlags};
