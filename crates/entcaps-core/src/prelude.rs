//! Prelude module - commonly used types for convenient import.
//!
//! Use `use entcaps_core::prelude::*;` to import all essential types.

// Errors
pub use crate::{CapsError, CapsResult};

// Addressing
pub use crate::{BareJid, ContactHandle, FullJid};

// Presence and signatures
pub use crate::{
    Availability, BundleToken, CapabilitySignature, CapsAdvertisement, Digest, HashAlgorithm,
    PresenceCapabilityRef, PresenceUpdate,
};

// Discovery
pub use crate::{DataForm, DiscoInfo, FormField, Identity, SoftwareInfo};

// Features and verification
pub use crate::{BASELINE, Capabilities, FeatureMap, FeatureSet, HashVerifier, Verification};
