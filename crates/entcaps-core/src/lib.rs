//! Entcaps Core - Foundation types for XMPP entity capability tracking.
//!
//! This crate provides:
//! - Contact addressing (bare and full JIDs, contact handles)
//! - Capability bundle signatures extracted from presence (`<c/>` elements)
//! - Service discovery reply types (identities, features, data forms)
//! - The static feature map from discovered features to capability bits
//! - XEP-0115 verification string computation and digest checking
//! - The error taxonomy shared by the capability runtime
//!
//! Nothing in this crate performs I/O or holds mutable shared state.
//!
//! # Example
//!
//! ```
//! use entcaps_core::{Capabilities, DiscoInfo, FeatureMap, HashAlgorithm, HashVerifier};
//!
//! let info = DiscoInfo::new()
//!     .with_feature("http://jabber.org/protocol/jingle")
//!     .with_feature("http://jabber.org/protocol/jingle/description/audio");
//!
//! let bits = FeatureMap::lookup_all(info.features.iter());
//! assert!(bits.contains(Capabilities::JINGLE_AUDIO));
//!
//! let digest = HashVerifier::recompute_digest(&HashAlgorithm::Sha1, &info);
//! assert!(digest.is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod address;
pub mod disco;
pub mod error;
pub mod features;
pub mod hash;
pub mod signature;

pub use address::{BareJid, ContactHandle, FullJid};
pub use disco::{DataForm, DiscoInfo, FormField, Identity, SoftwareInfo};
pub use error::{CapsError, CapsResult};
pub use features::{BASELINE, Capabilities, FeatureMap, FeatureSet, ns};
pub use hash::{HashVerifier, Verification};
pub use signature::{
    Availability, BundleToken, CapabilitySignature, CapsAdvertisement, Digest, HashAlgorithm,
    PresenceCapabilityRef, PresenceUpdate,
};
