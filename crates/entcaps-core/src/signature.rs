//! Capability bundle signatures and the presence updates that carry them.
//!
//! A presence stanza's `<c xmlns='http://jabber.org/protocol/caps'/>`
//! element names one base bundle (`node#ver`, optionally hashed) and zero or
//! more legacy extension bundles (`node#ext`). Each bundle is identified by a
//! [`CapabilitySignature`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::address::FullJid;

/// Digest algorithm declared in the `hash` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// `sha-1`, the algorithm every XEP-0115 implementation must support.
    Sha1,
    /// `sha-256`.
    Sha256,
    /// Any other declared algorithm. Kept for identity, never verified.
    Other(String),
}

impl HashAlgorithm {
    /// Parse the IANA hash function text name used in presence.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "sha-1" => Self::Sha1,
            "sha-256" => Self::Sha256,
            _ => Self::Other(name.to_string()),
        }
    }

    /// The text name of the algorithm.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Sha1 => "sha-1",
            Self::Sha256 => "sha-256",
            Self::Other(name) => name,
        }
    }

    /// Whether digests with this algorithm can be recomputed locally.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An advertised digest: algorithm plus base64 value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest {
    /// Declared algorithm.
    pub algorithm: HashAlgorithm,
    /// Base64-encoded digest, as advertised.
    pub value: String,
}

/// The token part of a bundle: a version string or a legacy extension name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleToken {
    /// The `ver` attribute.
    Version(String),
    /// One name from the `ext` attribute.
    Extension(String),
}

impl BundleToken {
    /// The raw token string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Version(token) | Self::Extension(token) => token,
        }
    }
}

/// Identity of one capability bundle.
///
/// Two signatures are equal iff node, token, algorithm and digest are all
/// equal, so a different digest under the same node and token is a distinct
/// cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilitySignature {
    /// The client's node URI.
    pub node: String,
    /// Version or extension token.
    pub token: BundleToken,
    /// Advertised digest, for hashed base bundles.
    pub digest: Option<Digest>,
}

impl CapabilitySignature {
    /// An unhashed base bundle (`node#ver`).
    #[must_use]
    pub fn version(node: impl Into<String>, ver: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            token: BundleToken::Version(ver.into()),
            digest: None,
        }
    }

    /// A hashed base bundle. The `ver` attribute is the digest itself.
    #[must_use]
    pub fn hashed(node: impl Into<String>, ver: impl Into<String>, algorithm: HashAlgorithm) -> Self {
        let ver = ver.into();
        Self {
            node: node.into(),
            token: BundleToken::Version(ver.clone()),
            digest: Some(Digest {
                algorithm,
                value: ver,
            }),
        }
    }

    /// A legacy extension bundle (`node#ext`). Extensions never carry a digest.
    #[must_use]
    pub fn extension(node: impl Into<String>, ext: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            token: BundleToken::Extension(ext.into()),
            digest: None,
        }
    }

    /// The node a disco#info query for this bundle is scoped to.
    #[must_use]
    pub fn query_node(&self) -> String {
        format!("{}#{}", self.node, self.token.as_str())
    }

    /// The digest, if its algorithm can be verified locally.
    #[must_use]
    pub fn verified_digest(&self) -> Option<&Digest> {
        self.digest.as_ref().filter(|d| d.algorithm.is_supported())
    }

    /// Whether a single verified reply is enough to trust this bundle.
    #[must_use]
    pub fn is_hashed(&self) -> bool {
        self.verified_digest().is_some()
    }
}

impl fmt::Display for CapabilitySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.node, self.token.as_str())?;
        if let Some(digest) = &self.digest {
            write!(f, " ({})", digest.algorithm)?;
        }
        Ok(())
    }
}

/// The `<c/>` element of a presence stanza.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapsAdvertisement {
    /// Client node URI.
    pub node: String,
    /// Version string or verification string.
    pub ver: String,
    /// Declared hash algorithm, if any.
    #[serde(default)]
    pub hash: Option<String>,
    /// Legacy extension names.
    #[serde(default)]
    pub ext: Vec<String>,
}

impl CapsAdvertisement {
    /// An advertisement without hash or extensions.
    #[must_use]
    pub fn new(node: impl Into<String>, ver: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            ver: ver.into(),
            hash: None,
            ext: Vec::new(),
        }
    }

    /// Declare a hash algorithm.
    #[must_use]
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    /// Set extensions from the space-separated `ext` attribute.
    #[must_use]
    pub fn with_ext(mut self, ext: &str) -> Self {
        self.ext = ext.split_whitespace().map(ToString::to_string).collect();
        self
    }

    /// The signatures this advertisement references, base first.
    #[must_use]
    pub fn signatures(&self) -> PresenceCapabilityRef {
        let base = match &self.hash {
            Some(hash) => {
                CapabilitySignature::hashed(&self.node, &self.ver, HashAlgorithm::parse(hash))
            },
            None => CapabilitySignature::version(&self.node, &self.ver),
        };

        let mut refs = PresenceCapabilityRef::default();
        refs.push(base);
        for ext in &self.ext {
            refs.push(CapabilitySignature::extension(&self.node, ext));
        }
        refs
    }
}

/// The set of signatures one presence stanza references for one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceCapabilityRef {
    signatures: Vec<CapabilitySignature>,
}

impl PresenceCapabilityRef {
    /// Add a signature, ignoring duplicates.
    pub fn push(&mut self, signature: CapabilitySignature) {
        if !self.signatures.contains(&signature) {
            self.signatures.push(signature);
        }
    }

    /// The referenced signatures, in advertisement order.
    #[must_use]
    pub fn signatures(&self) -> &[CapabilitySignature] {
        &self.signatures
    }

    /// Whether no signature is referenced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Number of referenced signatures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.signatures.len()
    }
}

impl IntoIterator for PresenceCapabilityRef {
    type Item = CapabilitySignature;
    type IntoIter = std::vec::IntoIter<CapabilitySignature>;

    fn into_iter(self) -> Self::IntoIter {
        self.signatures.into_iter()
    }
}

/// Presence availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Any available presence (including away, dnd...).
    Available,
    /// `type='unavailable'`.
    Unavailable,
}

/// A presence update for one contact resource, as delivered by the presence layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUpdate {
    /// Sending resource.
    pub from: FullJid,
    /// Availability.
    pub availability: Availability,
    /// Resource priority.
    #[serde(default)]
    pub priority: i8,
    /// Capability advertisement, if present.
    #[serde(default)]
    pub caps: Option<CapsAdvertisement>,
}

impl PresenceUpdate {
    /// An available presence without capabilities.
    #[must_use]
    pub fn available(from: FullJid) -> Self {
        Self {
            from,
            availability: Availability::Available,
            priority: 0,
            caps: None,
        }
    }

    /// An unavailable presence.
    #[must_use]
    pub fn unavailable(from: FullJid) -> Self {
        Self {
            from,
            availability: Availability::Unavailable,
            priority: 0,
            caps: None,
        }
    }

    /// Attach a capability advertisement.
    #[must_use]
    pub fn with_caps(mut self, caps: CapsAdvertisement) -> Self {
        self.caps = Some(caps);
        self
    }

    /// Set the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i8) -> Self {
        self.priority = priority;
        self
    }

    /// Signatures referenced by this update. Unavailable presence references none.
    #[must_use]
    pub fn capability_ref(&self) -> PresenceCapabilityRef {
        match (&self.availability, &self.caps) {
            (Availability::Available, Some(caps)) => caps.signatures(),
            _ => PresenceCapabilityRef::default(),
        }
    }
}
