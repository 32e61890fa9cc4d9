//! Contact addressing.
//!
//! Presence arrives per full address (`user@domain/resource`), while
//! published capabilities belong to the bare contact (`user@domain`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CapsError, CapsResult};

/// A bare contact address (`user@domain`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BareJid(String);

impl BareJid {
    /// Parse a bare address.
    ///
    /// The domain part is case-insensitive and is normalized to lowercase.
    ///
    /// # Errors
    ///
    /// Returns [`CapsError::InvalidAddress`] if the string is empty, carries a
    /// resource, or has an empty local or domain part.
    pub fn parse(s: &str) -> CapsResult<Self> {
        if s.is_empty() || s.contains('/') {
            return Err(CapsError::InvalidAddress(s.to_string()));
        }

        let normalized = match s.split_once('@') {
            Some((local, domain)) => {
                if local.is_empty() || domain.is_empty() || domain.contains('@') {
                    return Err(CapsError::InvalidAddress(s.to_string()));
                }
                format!("{local}@{}", domain.to_ascii_lowercase())
            },
            None => s.to_ascii_lowercase(),
        };

        Ok(Self(normalized))
    }

    /// The address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Attach a resource, producing a full address.
    #[must_use]
    pub fn with_resource(&self, resource: impl Into<String>) -> FullJid {
        FullJid {
            bare: self.clone(),
            resource: resource.into(),
        }
    }
}

impl fmt::Display for BareJid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BareJid {
    type Err = CapsError;

    fn from_str(s: &str) -> CapsResult<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BareJid {
    type Error = CapsError;

    fn try_from(s: String) -> CapsResult<Self> {
        Self::parse(&s)
    }
}

impl From<BareJid> for String {
    fn from(jid: BareJid) -> Self {
        jid.0
    }
}

/// A full address: a bare contact plus one of its resources.
///
/// The resource may be empty for presence sent from a bare address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FullJid {
    /// The contact this resource belongs to.
    pub bare: BareJid,
    /// The resource part (possibly empty).
    pub resource: String,
}

impl FullJid {
    /// Parse a full address (`user@domain/resource`).
    ///
    /// # Errors
    ///
    /// Returns [`CapsError::InvalidAddress`] if the bare part is invalid.
    pub fn parse(s: &str) -> CapsResult<Self> {
        let (bare, resource) = match s.split_once('/') {
            Some((bare, resource)) => (bare, resource),
            None => (s, ""),
        };

        Ok(Self {
            bare: BareJid::parse(bare)?,
            resource: resource.to_string(),
        })
    }

    /// The bare contact address.
    #[must_use]
    pub fn bare(&self) -> &BareJid {
        &self.bare
    }
}

impl fmt::Display for FullJid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.resource.is_empty() {
            write!(f, "{}", self.bare)
        } else {
            write!(f, "{}/{}", self.bare, self.resource)
        }
    }
}

impl FromStr for FullJid {
    type Err = CapsError;

    fn from_str(s: &str) -> CapsResult<Self> {
        Self::parse(s)
    }
}

/// An opaque, non-zero handle naming a contact at the exposure boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContactHandle(pub u32);

impl fmt::Display for ContactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
