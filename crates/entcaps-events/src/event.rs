//! Capability change event type.

use chrono::{DateTime, Utc};
use entcaps_core::{BareJid, Capabilities, ContactHandle};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata attached to every published change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
    /// Per-contact sequence number, strictly increasing in publication order.
    pub sequence: u64,
}

impl EventMetadata {
    /// Create new event metadata.
    #[must_use]
    pub fn new(sequence: u64) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            sequence,
        }
    }
}

/// A contact's effective capability set changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityChange {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Handle of the contact.
    pub handle: ContactHandle,
    /// Bare address of the contact.
    pub contact: BareJid,
    /// Previously published set.
    pub old: Capabilities,
    /// Newly published set.
    pub new: Capabilities,
}

impl CapabilityChange {
    /// Create a change event.
    #[must_use]
    pub fn new(
        handle: ContactHandle,
        contact: BareJid,
        old: Capabilities,
        new: Capabilities,
        sequence: u64,
    ) -> Self {
        Self {
            metadata: EventMetadata::new(sequence),
            handle,
            contact,
            old,
            new,
        }
    }

    /// Bits present in the new set but not the old one.
    #[must_use]
    pub fn added(&self) -> Capabilities {
        self.new.difference(self.old)
    }

    /// Bits present in the old set but not the new one.
    #[must_use]
    pub fn removed(&self) -> Capabilities {
        self.old.difference(self.new)
    }
}
