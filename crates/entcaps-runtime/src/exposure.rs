//! Exposure boundary: contact handles and requestable channel classes.
//!
//! Unknown handles never fault here. Batch queries omit them and single
//! queries return an empty list.

use bitflags::bitflags;
use entcaps_core::{BareJid, Capabilities, ContactHandle};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{RuntimeError, RuntimeResult};

bitflags! {
    /// Media properties of a streamed-media channel class.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct MediaFlags: u32 {
        /// Audio calls.
        const AUDIO = 1 << 0;
        /// Video calls.
        const VIDEO = 1 << 1;
        /// Streams cannot be added or removed after the call starts.
        const IMMUTABLE_STREAMS = 1 << 2;
        /// Contents can be added or removed during the call.
        const MUTABLE_CONTENTS = 1 << 3;
    }
}

/// A channel type that can be requested towards a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelClass {
    /// Text chat.
    Text,
    /// Audio and/or video calls.
    StreamedMedia(MediaFlags),
    /// File transfer.
    FileTransfer,
    /// Tubes.
    Tube,
}

/// Requestable channel classes of one contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactCapabilities {
    /// The contact.
    pub handle: ContactHandle,
    /// Its channel classes. Text comes first.
    pub classes: Vec<ChannelClass>,
}

/// Media flags a contact's bits support, if any.
#[must_use]
pub fn media_flags(bits: Capabilities) -> MediaFlags {
    let jingle = bits.contains(Capabilities::JINGLE) && bits.intersects(Capabilities::TRANSPORTS);

    let mut flags = MediaFlags::empty();
    if (jingle && bits.contains(Capabilities::JINGLE_AUDIO)) || bits.contains(Capabilities::GTALK_VOICE) {
        flags |= MediaFlags::AUDIO;
    }
    if (jingle && bits.contains(Capabilities::JINGLE_VIDEO)) || bits.contains(Capabilities::GTALK_VIDEO) {
        flags |= MediaFlags::VIDEO;
    }

    if flags.contains(MediaFlags::AUDIO | MediaFlags::VIDEO) {
        flags | MediaFlags::MUTABLE_CONTENTS
    } else if flags.is_empty() {
        flags
    } else {
        flags | MediaFlags::IMMUTABLE_STREAMS
    }
}

/// Translate capability bits into requestable channel classes.
#[must_use]
pub fn channel_classes(bits: Capabilities) -> Vec<ChannelClass> {
    let mut classes = vec![ChannelClass::Text];

    let media = media_flags(bits);
    if !media.is_empty() {
        classes.push(ChannelClass::StreamedMedia(media));
    }
    if bits.contains(Capabilities::FILE_TRANSFER) {
        classes.push(ChannelClass::FileTransfer);
    }
    if bits.contains(Capabilities::TUBES) {
        classes.push(ChannelClass::Tube);
    }

    classes
}

/// Stable mapping between contacts and handles.
///
/// Handles start at 1 and are never reused or released.
#[derive(Debug, Default)]
pub struct ContactRegistry {
    by_contact: HashMap<BareJid, ContactHandle>,
    by_handle: HashMap<ContactHandle, BareJid>,
    last: u32,
}

impl ContactRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The handle for `contact`, allocating one if needed.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::HandlesExhausted`] once `u32::MAX` handles
    /// have been allocated.
    pub fn ensure(&mut self, contact: &BareJid) -> RuntimeResult<ContactHandle> {
        if let Some(handle) = self.by_contact.get(contact) {
            return Ok(*handle);
        }
        let next = self
            .last
            .checked_add(1)
            .ok_or(RuntimeError::HandlesExhausted)?;
        self.last = next;
        let handle = ContactHandle(next);
        self.by_contact.insert(contact.clone(), handle);
        self.by_handle.insert(handle, contact.clone());
        Ok(handle)
    }

    /// The contact behind a handle.
    #[must_use]
    pub fn contact(&self, handle: ContactHandle) -> Option<&BareJid> {
        self.by_handle.get(&handle)
    }

    /// The handle of a contact, if one was allocated.
    #[must_use]
    pub fn handle(&self, contact: &BareJid) -> Option<ContactHandle> {
        self.by_contact.get(contact).copied()
    }

    /// Number of allocated handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    /// Check if no handle was allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }
}
