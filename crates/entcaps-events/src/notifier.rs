//! Change notifier: fans capability changes out to receivers and sinks.

use dashmap::DashMap;
use entcaps_core::{BareJid, Capabilities, ContactHandle};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::event::CapabilityChange;
use crate::subscriber::SinkRegistry;

/// Default channel capacity for the notifier.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Publishes capability changes.
///
/// Async receivers get changes through a broadcast channel; sinks in the
/// [`SinkRegistry`] are called synchronously during [`publish`](Self::publish).
/// Clones share the channel, the registry and the sequence counters.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<Arc<CapabilityChange>>,
    registry: Arc<SinkRegistry>,
    sequences: Arc<DashMap<ContactHandle, u64>>,
    capacity: usize,
}

impl ChangeNotifier {
    /// Create a notifier with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a notifier with the given broadcast capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            registry: Arc::new(SinkRegistry::new()),
            sequences: Arc::new(DashMap::new()),
            capacity,
        }
    }

    /// Publish one change for a contact.
    ///
    /// Changes for the same contact carry strictly increasing sequence
    /// numbers in call order.
    pub fn publish(
        &self,
        handle: ContactHandle,
        contact: BareJid,
        old: Capabilities,
        new: Capabilities,
    ) -> Arc<CapabilityChange> {
        let sequence = {
            let mut seq = self.sequences.entry(handle).or_insert(0);
            *seq = seq.saturating_add(1);
            *seq
        };
        let change = Arc::new(CapabilityChange::new(handle, contact, old, new, sequence));

        match self.sender.send(Arc::clone(&change)) {
            Ok(receivers) => debug!(
                contact = %change.contact,
                old = ?change.old,
                new = ?change.new,
                receivers,
                "Capability change published"
            ),
            Err(_) => trace!(contact = %change.contact, "No receivers for capability change"),
        }

        self.registry.notify(&change);
        change
    }

    /// Receive every change.
    #[must_use]
    pub fn subscribe(&self) -> ChangeReceiver {
        ChangeReceiver::new(self.sender.subscribe(), None)
    }

    /// Receive only changes for one contact.
    #[must_use]
    pub fn subscribe_contact(&self, handle: ContactHandle) -> ChangeReceiver {
        ChangeReceiver::new(self.sender.subscribe(), Some(handle))
    }

    /// The synchronous sink registry.
    #[must_use]
    pub fn registry(&self) -> &SinkRegistry {
        &self.registry
    }

    /// Number of async receivers plus registered sinks.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender
            .receiver_count()
            .saturating_add(self.registry.len())
    }

    /// The broadcast channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver for capability changes.
pub struct ChangeReceiver {
    receiver: broadcast::Receiver<Arc<CapabilityChange>>,
    contact: Option<ContactHandle>,
}

impl ChangeReceiver {
    fn new(
        receiver: broadcast::Receiver<Arc<CapabilityChange>>,
        contact: Option<ContactHandle>,
    ) -> Self {
        Self { receiver, contact }
    }

    fn matches(&self, change: &CapabilityChange) -> bool {
        self.contact.is_none_or(|handle| handle == change.handle)
    }

    /// Receive the next change.
    ///
    /// Returns `None` once the notifier and all its clones are dropped.
    /// Lagging receivers skip the changes they missed.
    pub async fn recv(&mut self) -> Option<Arc<CapabilityChange>> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => {
                    if self.matches(&change) {
                        return Some(change);
                    }
                },
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(skipped = count, "Change receiver lagged, changes dropped");
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receive the next change without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<CapabilityChange>> {
        loop {
            match self.receiver.try_recv() {
                Ok(change) => {
                    if self.matches(&change) {
                        return Some(change);
                    }
                },
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!(skipped = count, "Change receiver lagged, changes dropped");
                },
                Err(
                    broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
                ) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriber::CapabilitySink;
    use std::sync::Mutex;

    fn bob() -> BareJid {
        BareJid::parse("bob@example.com").unwrap()
    }

    #[tokio::test]
    async fn test_publish_and_receive() {
        let notifier = ChangeNotifier::new();
        let mut receiver = notifier.subscribe();

        notifier.publish(ContactHandle(1), bob(), Capabilities::TEXT, Capabilities::TEXT | Capabilities::TUBES);

        let change = receiver.recv().await.unwrap();
        assert_eq!(change.handle, ContactHandle(1));
        assert_eq!(change.added(), Capabilities::TUBES);
    }

    #[tokio::test]
    async fn test_sequence_is_per_contact() {
        let notifier = ChangeNotifier::new();
        let a = notifier.publish(ContactHandle(1), bob(), Capabilities::TEXT, Capabilities::all());
        let b = notifier.publish(ContactHandle(2), bob(), Capabilities::TEXT, Capabilities::all());
        let c = notifier.publish(ContactHandle(1), bob(), Capabilities::all(), Capabilities::TEXT);
        assert_eq!(a.metadata.sequence, 1);
        assert_eq!(b.metadata.sequence, 1);
        assert_eq!(c.metadata.sequence, 2);
    }

    #[tokio::test]
    async fn test_contact_filter() {
        let notifier = ChangeNotifier::new();
        let mut only_two = notifier.subscribe_contact(ContactHandle(2));

        notifier.publish(ContactHandle(1), bob(), Capabilities::TEXT, Capabilities::all());
        notifier.publish(ContactHandle(2), bob(), Capabilities::TEXT, Capabilities::all());

        assert_eq!(only_two.try_recv().unwrap().handle, ContactHandle(2));
        assert!(only_two.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_sink_called_synchronously() {
        struct Recording(Mutex<Vec<ContactHandle>>);
        impl CapabilitySink for Recording {
            fn on_change(&self, change: &CapabilityChange) {
                self.0.lock().unwrap().push(change.handle);
            }
        }

        let notifier = ChangeNotifier::new();
        let sink = Arc::new(Recording(Mutex::new(Vec::new())));
        notifier.registry().register(sink.clone());
        assert_eq!(notifier.subscriber_count(), 1);

        notifier.publish(ContactHandle(3), bob(), Capabilities::TEXT, Capabilities::all());
        assert_eq!(*sink.0.lock().unwrap(), vec![ContactHandle(3)]);
    }

    #[tokio::test]
    async fn test_recv_closed() {
        let notifier = ChangeNotifier::with_capacity(8);
        assert_eq!(notifier.capacity(), 8);
        let mut receiver = notifier.subscribe();
        drop(notifier);
        assert!(receiver.recv().await.is_none());
    }
}
