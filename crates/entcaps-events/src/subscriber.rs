//! Synchronous capability sinks.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::event::CapabilityChange;

/// The capability-exposure layer, notified synchronously on every change.
///
/// `on_change` runs on the publishing task. Keep it short.
pub trait CapabilitySink: Send + Sync {
    /// Called once per published change.
    fn on_change(&self, change: &CapabilityChange);

    /// Name used in logs.
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "anonymous"
    }
}

/// Registration handle for a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(Uuid);

impl SinkId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Registry of synchronous capability sinks.
#[derive(Default)]
pub struct SinkRegistry {
    sinks: RwLock<HashMap<SinkId, Arc<dyn CapabilitySink>>>,
}

impl std::fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkRegistry")
            .field("sink_count", &self.len())
            .finish()
    }
}

impl SinkRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink. The returned id unregisters it.
    pub fn register(&self, sink: Arc<dyn CapabilitySink>) -> SinkId {
        let id = SinkId::new();
        debug!(sink_name = %sink.name(), "Capability sink registered");
        self.sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, sink);
        id
    }

    /// Unregister a sink. Returns `true` if it was registered.
    pub fn unregister(&self, id: SinkId) -> bool {
        let removed = self
            .sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some();
        if removed {
            debug!("Capability sink unregistered");
        }
        removed
    }

    /// Deliver a change to every sink.
    ///
    /// A panicking sink is logged and does not prevent delivery to the
    /// others. Sinks run without the registry lock held, so they may
    /// register or unregister sinks.
    pub fn notify(&self, change: &CapabilityChange) {
        let sinks: Vec<(SinkId, Arc<dyn CapabilitySink>)> = self
            .sinks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, sink)| (*id, Arc::clone(sink)))
            .collect();

        for (id, sink) in &sinks {
            trace!(sink_name = %sink.name(), contact = %change.contact, "Notifying sink");

            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                sink.on_change(change);
            }));

            if let Err(e) = result {
                warn!(
                    sink_id = ?id,
                    sink_name = %sink.name(),
                    error = ?e,
                    "Capability sink panicked"
                );
            }
        }
    }

    /// Number of registered sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if no sink is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entcaps_core::{BareJid, Capabilities, ContactHandle};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(AtomicUsize);

    impl CapabilitySink for Counting {
        fn on_change(&self, _change: &CapabilityChange) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Panicking;

    impl CapabilitySink for Panicking {
        fn on_change(&self, _change: &CapabilityChange) {
            panic!("sink failure");
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    fn change() -> CapabilityChange {
        CapabilityChange::new(
            ContactHandle(1),
            BareJid::parse("alice@example.com").unwrap(),
            Capabilities::TEXT,
            Capabilities::TEXT | Capabilities::TUBES,
            1,
        )
    }

    #[test]
    fn test_register_notify_unregister() {
        let registry = SinkRegistry::new();
        let sink = Arc::new(Counting(AtomicUsize::new(0)));
        let id = registry.register(sink.clone());
        assert_eq!(registry.len(), 1);

        registry.notify(&change());
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        registry.notify(&change());
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    struct Unregistering {
        registry: Arc<SinkRegistry>,
        id: std::sync::Mutex<Option<SinkId>>,
    }

    impl CapabilitySink for Unregistering {
        fn on_change(&self, _change: &CapabilityChange) {
            if let Some(id) = self.id.lock().unwrap().take() {
                self.registry.unregister(id);
            }
            self.registry.register(Arc::new(Counting(AtomicUsize::new(0))));
        }
    }

    #[test]
    fn test_sink_may_change_registry_during_notify() {
        let registry = Arc::new(SinkRegistry::new());
        let sink = Arc::new(Unregistering {
            registry: Arc::clone(&registry),
            id: std::sync::Mutex::new(None),
        });
        let id = registry.register(sink.clone());
        *sink.id.lock().unwrap() = Some(id);

        registry.notify(&change());

        // The unregistering sink is gone; the sink it added remains.
        assert_eq!(registry.len(), 1);
        assert!(!registry.unregister(id));
    }

    #[test]
    fn test_panicking_sink_is_isolated() {
        let registry = SinkRegistry::new();
        let sink = Arc::new(Counting(AtomicUsize::new(0)));
        registry.register(Arc::new(Panicking));
        registry.register(sink.clone());

        registry.notify(&change());
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
    }
}
