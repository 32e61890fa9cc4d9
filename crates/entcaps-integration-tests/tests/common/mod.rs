//! Shared test harness for integration tests.

use std::sync::Arc;
use std::time::Duration;

use entcaps_config::CapsConfig;
use entcaps_core::{CapsAdvertisement, ContactHandle, PresenceUpdate};
use entcaps_events::{CapabilityChange, ChangeReceiver};
use entcaps_runtime::{CapabilityService, PresenceReceipt};
use entcaps_test::{MockDiscoTransport, QueryInbox, RecordingSink, contact, init_test_logging};

/// How long to wait for an expected change.
const CHANGE_TIMEOUT: Duration = Duration::from_secs(5);

/// A capability service wired to a scripted transport.
#[allow(dead_code)]
pub struct CapsHarness {
    /// The service under test.
    pub service: CapabilityService,
    /// The scripted transport.
    pub transport: Arc<MockDiscoTransport>,
    /// Queries the transport holds for the test.
    pub inbox: QueryInbox,
    /// Receives every published change.
    pub changes: ChangeReceiver,
    /// Records every published change synchronously.
    pub sink: Arc<RecordingSink>,
}

#[allow(dead_code)]
impl CapsHarness {
    /// Build a harness with default configuration.
    pub fn new() -> Self {
        Self::with_config(&CapsConfig::default())
    }

    /// Build a harness with the given configuration.
    pub fn with_config(config: &CapsConfig) -> Self {
        init_test_logging();
        let (transport, inbox) = MockDiscoTransport::new();
        let service = CapabilityService::spawn(config, transport.clone());
        let changes = service.subscribe();
        let sink = RecordingSink::new();
        service.register_sink(sink.clone());
        Self {
            service,
            transport,
            inbox,
            changes,
            sink,
        }
    }

    /// Deliver available presence from the `n`th contact.
    pub async fn present(&self, n: usize, caps: CapsAdvertisement) -> PresenceReceipt {
        self.service
            .handle_presence(PresenceUpdate::available(contact(n)).with_caps(caps))
            .await
            .expect("service running")
    }

    /// Deliver unavailable presence from the `n`th contact.
    pub async fn offline(&self, n: usize) -> PresenceReceipt {
        self.service
            .handle_presence(PresenceUpdate::unavailable(contact(n)))
            .await
            .expect("service running")
    }

    /// The handle of the `n`th contact.
    pub async fn handle(&self, n: usize) -> ContactHandle {
        self.service
            .ensure_contact(contact(n).bare)
            .await
            .expect("service running")
    }

    /// Wait for the next published change.
    pub async fn next_change(&mut self) -> Arc<CapabilityChange> {
        tokio::time::timeout(CHANGE_TIMEOUT, self.changes.recv())
            .await
            .expect("timed out waiting for a capability change")
            .expect("notifier closed")
    }

    /// Wait until exactly `expected` queries are in flight.
    pub async fn settle(&self, expected: usize) {
        tokio::time::timeout(CHANGE_TIMEOUT, async {
            while self.service.pending_queries().await.expect("service running") != expected {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("queries did not settle");
    }

    /// Assert nothing was published since the last received change.
    pub fn assert_no_change(&mut self) {
        assert!(
            self.changes.try_recv().is_none(),
            "unexpected capability change"
        );
    }
}
