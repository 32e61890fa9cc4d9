//! Mock implementations for testing.

use async_trait::async_trait;
use entcaps_core::{CapsError, CapsResult, DiscoInfo, FullJid};
use entcaps_events::{CapabilityChange, CapabilitySink};
use entcaps_runtime::DiscoTransport;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// How long [`QueryInbox::expect_query`] waits before failing the test.
const EXPECT_TIMEOUT: Duration = Duration::from_secs(5);

/// One recorded disco#info request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoRequest {
    /// Queried address.
    pub target: FullJid,
    /// Queried node.
    pub node: String,
}

/// A query held by the test until it replies, fails, or drops it.
///
/// Dropping the query answers it with a remote error.
#[derive(Debug)]
pub struct MockQuery {
    /// Queried address.
    pub target: FullJid,
    /// Queried node.
    pub node: String,
    responder: oneshot::Sender<CapsResult<DiscoInfo>>,
}

impl MockQuery {
    /// Answer with a reply.
    pub fn reply(self, info: DiscoInfo) {
        let _ = self.responder.send(Ok(info));
    }

    /// Answer with an error.
    pub fn fail(self, error: CapsError) {
        let _ = self.responder.send(Err(error));
    }
}

/// Scripted discovery transport.
///
/// Nodes registered with [`with_auto_reply`](Self::with_auto_reply) answer
/// at once. Every other query is handed to the test through the
/// [`QueryInbox`] returned by [`new`](Self::new).
#[derive(Debug)]
pub struct MockDiscoTransport {
    auto_replies: Mutex<HashMap<String, DiscoInfo>>,
    requests: Mutex<Vec<DiscoRequest>>,
    queries: mpsc::UnboundedSender<MockQuery>,
}

impl MockDiscoTransport {
    /// Create a transport and the inbox its held queries arrive in.
    #[must_use]
    pub fn new() -> (Arc<Self>, QueryInbox) {
        let (queries, inbox) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            auto_replies: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            queries,
        });
        (transport, QueryInbox { inbox })
    }

    /// Answer every query for `node` with `info`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn with_auto_reply(&self, node: impl Into<String>, info: DiscoInfo) {
        self.auto_replies
            .lock()
            .expect("lock poisoned")
            .insert(node.into(), info);
    }

    /// Every request received so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn requests(&self) -> Vec<DiscoRequest> {
        self.requests.lock().expect("lock poisoned").clone()
    }

    /// Number of requests received so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests().len()
    }
}

#[async_trait]
impl DiscoTransport for MockDiscoTransport {
    async fn disco_info(&self, target: &FullJid, node: &str) -> CapsResult<DiscoInfo> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(DiscoRequest {
                target: target.clone(),
                node: node.to_owned(),
            });
        }

        let auto = self
            .auto_replies
            .lock()
            .ok()
            .and_then(|replies| replies.get(node).cloned());
        if let Some(info) = auto {
            return Ok(info);
        }

        let (responder, response) = oneshot::channel();
        let query = MockQuery {
            target: target.clone(),
            node: node.to_owned(),
            responder,
        };
        let dropped = || CapsError::RemoteError {
            target: target.to_string(),
            condition: "recipient-unavailable".to_owned(),
        };
        if self.queries.send(query).is_err() {
            return Err(dropped());
        }
        response.await.unwrap_or_else(|_| Err(dropped()))
    }
}

/// Receives the queries a [`MockDiscoTransport`] holds for the test.
#[derive(Debug)]
pub struct QueryInbox {
    inbox: mpsc::UnboundedReceiver<MockQuery>,
}

impl QueryInbox {
    /// Wait for the next held query.
    ///
    /// # Panics
    ///
    /// Panics if no query arrives in time.
    pub async fn expect_query(&mut self) -> MockQuery {
        tokio::time::timeout(EXPECT_TIMEOUT, self.inbox.recv())
            .await
            .expect("timed out waiting for a disco query")
            .expect("transport dropped")
    }

    /// Wait for the next held query for `node`, with the queries for other
    /// nodes that arrived first.
    ///
    /// # Panics
    ///
    /// Panics if no such query arrives in time.
    pub async fn expect_query_for(&mut self, node: &str) -> (MockQuery, Vec<MockQuery>) {
        let mut others = Vec::new();
        loop {
            let query = self.expect_query().await;
            if query.node == node {
                return (query, others);
            }
            others.push(query);
        }
    }

    /// The next held query, if one is already waiting.
    pub fn try_query(&mut self) -> Option<MockQuery> {
        self.inbox.try_recv().ok()
    }
}

/// Capability sink that records every change it sees.
#[derive(Debug, Default)]
pub struct RecordingSink {
    changes: Mutex<Vec<CapabilityChange>>,
}

impl RecordingSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every change recorded so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn changes(&self) -> Vec<CapabilityChange> {
        self.changes.lock().expect("lock poisoned").clone()
    }

    /// Number of changes recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes().len()
    }

    /// Check if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CapabilitySink for RecordingSink {
    fn on_change(&self, change: &CapabilityChange) {
        if let Ok(mut changes) = self.changes.lock() {
            changes.push(change.clone());
        }
    }

    fn name(&self) -> &str {
        "recording"
    }
}
