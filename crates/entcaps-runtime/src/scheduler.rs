//! Discovery scheduler.
//!
//! Issues one disco#info query per `(signature, resource)` pair, without
//! deduplicating across contacts: independent replies are what confirmation
//! counting needs. Each query runs on its own task under a deadline and
//! reports a [`QueryOutcome`] back over a channel; the owner feeds outcomes
//! to [`DiscoveryScheduler::handle_outcome`], which updates the cache and
//! yields a [`Resolution`] for the aggregator.

use entcaps_core::{CapabilitySignature, CapsError, CapsResult, DiscoInfo, FeatureSet, FullJid};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, error, trace, warn};

use crate::aggregator::JobId;
use crate::cache::BundleTrustCache;
use crate::transport::DiscoTransport;

/// Identifier of one in-flight discovery query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryId(pub u64);

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

/// Raw result of a query task.
#[derive(Debug)]
pub struct QueryOutcome {
    /// The query.
    pub id: QueryId,
    /// Reply, or the failure that ended the query.
    pub result: CapsResult<DiscoInfo>,
}

/// A signature resolved for an aggregation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Job that scheduled the query.
    pub job: JobId,
    /// Signature the query was for.
    pub signature: CapabilitySignature,
    /// Features the job should use. Empty on failure.
    pub features: FeatureSet,
}

#[derive(Debug)]
struct PendingQuery {
    target: FullJid,
    signature: CapabilitySignature,
    node: String,
    job: JobId,
    task: AbortHandle,
}

/// Issues discovery queries and correlates their outcomes.
pub struct DiscoveryScheduler {
    transport: Arc<dyn DiscoTransport>,
    cache: Arc<BundleTrustCache>,
    timeout: Duration,
    pending: HashMap<QueryId, PendingQuery>,
    next_id: u64,
    outcomes: mpsc::UnboundedSender<QueryOutcome>,
}

impl fmt::Debug for DiscoveryScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryScheduler")
            .field("timeout", &self.timeout)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl DiscoveryScheduler {
    /// Create a scheduler and the receiver its query tasks report to.
    #[must_use]
    pub fn new(
        transport: Arc<dyn DiscoTransport>,
        cache: Arc<BundleTrustCache>,
        timeout: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<QueryOutcome>) {
        let (outcomes, receiver) = mpsc::unbounded_channel();
        let scheduler = Self {
            transport,
            cache,
            timeout,
            pending: HashMap::new(),
            next_id: 1,
            outcomes,
        };
        (scheduler, receiver)
    }

    /// Query `target` for `signature` on behalf of `job`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule(&mut self, signature: CapabilitySignature, target: FullJid, job: JobId) -> QueryId {
        let id = QueryId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);

        let node = signature.query_node();
        let now = Instant::now();
        let deadline = now.checked_add(self.timeout).unwrap_or(now);

        let transport = Arc::clone(&self.transport);
        let outcomes = self.outcomes.clone();
        let (task_target, task_node) = (target.clone(), node.clone());
        let task = tokio::spawn(async move {
            let reply =
                tokio::time::timeout_at(deadline, transport.disco_info(&task_target, &task_node))
                    .await;
            let result = reply.unwrap_or_else(|_| {
                Err(CapsError::QueryTimeout {
                    target: task_target.to_string(),
                    node: task_node,
                })
            });
            // The receiver is gone only when the owner shut down.
            let _ = outcomes.send(QueryOutcome { id, result });
        });

        debug!(query_id = %id, target = %target, node = %node, job = %job, "Discovery query issued");
        self.cache.attach_query(&signature, id);
        self.pending.insert(
            id,
            PendingQuery {
                target,
                signature,
                node,
                job,
                task: task.abort_handle(),
            },
        );
        id
    }

    /// Apply a query outcome to the cache.
    ///
    /// Returns `None` for queries this scheduler no longer tracks.
    pub fn handle_outcome(&mut self, outcome: QueryOutcome) -> Option<Resolution> {
        let Some(query) = self.pending.remove(&outcome.id) else {
            trace!(query_id = %outcome.id, "Outcome for unknown query");
            return None;
        };
        self.cache.detach_query(&query.signature, outcome.id);

        let features = match outcome.result.and_then(|reply| check_reply_node(&query.node, reply)) {
            Ok(reply) => self
                .cache
                .record_success(&query.signature, &query.target, &reply),
            Err(err) => {
                match &err {
                    CapsError::QueryTimeout { .. } => {
                        debug!(query_id = %outcome.id, target = %query.target, node = %query.node, "Discovery query timed out");
                    },
                    other if other.is_query_failure() => {
                        warn!(query_id = %outcome.id, target = %query.target, error = %other, "Discovery query failed");
                    },
                    other => {
                        error!(query_id = %outcome.id, target = %query.target, error = %other, "Transport returned an unexpected error");
                    },
                }
                self.cache.record_failure(&query.signature)
            },
        };

        Some(Resolution {
            job: query.job,
            signature: query.signature,
            features,
        })
    }

    /// Number of queries awaiting an outcome.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Abort every in-flight query task and forget them.
    pub fn cancel_all(&mut self) {
        for (id, query) in self.pending.drain() {
            query.task.abort();
            self.cache.detach_query(&query.signature, id);
        }
    }
}

impl Drop for DiscoveryScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// A reply that names a node must name the one that was queried.
fn check_reply_node(queried: &str, reply: DiscoInfo) -> CapsResult<DiscoInfo> {
    match reply.node.as_deref() {
        Some(node) if node != queried => Err(CapsError::MalformedReply {
            reason: format!("reply for node '{node}' to a query for '{queried}'"),
        }),
        _ => Ok(reply),
    }
}
