//! Capability service: the single writer that owns aggregation state.
//!
//! All mutable state except the shared [`BundleTrustCache`] lives in one
//! actor task. Callers talk to it through a cloneable [`CapabilityService`]
//! handle; query tasks report back through the scheduler's outcome channel.
//! Because one task applies every presence update and every query outcome,
//! a job completes at most once and changes for a contact are published in
//! completion order.

use entcaps_config::CapsConfig;
use entcaps_core::{
    BareJid, Capabilities, CapabilitySignature, CapsError, ContactHandle, FullJid, PresenceUpdate,
};
use entcaps_events::{CapabilitySink, ChangeNotifier, ChangeReceiver, SinkId};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::aggregator::{CapabilityAggregator, ContactChange, JobId};
use crate::cache::BundleTrustCache;
use crate::error::{RuntimeError, RuntimeResult};
use crate::exposure::{ChannelClass, ContactCapabilities, ContactRegistry, channel_classes};
use crate::scheduler::{DiscoveryScheduler, QueryOutcome};
use crate::transport::DiscoTransport;

/// What happened to a presence update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceReceipt {
    /// Handle of the sending contact.
    pub handle: ContactHandle,
    /// Job waiting on discovery, or `None` if the update completed at once.
    pub job: Option<JobId>,
    /// Signatures for which discovery was scheduled.
    pub scheduled: Vec<CapabilitySignature>,
}

impl PresenceReceipt {
    /// Whether the update completed without discovery.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.job.is_none()
    }
}

enum Command {
    Presence(PresenceUpdate, oneshot::Sender<RuntimeResult<PresenceReceipt>>),
    EnsureContact(BareJid, oneshot::Sender<RuntimeResult<ContactHandle>>),
    ContactCapabilities(Vec<ContactHandle>, oneshot::Sender<Vec<ContactCapabilities>>),
    RawCapabilities(ContactHandle, oneshot::Sender<Option<Capabilities>>),
    PickResource(ContactHandle, Capabilities, oneshot::Sender<Option<FullJid>>),
    PendingQueries(oneshot::Sender<usize>),
    Shutdown,
}

/// Handle to the capability service actor.
#[derive(Clone)]
pub struct CapabilityService {
    commands: mpsc::Sender<Command>,
    notifier: ChangeNotifier,
    cache: Arc<BundleTrustCache>,
}

impl std::fmt::Debug for CapabilityService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityService")
            .field("cache_entries", &self.cache.len())
            .field("subscribers", &self.notifier.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl CapabilityService {
    /// Start the service on the current Tokio runtime.
    #[must_use]
    pub fn spawn(config: &CapsConfig, transport: Arc<dyn DiscoTransport>) -> Self {
        let cache = Arc::new(BundleTrustCache::from_config(&config.trust));
        let notifier = ChangeNotifier::with_capacity(config.events.channel_capacity.max(1));
        let (scheduler, outcomes) =
            DiscoveryScheduler::new(transport, Arc::clone(&cache), config.query_timeout());
        let (commands, command_rx) = mpsc::channel(config.service.command_buffer.max(1));

        let actor = ServiceActor {
            aggregator: CapabilityAggregator::new(),
            scheduler,
            registry: ContactRegistry::new(),
            notifier: notifier.clone(),
            cache: Arc::clone(&cache),
            commands: command_rx,
            outcomes,
        };
        tokio::spawn(actor.run());

        info!(
            confirmations_required = config.trust.confirmations_required,
            query_timeout_secs = config.discovery.query_timeout_secs,
            "Capability service started"
        );

        Self {
            commands,
            notifier,
            cache,
        }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> RuntimeResult<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| RuntimeError::ServiceClosed)?;
        rx.await.map_err(|_| RuntimeError::ServiceClosed)
    }

    /// Apply a presence update.
    ///
    /// Returns once discovery for the update has been scheduled, not when
    /// it completes.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::HandlesExhausted`] if the sender is new and
    /// no handle is left, or [`RuntimeError::ServiceClosed`] if the service
    /// has stopped.
    pub async fn handle_presence(&self, update: PresenceUpdate) -> RuntimeResult<PresenceReceipt> {
        self.request(|tx| Command::Presence(update, tx)).await?
    }

    /// Receive every capability change.
    #[must_use]
    pub fn subscribe(&self) -> ChangeReceiver {
        self.notifier.subscribe()
    }

    /// Register a synchronous sink.
    pub fn register_sink(&self, sink: Arc<dyn CapabilitySink>) -> SinkId {
        self.notifier.registry().register(sink)
    }

    /// Remove a synchronous sink.
    pub fn unregister_sink(&self, id: SinkId) -> bool {
        self.notifier.registry().unregister(id)
    }

    /// The stable handle for a contact.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::HandlesExhausted`] if the contact is new and
    /// no handle is left, or [`RuntimeError::ServiceClosed`] if the service
    /// has stopped.
    pub async fn ensure_contact(&self, contact: BareJid) -> RuntimeResult<ContactHandle> {
        self.request(|tx| Command::EnsureContact(contact, tx)).await?
    }

    /// Channel classes for several contacts. Unknown handles are omitted.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ServiceClosed`] if the service has stopped.
    pub async fn contact_capabilities(
        &self,
        handles: &[ContactHandle],
    ) -> RuntimeResult<Vec<ContactCapabilities>> {
        self.request(|tx| Command::ContactCapabilities(handles.to_vec(), tx))
            .await
    }

    /// Channel classes for one contact. Empty for an unknown handle.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ServiceClosed`] if the service has stopped.
    pub async fn capabilities_of(&self, handle: ContactHandle) -> RuntimeResult<Vec<ChannelClass>> {
        let raw = self.request(|tx| Command::RawCapabilities(handle, tx)).await?;
        Ok(raw.map(channel_classes).unwrap_or_default())
    }

    /// The published capability bits of a contact.
    ///
    /// # Errors
    ///
    /// Returns [`CapsError::UnknownContact`] for an unknown handle, or
    /// [`RuntimeError::ServiceClosed`] if the service has stopped.
    pub async fn raw_capabilities(&self, handle: ContactHandle) -> RuntimeResult<Capabilities> {
        self.request(|tx| Command::RawCapabilities(handle, tx))
            .await?
            .ok_or(RuntimeError::Caps(CapsError::UnknownContact { handle: handle.0 }))
    }

    /// The best online resource of a contact for the required bits.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ServiceClosed`] if the service has stopped.
    pub async fn pick_resource_by_caps(
        &self,
        handle: ContactHandle,
        required: Capabilities,
    ) -> RuntimeResult<Option<FullJid>> {
        self.request(|tx| Command::PickResource(handle, required, tx))
            .await
    }

    /// Number of discovery queries in flight.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ServiceClosed`] if the service has stopped.
    pub async fn pending_queries(&self) -> RuntimeResult<usize> {
        self.request(Command::PendingQueries).await
    }

    /// The process-wide trust cache.
    #[must_use]
    pub fn cache(&self) -> Arc<BundleTrustCache> {
        Arc::clone(&self.cache)
    }

    /// Stop the actor and abort in-flight queries.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ServiceClosed`] if the service had already stopped.
    pub async fn shutdown(&self) -> RuntimeResult<()> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| RuntimeError::ServiceClosed)
    }
}

struct ServiceActor {
    aggregator: CapabilityAggregator,
    scheduler: DiscoveryScheduler,
    registry: ContactRegistry,
    notifier: ChangeNotifier,
    cache: Arc<BundleTrustCache>,
    commands: mpsc::Receiver<Command>,
    outcomes: mpsc::UnboundedReceiver<QueryOutcome>,
}

impl ServiceActor {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(outcome) = self.outcomes.recv() => self.handle_outcome(outcome),
            }
        }
        self.scheduler.cancel_all();
        info!("Capability service stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Presence(update, reply) => {
                let receipt = self.handle_presence(&update);
                let _ = reply.send(receipt);
            },
            Command::EnsureContact(contact, reply) => {
                let _ = reply.send(self.registry.ensure(&contact));
            },
            Command::ContactCapabilities(handles, reply) => {
                let result = handles
                    .into_iter()
                    .filter_map(|handle| {
                        let bits = self.raw(handle)?;
                        Some(ContactCapabilities {
                            handle,
                            classes: channel_classes(bits),
                        })
                    })
                    .collect();
                let _ = reply.send(result);
            },
            Command::RawCapabilities(handle, reply) => {
                let _ = reply.send(self.raw(handle));
            },
            Command::PickResource(handle, required, reply) => {
                let resource = self
                    .registry
                    .contact(handle)
                    .and_then(|contact| self.aggregator.pick_resource_by_caps(contact, required));
                let _ = reply.send(resource);
            },
            Command::PendingQueries(reply) => {
                let _ = reply.send(self.scheduler.pending_count());
            },
            Command::Shutdown => {},
        }
    }

    fn handle_presence(&mut self, update: &PresenceUpdate) -> RuntimeResult<PresenceReceipt> {
        let handle = self.registry.ensure(&update.from.bare)?;
        let outcome = self.aggregator.begin_update(update, &self.cache);

        if let Some(job) = outcome.job {
            for signature in &outcome.queries {
                self.scheduler
                    .schedule(signature.clone(), update.from.clone(), job);
            }
        }
        if let Some(change) = outcome.change {
            self.publish(change);
        }

        Ok(PresenceReceipt {
            handle,
            job: outcome.job,
            scheduled: outcome.queries,
        })
    }

    fn handle_outcome(&mut self, outcome: QueryOutcome) {
        let Some(resolution) = self.scheduler.handle_outcome(outcome) else {
            return;
        };
        if let Some(change) = self.aggregator.on_signature_resolved(
            resolution.job,
            &resolution.signature,
            &resolution.features,
        ) {
            self.publish(change);
        }
    }

    fn publish(&mut self, change: ContactChange) {
        // Every published contact sent presence, which allocated its handle.
        let Some(handle) = self.registry.handle(&change.contact) else {
            warn!(contact = %change.contact, "Dropping change for a contact without a handle");
            return;
        };
        debug!(handle = %handle, contact = %change.contact, "Publishing capability change");
        self.notifier
            .publish(handle, change.contact, change.old, change.new);
    }

    fn raw(&self, handle: ContactHandle) -> Option<Capabilities> {
        self.registry
            .contact(handle)
            .map(|contact| self.aggregator.published(contact))
    }
}
