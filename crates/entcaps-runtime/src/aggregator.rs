//! Capability aggregator.
//!
//! One [`AggregationJob`] per presence update. A job holds the signatures
//! still unresolved for that update and publishes nothing until the last one
//! lands, so a base bundle and its extensions always surface as a single
//! change. A newer presence from the same resource abandons the running job.
//!
//! Each resource contributes the bits of its last completed job. A contact's
//! effective set is the baseline plus every online resource's bits.

use entcaps_core::{
    Availability, BASELINE, BareJid, Capabilities, CapabilitySignature, FeatureMap, FeatureSet,
    FullJid, PresenceUpdate,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tracing::{debug, trace};

use crate::cache::BundleTrustCache;

/// Identifier of one aggregation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job{}", self.0)
    }
}

/// A contact's published set changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactChange {
    /// The contact.
    pub contact: BareJid,
    /// Previously published set.
    pub old: Capabilities,
    /// New set.
    pub new: Capabilities,
}

/// What [`CapabilityAggregator::begin_update`] decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeginOutcome {
    /// The job still waiting on queries, if any.
    pub job: Option<JobId>,
    /// Signatures the caller must query on behalf of `job`.
    pub queries: Vec<CapabilitySignature>,
    /// Change to publish now, when the update completed immediately.
    pub change: Option<ContactChange>,
}

#[derive(Debug)]
struct AggregationJob {
    resource: FullJid,
    unresolved: HashSet<CapabilitySignature>,
    bits: Capabilities,
}

#[derive(Debug, Clone, Copy)]
struct ResourceCaps {
    bits: Capabilities,
    priority: i8,
}

/// Joins the signatures of each presence update into one capability set.
#[derive(Debug, Default)]
pub struct CapabilityAggregator {
    jobs: HashMap<JobId, AggregationJob>,
    active: HashMap<FullJid, JobId>,
    resources: HashMap<BareJid, BTreeMap<String, ResourceCaps>>,
    published: HashMap<BareJid, Capabilities>,
    next_job: u64,
}

impl CapabilityAggregator {
    /// Create an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start aggregating a presence update.
    ///
    /// Trusted signatures resolve from the cache immediately; the rest are
    /// returned in [`BeginOutcome::queries`]. An update with no signatures
    /// (including going offline) completes at once.
    pub fn begin_update(&mut self, update: &PresenceUpdate, cache: &BundleTrustCache) -> BeginOutcome {
        let resource = &update.from;
        let contact = resource.bare.clone();

        if let Some(old) = self.active.remove(resource) {
            self.jobs.remove(&old);
            debug!(resource = %resource, job = %old, "Aggregation job superseded");
        }

        if update.availability == Availability::Unavailable {
            if let Some(resources) = self.resources.get_mut(&contact) {
                resources.remove(&resource.resource);
            }
            return BeginOutcome {
                job: None,
                queries: Vec::new(),
                change: self.republish(&contact),
            };
        }

        self.resources
            .entry(contact.clone())
            .or_default()
            .entry(resource.resource.clone())
            .and_modify(|caps| caps.priority = update.priority)
            .or_insert(ResourceCaps {
                bits: Capabilities::empty(),
                priority: update.priority,
            });

        let mut bits = Capabilities::empty();
        let mut unresolved = HashSet::new();
        let mut queries = Vec::new();
        for signature in update.capability_ref() {
            let lookup = cache.lookup_or_create(&signature);
            if lookup.needs_query {
                unresolved.insert(signature.clone());
                queries.push(signature);
            } else {
                trace!(resource = %resource, signature = %signature, "Signature trusted from cache");
                bits |= FeatureMap::lookup_all(lookup.features.unwrap_or_default());
            }
        }

        if unresolved.is_empty() {
            return BeginOutcome {
                job: None,
                queries,
                change: self.complete(resource, bits),
            };
        }

        let id = JobId(self.next_job);
        self.next_job = self.next_job.wrapping_add(1);
        debug!(
            resource = %resource,
            job = %id,
            outstanding = unresolved.len(),
            "Aggregation job waiting on discovery"
        );
        self.jobs.insert(
            id,
            AggregationJob {
                resource: resource.clone(),
                unresolved,
                bits,
            },
        );
        self.active.insert(resource.clone(), id);

        BeginOutcome {
            job: Some(id),
            queries,
            change: None,
        }
    }

    /// Mark one signature of `job` resolved.
    ///
    /// Returns a change only when this was the job's last outstanding
    /// signature and the contact's set differs from what was published.
    /// Resolutions for abandoned jobs are discarded.
    pub fn on_signature_resolved(
        &mut self,
        job: JobId,
        signature: &CapabilitySignature,
        features: &FeatureSet,
    ) -> Option<ContactChange> {
        let Some(entry) = self.jobs.get_mut(&job) else {
            debug!(job = %job, signature = %signature, "Resolution for abandoned job discarded");
            return None;
        };
        if !entry.unresolved.remove(signature) {
            return None;
        }
        entry.bits |= FeatureMap::lookup_all(features);
        if !entry.unresolved.is_empty() {
            trace!(job = %job, outstanding = entry.unresolved.len(), "Aggregation job still waiting");
            return None;
        }

        let done = self.jobs.remove(&job)?;
        self.active.remove(&done.resource);
        self.complete(&done.resource, done.bits)
    }

    fn complete(&mut self, resource: &FullJid, bits: Capabilities) -> Option<ContactChange> {
        if let Some(caps) = self
            .resources
            .get_mut(&resource.bare)
            .and_then(|resources| resources.get_mut(&resource.resource))
        {
            caps.bits = bits;
        }
        self.republish(&resource.bare)
    }

    fn republish(&mut self, contact: &BareJid) -> Option<ContactChange> {
        let new = self.effective(contact);
        let old = self.published(contact);
        self.published.insert(contact.clone(), new);
        if new == old {
            return None;
        }
        debug!(contact = %contact, old = ?old, new = ?new, "Contact capabilities changed");
        Some(ContactChange {
            contact: contact.clone(),
            old,
            new,
        })
    }

    fn effective(&self, contact: &BareJid) -> Capabilities {
        self.resources
            .get(contact)
            .into_iter()
            .flat_map(BTreeMap::values)
            .fold(BASELINE, |acc, caps| acc | caps.bits)
    }

    /// The last published set for a contact. Baseline if nothing was published.
    #[must_use]
    pub fn published(&self, contact: &BareJid) -> Capabilities {
        self.published.get(contact).copied().unwrap_or(BASELINE)
    }

    /// Bits contributed by one resource, if it is online.
    #[must_use]
    pub fn resource_capabilities(&self, resource: &FullJid) -> Option<Capabilities> {
        self.resources
            .get(&resource.bare)?
            .get(&resource.resource)
            .map(|caps| caps.bits)
    }

    /// The highest-priority online resource with non-negative priority whose
    /// bits intersect `required`.
    #[must_use]
    pub fn pick_resource_by_caps(&self, contact: &BareJid, required: Capabilities) -> Option<FullJid> {
        self.resources
            .get(contact)?
            .iter()
            .filter(|(_, caps)| caps.priority >= 0 && caps.bits.intersects(required))
            .max_by_key(|(_, caps)| caps.priority)
            .map(|(name, _)| contact.with_resource(name.clone()))
    }

    /// Whether a job is waiting on discovery for this resource.
    #[must_use]
    pub fn is_pending(&self, resource: &FullJid) -> bool {
        self.active.contains_key(resource)
    }

    /// Number of jobs waiting on discovery.
    #[must_use]
    pub fn pending_jobs(&self) -> usize {
        self.jobs.len()
    }
}
