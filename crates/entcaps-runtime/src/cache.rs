//! Bundle trust cache.
//!
//! Keyed by [`CapabilitySignature`]. Every mutation goes through the
//! `DashMap` entry for its signature, so replies for one signature apply one
//! at a time while unrelated signatures never contend.
//!
//! Trust is earned differently depending on the signature:
//!
//! - A signature with a verifiable digest is trusted after one reply that
//!   hashes to the advertised digest. A reply that does not is honored for
//!   the contact that sent it and otherwise ignored.
//! - Any other signature is trusted after `confirmations_required` replies
//!   from distinct resources. When two replies disagree the later one wins.
//!
//! Entries are never removed.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use entcaps_config::TrustSection;
use entcaps_core::{
    CapabilitySignature, CapsError, DiscoInfo, FeatureSet, FullJid, HashVerifier, SoftwareInfo,
    Verification,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::scheduler::QueryId;

/// Whether a bundle's feature set may be used without discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustState {
    /// Not yet trusted. New holders must be queried.
    Pending,
    /// Trusted. New holders skip discovery.
    Confirmed,
}

#[derive(Debug)]
struct BundleCacheEntry {
    trust: TrustState,
    confirmations: u32,
    confirmers: HashSet<FullJid>,
    features: Option<FeatureSet>,
    software: Option<SoftwareInfo>,
    created_at: DateTime<Utc>,
    waiting: Vec<QueryId>,
}

impl BundleCacheEntry {
    fn new() -> Self {
        Self {
            trust: TrustState::Pending,
            confirmations: 0,
            confirmers: HashSet::new(),
            features: None,
            software: None,
            created_at: Utc::now(),
            waiting: Vec::new(),
        }
    }
}

/// Result of [`BundleTrustCache::lookup_or_create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleLookup {
    /// The caller must query this signature.
    pub needs_query: bool,
    /// Trust state at lookup time.
    pub trust: TrustState,
    /// Cached feature set. Always present when `needs_query` is false.
    pub features: Option<FeatureSet>,
}

/// Owned view of one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleSnapshot {
    /// The entry's signature.
    pub signature: CapabilitySignature,
    /// Trust state.
    pub trust: TrustState,
    /// Counted confirmations.
    pub confirmations: u32,
    /// Resolved feature set, empty if no query has succeeded yet.
    pub features: FeatureSet,
    /// Software information from the latest reply that carried it.
    pub software: Option<SoftwareInfo>,
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
    /// Queries currently waiting on this signature.
    pub waiting: Vec<QueryId>,
}

/// Process-wide store of capability bundle trust state.
#[derive(Debug)]
pub struct BundleTrustCache {
    entries: DashMap<CapabilitySignature, BundleCacheEntry>,
    confirmations_required: u32,
}

impl BundleTrustCache {
    /// Create a cache requiring `confirmations_required` distinct replies
    /// before an unhashed signature is trusted. Zero is treated as one.
    #[must_use]
    pub fn new(confirmations_required: u32) -> Self {
        Self {
            entries: DashMap::new(),
            confirmations_required: confirmations_required.max(1),
        }
    }

    /// Create a cache from the `[trust]` config section.
    #[must_use]
    pub fn from_config(trust: &TrustSection) -> Self {
        Self::new(trust.confirmations_required)
    }

    /// Confirmations needed before `signature` is trusted.
    #[must_use]
    pub fn threshold(&self, signature: &CapabilitySignature) -> u32 {
        if signature.is_hashed() {
            1
        } else {
            self.confirmations_required
        }
    }

    /// Look up a signature, creating a pending entry if it is unseen.
    pub fn lookup_or_create(&self, signature: &CapabilitySignature) -> BundleLookup {
        let entry = self.entries.entry(signature.clone()).or_insert_with(|| {
            debug!(signature = %signature, "New capability bundle");
            BundleCacheEntry::new()
        });

        match entry.trust {
            TrustState::Confirmed => BundleLookup {
                needs_query: false,
                trust: TrustState::Confirmed,
                features: Some(entry.features.clone().unwrap_or_default()),
            },
            TrustState::Pending => BundleLookup {
                needs_query: true,
                trust: TrustState::Pending,
                features: entry.features.clone(),
            },
        }
    }

    /// Record a query waiting on `signature`.
    pub fn attach_query(&self, signature: &CapabilitySignature, id: QueryId) {
        if let Some(mut entry) = self.entries.get_mut(signature) {
            entry.waiting.push(id);
        }
    }

    /// Forget a query once it has a reply or has timed out.
    pub fn detach_query(&self, signature: &CapabilitySignature, id: QueryId) {
        if let Some(mut entry) = self.entries.get_mut(signature) {
            entry.waiting.retain(|waiting| *waiting != id);
        }
    }

    /// Apply a successful reply from `from` and return the feature set the
    /// querying contact should use.
    pub fn record_success(
        &self,
        signature: &CapabilitySignature,
        from: &FullJid,
        reply: &DiscoInfo,
    ) -> FeatureSet {
        let features = reply.feature_set();
        let verification = signature
            .verified_digest()
            .map(|digest| (digest, HashVerifier::verify(digest, reply)));

        if let Some((digest, Verification::Mismatch { computed })) = &verification {
            let error = CapsError::DigestMismatch {
                node: signature.node.clone(),
                advertised: digest.value.clone(),
                computed: computed.clone().unwrap_or_default(),
            };
            warn!(
                signature = %signature,
                from = %from,
                error = %error,
                "Reply used for this contact only"
            );
            return features;
        }

        let mut entry = self
            .entries
            .entry(signature.clone())
            .or_insert_with(BundleCacheEntry::new);

        if let Some(software) = reply.software_info() {
            entry.software = Some(software);
        }

        if matches!(verification, Some((_, Verification::Match))) {
            if entry.trust == TrustState::Pending {
                info!(signature = %signature, from = %from, "Bundle trusted by verified digest");
            }
            entry.features = Some(features.clone());
            entry.trust = TrustState::Confirmed;
            entry.confirmations = 1;
            entry.confirmers.insert(from.clone());
            return features;
        }

        if let Some(previous) = &entry.features {
            if *previous != features {
                warn!(
                    signature = %signature,
                    from = %from,
                    "Reply disagrees with earlier confirmation, keeping the later one"
                );
            }
        }
        entry.features = Some(features.clone());

        if entry.confirmers.insert(from.clone()) {
            entry.confirmations = entry.confirmations.saturating_add(1);
            debug!(
                signature = %signature,
                from = %from,
                confirmations = entry.confirmations,
                "Bundle confirmed"
            );
        }

        let threshold = self.threshold(signature);
        if entry.trust == TrustState::Pending && entry.confirmations >= threshold {
            entry.trust = TrustState::Confirmed;
            info!(
                signature = %signature,
                confirmations = entry.confirmations,
                "Bundle trusted after independent confirmations"
            );
        }

        features
    }

    /// Apply a failed query. Trust state is untouched; the querying contact
    /// gets no features from this signature.
    pub fn record_failure(&self, signature: &CapabilitySignature) -> FeatureSet {
        debug!(signature = %signature, "Bundle query failed");
        FeatureSet::new()
    }

    /// Owned view of a signature's entry.
    #[must_use]
    pub fn snapshot(&self, signature: &CapabilitySignature) -> Option<BundleSnapshot> {
        self.entries.get(signature).map(|entry| BundleSnapshot {
            signature: signature.clone(),
            trust: entry.trust,
            confirmations: entry.confirmations,
            features: entry.features.clone().unwrap_or_default(),
            software: entry.software.clone(),
            created_at: entry.created_at,
            waiting: entry.waiting.clone(),
        })
    }

    /// Number of known signatures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no signature is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for BundleTrustCache {
    fn default() -> Self {
        Self::from_config(&TrustSection::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entcaps_core::disco::SOFTWARE_INFO_FORM_TYPE;
    use entcaps_core::{DataForm, HashAlgorithm, ns};

    const NODE: &str = "http://telepathy.freedesktop.org/fake-client";

    fn resource(n: usize) -> FullJid {
        FullJid::parse(&format!("contact{n}@example.com/Resource")).unwrap()
    }

    fn audio_reply() -> DiscoInfo {
        DiscoInfo::new().with_features([ns::JINGLE_015, ns::JINGLE_015_AUDIO, ns::GOOGLE_P2P])
    }

    fn hashed_reply() -> DiscoInfo {
        audio_reply().with_form(
            DataForm::new(SOFTWARE_INFO_FORM_TYPE)
                .with_field("software", "A Fake Client with Twisted")
                .with_field("software_version", "5.11.2-svn-20080512")
                .with_field("os", "Debian GNU/Linux unstable (sid) unstable sid")
                .with_field("os_version", "2.6.24-1-amd64"),
        )
    }

    fn hashed_signature() -> CapabilitySignature {
        CapabilitySignature::hashed(NODE, "CzO+nkbflbxu1pgzOQSIi8gOyDc=", HashAlgorithm::Sha1)
    }

    #[test]
    fn test_unseen_signature_needs_query() {
        let cache = BundleTrustCache::default();
        let sig = CapabilitySignature::version(NODE, "0.1");

        let lookup = cache.lookup_or_create(&sig);
        assert!(lookup.needs_query);
        assert_eq!(lookup.trust, TrustState::Pending);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_unhashed_needs_distinct_confirmations() {
        let cache = BundleTrustCache::new(5);
        let sig = CapabilitySignature::version(NODE, "0.1");

        for n in 1..=4 {
            assert!(cache.lookup_or_create(&sig).needs_query);
            cache.record_success(&sig, &resource(n), &audio_reply());
        }
        // A repeat confirmer does not count.
        cache.record_success(&sig, &resource(4), &audio_reply());
        assert_eq!(cache.snapshot(&sig).unwrap().confirmations, 4);
        assert!(cache.lookup_or_create(&sig).needs_query);

        cache.record_success(&sig, &resource(5), &audio_reply());
        let lookup = cache.lookup_or_create(&sig);
        assert!(!lookup.needs_query);
        assert_eq!(lookup.features, Some(audio_reply().feature_set()));
    }

    #[test]
    fn test_verified_digest_trusted_once() {
        let cache = BundleTrustCache::default();
        let sig = hashed_signature();

        assert!(cache.lookup_or_create(&sig).needs_query);
        cache.record_success(&sig, &resource(1), &hashed_reply());

        let snapshot = cache.snapshot(&sig).unwrap();
        assert_eq!(snapshot.trust, TrustState::Confirmed);
        assert_eq!(snapshot.confirmations, 1);
        assert_eq!(
            snapshot.software.unwrap().software.as_deref(),
            Some("A Fake Client with Twisted")
        );
        assert!(!cache.lookup_or_create(&sig).needs_query);
    }

    #[test]
    fn test_digest_mismatch_never_promotes() {
        let cache = BundleTrustCache::default();
        let sig = hashed_signature();
        cache.lookup_or_create(&sig);

        for n in 1..=10 {
            let features = cache.record_success(&sig, &resource(n), &audio_reply());
            assert!(features.contains(ns::JINGLE_015_AUDIO));
        }

        let snapshot = cache.snapshot(&sig).unwrap();
        assert_eq!(snapshot.trust, TrustState::Pending);
        assert_eq!(snapshot.confirmations, 0);
        assert!(snapshot.features.is_empty());
    }

    #[test]
    fn test_unsupported_algorithm_uses_unhashed_threshold() {
        let cache = BundleTrustCache::new(2);
        let sig = CapabilitySignature::hashed(NODE, "abc", HashAlgorithm::parse("md5"));
        assert_eq!(cache.threshold(&sig), 2);

        cache.record_success(&sig, &resource(1), &audio_reply());
        assert!(cache.lookup_or_create(&sig).needs_query);
        cache.record_success(&sig, &resource(2), &audio_reply());
        assert!(!cache.lookup_or_create(&sig).needs_query);
    }

    #[test]
    fn test_disagreeing_reply_wins() {
        let cache = BundleTrustCache::default();
        let sig = CapabilitySignature::version(NODE, "0.1");

        cache.record_success(&sig, &resource(1), &audio_reply());
        let video = DiscoInfo::new().with_features([ns::JINGLE_015, ns::JINGLE_015_VIDEO]);
        cache.record_success(&sig, &resource(2), &video);

        let snapshot = cache.snapshot(&sig).unwrap();
        assert_eq!(snapshot.features, video.feature_set());
        assert_eq!(snapshot.confirmations, 2);
    }

    #[test]
    fn test_failure_leaves_state() {
        let cache = BundleTrustCache::default();
        let sig = CapabilitySignature::version(NODE, "0.1");
        cache.record_success(&sig, &resource(1), &audio_reply());

        assert!(cache.record_failure(&sig).is_empty());
        let snapshot = cache.snapshot(&sig).unwrap();
        assert_eq!(snapshot.confirmations, 1);
        assert_eq!(snapshot.trust, TrustState::Pending);
    }

    #[test]
    fn test_waiting_queries() {
        let cache = BundleTrustCache::default();
        let sig = CapabilitySignature::version(NODE, "0.1");
        cache.lookup_or_create(&sig);

        cache.attach_query(&sig, QueryId(1));
        cache.attach_query(&sig, QueryId(2));
        cache.detach_query(&sig, QueryId(1));
        assert_eq!(cache.snapshot(&sig).unwrap().waiting, vec![QueryId(2)]);
    }

    #[test]
    fn test_different_digest_is_distinct_entry() {
        let cache = BundleTrustCache::default();
        let good = hashed_signature();
        let other = CapabilitySignature::hashed(NODE, "JpaYgiKL0y4fUOCTwN3WLGpaftM=", HashAlgorithm::Sha1);

        cache.record_success(&good, &resource(1), &hashed_reply());
        assert!(!cache.lookup_or_create(&good).needs_query);
        assert!(cache.lookup_or_create(&other).needs_query);
        assert_eq!(cache.len(), 2);
    }
}
