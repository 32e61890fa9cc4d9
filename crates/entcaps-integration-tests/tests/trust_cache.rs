//! Integration tests for bundle trust.
//!
//! Unhashed bundles are trusted after independent confirmations from
//! distinct contacts; hashed bundles after one reply whose digest verifies.

mod common;

use common::CapsHarness;
use entcaps_config::CapsConfig;
use entcaps_core::{CapabilitySignature, Capabilities, CapsError, HashAlgorithm};
use entcaps_runtime::TrustState;
use entcaps_test::prelude::*;

fn version_signature(ver: &str) -> CapabilitySignature {
    CapabilitySignature::version(FAKE_CLIENT_NODE, ver)
}

#[tokio::test]
async fn test_unhashed_bundle_trusted_after_five_contacts() {
    let mut h = CapsHarness::new();
    h.transport
        .with_auto_reply(format!("{FAKE_CLIENT_NODE}#0.1"), jingle_audio_reply());

    for n in 1..=5 {
        let receipt = h.present(n, unhashed_advertisement("0.1")).await;
        assert_eq!(receipt.scheduled, vec![version_signature("0.1")]);

        let change = h.next_change().await;
        assert_eq!(change.handle, receipt.handle);
        assert!(change.new.contains(Capabilities::JINGLE | Capabilities::JINGLE_AUDIO));
    }
    assert_eq!(h.transport.request_count(), 5);

    // The sixth holder is served from the cache.
    let receipt = h.present(6, unhashed_advertisement("0.1")).await;
    assert!(receipt.is_complete());
    assert!(receipt.scheduled.is_empty());
    let change = h.next_change().await;
    assert_eq!(change.handle, receipt.handle);
    assert!(change.new.contains(Capabilities::JINGLE_AUDIO));
    assert_eq!(h.transport.request_count(), 5);

    let snapshot = h.service.cache().snapshot(&version_signature("0.1")).unwrap();
    assert_eq!(snapshot.trust, TrustState::Confirmed);
    assert_eq!(snapshot.confirmations, 5);
    assert!(snapshot.waiting.is_empty());
}

#[tokio::test]
async fn test_repeated_replies_from_one_contact_count_once() {
    let mut h = CapsHarness::new();
    h.transport
        .with_auto_reply(format!("{FAKE_CLIENT_NODE}#0.1"), jingle_audio_reply());

    h.present(1, unhashed_advertisement("0.1")).await;
    h.next_change().await;

    for _ in 0..5 {
        let receipt = h.present(1, unhashed_advertisement("0.1")).await;
        assert_eq!(receipt.scheduled.len(), 1);
        h.settle(0).await;
    }
    h.assert_no_change();

    let snapshot = h.service.cache().snapshot(&version_signature("0.1")).unwrap();
    assert_eq!(snapshot.trust, TrustState::Pending);
    assert_eq!(snapshot.confirmations, 1);

    // Another contact is still queried.
    let receipt = h.present(2, unhashed_advertisement("0.1")).await;
    assert!(!receipt.is_complete());
}

#[tokio::test]
async fn test_configured_threshold() {
    let config = CapsConfig::from_toml_str("[trust]\nconfirmations_required = 2\n").unwrap();
    let mut h = CapsHarness::with_config(&config);
    h.transport
        .with_auto_reply(format!("{FAKE_CLIENT_NODE}#0.1"), tubes_reply());

    for n in 1..=2 {
        h.present(n, unhashed_advertisement("0.1")).await;
        h.next_change().await;
    }

    let receipt = h.present(3, unhashed_advertisement("0.1")).await;
    assert!(receipt.is_complete());
    assert_eq!(h.transport.request_count(), 2);
}

#[tokio::test]
async fn test_hashed_bundle_trusted_after_one_reply() {
    let mut h = CapsHarness::new();
    h.transport
        .with_auto_reply(format!("{FAKE_CLIENT_NODE}#{FAKE_CLIENT_SHA1}"), hashed_client_reply());

    let receipt = h.present(1, hashed_advertisement()).await;
    assert_eq!(receipt.scheduled.len(), 1);
    assert!(receipt.scheduled[0].is_hashed());
    h.next_change().await;

    let receipt = h.present(2, hashed_advertisement()).await;
    assert!(receipt.is_complete());
    let change = h.next_change().await;
    assert!(change.new.contains(Capabilities::JINGLE_AUDIO | Capabilities::GOOGLE_P2P));
    assert_eq!(h.transport.request_count(), 1);

    let signature = CapabilitySignature::hashed(FAKE_CLIENT_NODE, FAKE_CLIENT_SHA1, HashAlgorithm::Sha1);
    let snapshot = h.service.cache().snapshot(&signature).unwrap();
    assert_eq!(snapshot.trust, TrustState::Confirmed);
    assert_eq!(
        snapshot.software.and_then(|info| info.software).as_deref(),
        Some("A Fake Client with Twisted")
    );
}

#[tokio::test]
async fn test_digest_mismatch_is_never_trusted() {
    let mut h = CapsHarness::new();
    // Without the software form the reply hashes to a different digest.
    h.transport
        .with_auto_reply(format!("{FAKE_CLIENT_NODE}#{FAKE_CLIENT_SHA1}"), jingle_audio_reply());

    for n in 1..=6 {
        let receipt = h.present(n, hashed_advertisement()).await;
        assert!(!receipt.is_complete());

        // Each contact still gets the features it replied with.
        let change = h.next_change().await;
        assert!(change.new.contains(Capabilities::JINGLE_AUDIO));
    }
    assert_eq!(h.transport.request_count(), 6);

    let signature = CapabilitySignature::hashed(FAKE_CLIENT_NODE, FAKE_CLIENT_SHA1, HashAlgorithm::Sha1);
    let snapshot = h.service.cache().snapshot(&signature).unwrap();
    assert_eq!(snapshot.trust, TrustState::Pending);
    assert_eq!(snapshot.confirmations, 0);
    assert!(snapshot.features.is_empty());
}

#[tokio::test]
async fn test_failed_query_leaves_bundle_pending() {
    let mut h = CapsHarness::new();

    let receipt = h.present(1, unhashed_advertisement("0.1")).await;
    assert!(!receipt.is_complete());
    h.inbox.expect_query().await.fail(CapsError::RemoteError {
        target: contact(1).to_string(),
        condition: "service-unavailable".into(),
    });
    h.settle(0).await;
    h.assert_no_change();
    assert!(h.sink.is_empty());

    assert_eq!(
        h.service.capabilities_of(receipt.handle).await.unwrap(),
        vec![entcaps_runtime::ChannelClass::Text]
    );

    // The next holder is queried again.
    let receipt = h.present(2, unhashed_advertisement("0.1")).await;
    assert!(!receipt.is_complete());
    let query = h.inbox.expect_query().await;
    assert_eq!(query.target, contact(2));
    assert_eq!(query.node, format!("{FAKE_CLIENT_NODE}#0.1"));
}

#[tokio::test]
async fn test_snapshot_serializes() {
    let mut h = CapsHarness::new();
    h.transport
        .with_auto_reply(format!("{FAKE_CLIENT_NODE}#0.1"), jingle_audio_reply());
    h.present(1, unhashed_advertisement("0.1")).await;
    h.next_change().await;

    let snapshot = h.service.cache().snapshot(&version_signature("0.1")).unwrap();
    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["trust"], "pending");
    assert_eq!(json["confirmations"], 1);
}

#[tokio::test]
async fn test_concurrent_holders_are_queried_independently() {
    let mut h = CapsHarness::new();

    let receipts = futures::future::join_all(
        (1..=5).map(|n| h.present(n, unhashed_advertisement("0.1"))),
    )
    .await;
    assert!(receipts.iter().all(|receipt| !receipt.is_complete()));

    let mut queries = Vec::new();
    for _ in 0..5 {
        queries.push(h.inbox.expect_query().await);
    }
    let mut targets: Vec<_> = queries.iter().map(|query| query.target.clone()).collect();
    targets.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
    targets.dedup();
    assert_eq!(targets.len(), 5);

    for query in queries {
        query.reply(jingle_audio_reply());
    }
    for _ in 0..5 {
        h.next_change().await;
    }

    let receipt = h.present(6, unhashed_advertisement("0.1")).await;
    assert!(receipt.is_complete());
}
