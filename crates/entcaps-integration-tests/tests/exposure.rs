//! Integration tests for the contact capability query surface.

mod common;

use common::CapsHarness;
use entcaps_core::{CapsError, ContactHandle};
use entcaps_runtime::{ChannelClass, ContactCapabilities, MediaFlags, RuntimeError};
use entcaps_test::prelude::*;

#[tokio::test]
async fn test_unknown_handle_yields_nothing() {
    let h = CapsHarness::new();
    let unknown = ContactHandle(31337);

    assert!(h.service.capabilities_of(unknown).await.unwrap().is_empty());
    assert!(h.service.contact_capabilities(&[unknown]).await.unwrap().is_empty());
    assert!(matches!(
        h.service.raw_capabilities(unknown).await,
        Err(RuntimeError::Caps(CapsError::UnknownContact { handle: 31337 }))
    ));
}

#[tokio::test]
async fn test_batch_query_omits_unknown_handles() {
    let mut h = CapsHarness::new();
    h.transport
        .with_auto_reply(format!("{FAKE_CLIENT_NODE}#0.1"), jingle_audio_reply());

    let audio = h.present(1, unhashed_advertisement("0.1")).await.handle;
    h.next_change().await;
    let quiet = h.handle(2).await;

    let result = h
        .service
        .contact_capabilities(&[audio, ContactHandle(31337), quiet])
        .await
        .unwrap();
    assert_eq!(
        result,
        vec![
            ContactCapabilities {
                handle: audio,
                classes: vec![
                    ChannelClass::Text,
                    ChannelClass::StreamedMedia(MediaFlags::AUDIO | MediaFlags::IMMUTABLE_STREAMS),
                ],
            },
            ContactCapabilities {
                handle: quiet,
                classes: vec![ChannelClass::Text],
            },
        ]
    );
}

#[tokio::test]
async fn test_contact_subscription_and_sinks_see_the_same_change() {
    let mut h = CapsHarness::new();
    h.transport
        .with_auto_reply(format!("{FAKE_CLIENT_NODE}#0.1"), tubes_reply());

    let receipt = h.present(1, unhashed_advertisement("0.1")).await;
    let change = h.next_change().await;

    let recorded = h.sink.changes();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].metadata.event_id, change.metadata.event_id);
    assert_eq!(recorded[0].handle, receipt.handle);
    assert_eq!(recorded[0].contact, contact_bare(1));
}

#[tokio::test]
async fn test_shutdown_stops_the_service() {
    let h = CapsHarness::new();
    h.present(1, unhashed_advertisement("0.1")).await;
    h.service.shutdown().await.unwrap();

    let mut closed = false;
    for _ in 0..100 {
        if matches!(h.service.pending_queries().await, Err(RuntimeError::ServiceClosed)) {
            closed = true;
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(closed);
}
