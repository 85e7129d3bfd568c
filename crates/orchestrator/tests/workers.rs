//! Manual worker power control.

mod common;

use assert_matches::assert_matches;
use common::{harness, message};
use fsim_core::error::CoreError;
use fsim_protocol::CommandKind;

#[tokio::test]
async fn wake_sends_a_packet_and_announces_it() {
    let mut h = harness();
    let a = h.add_worker("node-a", 1).await;

    h.engine.wake_worker(a.id).await.unwrap();

    assert_eq!(h.waker.woken().await, vec![a.id]);
    let seen = h.wait_for(|s| message(s).is_some()).await;
    assert_eq!(
        message(&seen),
        Some("Send wake-on-LAN packet to client `node-a`")
    );
}

#[tokio::test]
async fn wake_unknown_worker_is_not_found() {
    let h = harness();
    assert_matches!(
        h.engine.wake_worker(77).await,
        Err(CoreError::NotFound { entity: "worker", id: 77 })
    );
    assert!(h.waker.woken().await.is_empty());
}

#[tokio::test]
async fn shutdown_goes_to_an_online_worker() {
    let mut h = harness();
    let a = h.add_worker("node-a", 1).await;
    h.connect(&a).await;

    let cmd = h.engine.shutdown_worker(a.id).await.unwrap();
    assert_matches!(cmd.kind, CommandKind::Shutdown);

    let sent = h.sink.wait_for_method(a.id, "shutdown").await;
    assert_eq!(sent.id, cmd.id);
    let seen = h.wait_for(|s| message(s).is_some()).await;
    assert_eq!(message(&seen), Some("Send shutdown command to client `node-a`"));
}

#[tokio::test]
async fn shutdown_of_offline_worker_sends_nothing() {
    let h = harness();
    let a = h.add_worker("node-a", 1).await;

    let err = h.engine.shutdown_worker(a.id).await.unwrap_err();
    assert_matches!(err, CoreError::WorkerOffline { action: "shut down", .. });
    assert_eq!(
        err.to_string(),
        "Could not shut down client `node-a` because the client `node-a` is offline."
    );
    assert!(h.sink.sent_to(a.id).await.is_empty());
}
