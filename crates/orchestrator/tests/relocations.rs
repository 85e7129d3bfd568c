//! Relocation planner scenarios: conflicts, restores and deletes.

mod common;

use assert_matches::assert_matches;
use common::{filesystem_status, harness};
use fsim_core::error::CoreError;
use fsim_core::relocation::PathKind;
use fsim_core::store::RelocationStore;
use fsim_orchestrator::relocation::{self, MovePlan};
use fsim_protocol::{CommandKind, Status};
use serde_json::json;

// ---------------------------------------------------------------------------
// Test: a move onto an occupied destination restores the occupant first
// ---------------------------------------------------------------------------

#[tokio::test]
async fn conflicting_move_is_chained_after_restore() {
    let mut h = harness();
    let a = h.add_worker("node-a", 1).await;
    h.connect(&a).await;

    let occupant = h
        .add_relocation(&a, "old-cfg", "/srv/v1/app.ini", "/etc/app.ini", PathKind::File)
        .await;
    let target = h
        .add_relocation(&a, "new-cfg", "/srv/v2/app.ini", "/etc/", PathKind::Dir)
        .await;

    h.engine.move_relocation(occupant.id).await.unwrap();
    let mv = h.sink.wait_for_method(a.id, "filesystem_move").await;
    h.reply_ok("filesystem_move", mv.id, json!("hash-1")).await;

    let plan = h.engine.move_relocation(target.id).await.unwrap();
    let (restore_id, move_id) = assert_matches!(
        plan,
        MovePlan::RestoreThenMove { occupant_id, restore, mv } if occupant_id == occupant.id
            => (restore.id, mv.id)
    );

    let chain = h.sink.wait_for_method(a.id, "chain_execution").await;
    let commands = assert_matches!(chain.kind, CommandKind::ChainExecution(commands) => commands);
    assert_eq!(commands.len(), 2);
    assert_matches!(&commands[0].kind, CommandKind::FilesystemRestore(p) => {
        assert_eq!(p.hash_value, "hash-1");
        assert_eq!(p.relocation.destination_path, "/etc/app.ini");
    });
    assert_matches!(&commands[1].kind, CommandKind::FilesystemMove(p) => {
        assert_eq!(p.source_path, "/srv/v2/app.ini");
        assert_eq!(p.backup_ending, "_BACK");
    });
    assert_eq!(commands[0].id, restore_id);
    assert_eq!(commands[1].id, move_id);

    let stored_occupant = h.store.get_relocation(occupant.id).await.unwrap().unwrap();
    let stored_target = h.store.get_relocation(target.id).await.unwrap().unwrap();
    assert_eq!(stored_occupant.command_id, Some(restore_id));
    assert_eq!(stored_target.command_id, Some(move_id));

    // Both halves of the chain reply are applied in order.
    let chain_reply = Status::ok(json!({
        "method": "chain_execution",
        "result": [
            {"status": "ok", "payload": {"method": "filesystem_restore", "result": ""}, "uuid": restore_id},
            {"status": "ok", "payload": {"method": "filesystem_move", "result": "hash-2"}, "uuid": move_id},
        ],
    }))
    .with_uuid(chain.id);
    h.engine.process_status(chain_reply).await;

    let restored = h.wait_for(|s| filesystem_status(s, "restored")).await;
    assert_eq!(restored.payload["fid"], occupant.id);
    let moved = h.wait_for(|s| filesystem_status(s, "moved")).await;
    assert_eq!(moved.payload["fid"], target.id);

    let stored_occupant = h.store.get_relocation(occupant.id).await.unwrap().unwrap();
    let stored_target = h.store.get_relocation(target.id).await.unwrap().unwrap();
    assert!(!stored_occupant.is_moved());
    assert_eq!(stored_target.content_hash.as_deref(), Some("hash-2"));
}

#[tokio::test]
async fn failed_chain_marks_the_moving_relocation() {
    let mut h = harness();
    let a = h.add_worker("node-a", 1).await;
    h.connect(&a).await;
    let occupant = h
        .add_relocation(&a, "old", "/srv/v1/app.ini", "/etc/app.ini", PathKind::File)
        .await;
    let target = h
        .add_relocation(&a, "new", "/srv/v2/app.ini", "/etc/app.ini", PathKind::File)
        .await;

    h.engine.move_relocation(occupant.id).await.unwrap();
    let mv = h.sink.wait_for_method(a.id, "filesystem_move").await;
    h.reply_ok("filesystem_move", mv.id, json!("hash-1")).await;

    h.engine.move_relocation(target.id).await.unwrap();
    let chain = h.sink.wait_for_method(a.id, "chain_execution").await;
    h.reply_err("chain_execution", chain.id, json!("worker busy")).await;

    let err = h.wait_for(|s| filesystem_status(s, "error")).await;
    assert_eq!(err.payload["fid"], target.id);
    assert_eq!(err.payload["error_code"], "worker busy");

    let stored_occupant = h.store.get_relocation(occupant.id).await.unwrap().unwrap();
    let stored_target = h.store.get_relocation(target.id).await.unwrap().unwrap();
    assert!(stored_occupant.is_moved());
    assert!(!stored_occupant.is_error());
    assert!(!stored_target.is_moved());
    assert_eq!(stored_target.last_error.as_deref(), Some("worker busy"));
}

#[tokio::test]
async fn move_twice_is_already_in_progress() {
    let h = harness();
    let a = h.add_worker("node-a", 1).await;
    h.connect(&a).await;
    let cfg = h
        .add_relocation(&a, "cfg", "/srv/app.ini", "/etc/app.ini", PathKind::File)
        .await;

    h.engine.move_relocation(cfg.id).await.unwrap();
    let mv = h.sink.wait_for_method(a.id, "filesystem_move").await;
    h.reply_ok("filesystem_move", mv.id, json!("abc")).await;

    let err = h.engine.move_relocation(cfg.id).await.unwrap_err();
    assert_matches!(err, CoreError::AlreadyInProgress(_));
    assert_eq!(
        err.to_string(),
        "Could not move filesystem `cfg` on client `node-a` because it is already moved."
    );
}

#[tokio::test]
async fn move_on_offline_worker_sends_nothing() {
    let h = harness();
    let a = h.add_worker("node-a", 1).await;
    let cfg = h
        .add_relocation(&a, "cfg", "/srv/app.ini", "/etc/app.ini", PathKind::File)
        .await;

    let err = h.engine.move_relocation(cfg.id).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Could not move filesystem `cfg` because the client `node-a` is offline."
    );
    assert!(h.sink.sent_to(a.id).await.is_empty());
    let stored = h.store.get_relocation(cfg.id).await.unwrap().unwrap();
    assert_eq!(stored.command_id, None);
}

// ---------------------------------------------------------------------------
// Test: restore and delete guards
// ---------------------------------------------------------------------------

#[tokio::test]
async fn restoring_an_unmoved_relocation_twice_sends_nothing() {
    let h = harness();
    let a = h.add_worker("node-a", 1).await;
    h.connect(&a).await;
    let cfg = h
        .add_relocation(&a, "cfg", "/srv/app.ini", "/etc/app.ini", PathKind::File)
        .await;
    let before = h.sink.sent_to(a.id).await.len();

    assert_matches!(
        h.engine.restore_relocation(cfg.id).await,
        Err(CoreError::NotInProgress(_))
    );
    assert_matches!(
        h.engine.restore_relocation(cfg.id).await,
        Err(CoreError::NotInProgress(_))
    );
    assert_eq!(h.sink.sent_to(a.id).await.len(), before);
}

#[tokio::test]
async fn restore_sends_the_stored_hash() {
    let mut h = harness();
    let a = h.add_worker("node-a", 1).await;
    h.connect(&a).await;
    let cfg = h
        .add_relocation(&a, "cfg", "/srv/app.ini", "/etc/app.ini", PathKind::File)
        .await;
    h.engine.move_relocation(cfg.id).await.unwrap();
    let mv = h.sink.wait_for_method(a.id, "filesystem_move").await;
    h.reply_ok("filesystem_move", mv.id, json!("abc")).await;

    let restore = h.engine.restore_relocation(cfg.id).await.unwrap();
    assert_matches!(&restore.kind, CommandKind::FilesystemRestore(p) => {
        assert_eq!(p.hash_value, "abc");
    });

    h.reply_err("filesystem_restore", restore.id, json!("locked")).await;
    let err = h.wait_for(|s| filesystem_status(s, "error")).await;
    assert_eq!(err.payload["fid"], cfg.id);
    assert_eq!(err.payload["error_code"], "locked");
    let stored = h.store.get_relocation(cfg.id).await.unwrap().unwrap();
    assert!(stored.is_moved());
    assert!(stored.is_error());
}

#[tokio::test]
async fn delete_refuses_moved_relocation() {
    let h = harness();
    let a = h.add_worker("node-a", 1).await;
    h.connect(&a).await;
    let cfg = h
        .add_relocation(&a, "cfg", "/srv/app.ini", "/etc/app.ini", PathKind::File)
        .await;
    h.engine.move_relocation(cfg.id).await.unwrap();
    let mv = h.sink.wait_for_method(a.id, "filesystem_move").await;
    h.reply_ok("filesystem_move", mv.id, json!("abc")).await;

    let err = h.engine.delete_relocation(cfg.id).await.unwrap_err();
    assert!(err
        .to_string()
        .ends_with("Restore the filesystem and try again."));

    let restore = h.engine.restore_relocation(cfg.id).await.unwrap();
    h.reply_ok("filesystem_restore", restore.id, json!("")).await;

    h.engine.delete_relocation(cfg.id).await.unwrap();
    assert!(h.store.get_relocation(cfg.id).await.unwrap().is_none());

    assert_matches!(
        h.engine.delete_relocation(cfg.id).await,
        Err(CoreError::NotFound { entity: "filesystem", .. })
    );
}

#[tokio::test]
async fn delete_rechecks_a_record_moved_after_loading() {
    let h = harness();
    let a = h.add_worker("node-a", 1).await;
    h.connect(&a).await;
    let cfg = h
        .add_relocation(&a, "cfg", "/srv/app.ini", "/etc/app.ini", PathKind::File)
        .await;
    let loaded = h.store.get_relocation(cfg.id).await.unwrap().unwrap();

    h.engine.move_relocation(cfg.id).await.unwrap();
    let mv = h.sink.wait_for_method(a.id, "filesystem_move").await;
    h.reply_ok("filesystem_move", mv.id, json!("abc")).await;

    let err = relocation::delete_relocation(h.engine.context(), &loaded)
        .await
        .unwrap_err();
    assert_eq!(err, CoreError::relocation_still_moved("cfg", "node-a"));
    assert!(h.store.get_relocation(cfg.id).await.unwrap().is_some());
}
