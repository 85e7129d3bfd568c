//! Script export and import.

mod common;

use assert_matches::assert_matches;
use common::harness;
use fsim_core::error::CoreError;
use fsim_core::relocation::PathKind;
use fsim_core::script::EntryTarget;
use fsim_core::script_document::{EntityRef, RefStyle, ScriptDocument};
use fsim_core::store::ScriptStore;
use serde_json::json;

#[tokio::test]
async fn export_by_name_reimports_as_the_same_script() {
    let h = harness();
    let a = h.add_worker("node-a", 1).await;
    let b = h.add_worker("node-b", 2).await;
    let render = h.add_program(&a, "render", -1).await;
    let encode = h.add_program(&b, "encode", 30).await;
    let cfg = h
        .add_relocation(&b, "cfg", "/srv/app.ini", "/etc/app.ini", PathKind::File)
        .await;
    let script = h
        .add_script(
            "nightly",
            &[
                (0, EntryTarget::Program(render.id)),
                (2, EntryTarget::Program(encode.id)),
                (2, EntryTarget::Filesystem(cfg.id)),
            ],
        )
        .await;

    let doc = h
        .engine
        .export_script(script.id, RefStyle::Name, RefStyle::Name)
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(&doc).unwrap(),
        json!({
            "name": "nightly",
            "programs": [
                {"index": 0, "program": "render", "slave": "node-a"},
                {"index": 2, "program": "encode", "slave": "node-b"},
            ],
            "filesystems": [
                {"index": 2, "filesystem": "cfg", "slave": "node-b"},
            ],
        })
    );

    let copy = ScriptDocument {
        name: "nightly-copy".to_string(),
        ..doc.clone()
    };
    let imported = h.engine.import_script(&copy).await.unwrap();
    assert_eq!(
        h.store.script_entries(imported.id).await.unwrap().len(),
        3
    );

    let again = h
        .engine
        .export_script(imported.id, RefStyle::Name, RefStyle::Name)
        .await
        .unwrap();
    assert_eq!(again.programs, doc.programs);
    assert_eq!(again.filesystems, doc.filesystems);
}

#[tokio::test]
async fn export_by_id_uses_store_ids() {
    let h = harness();
    let a = h.add_worker("node-a", 1).await;
    let render = h.add_program(&a, "render", -1).await;
    let script = h
        .add_script("ids", &[(1, EntryTarget::Program(render.id))])
        .await;

    let doc = h
        .engine
        .export_script(script.id, RefStyle::Id, RefStyle::Name)
        .await
        .unwrap();
    assert_eq!(doc.programs[0].worker, EntityRef::Id(a.id));
    assert_eq!(doc.programs[0].program, EntityRef::Name("render".to_string()));
}

#[tokio::test]
async fn import_accepts_mixed_references() {
    let h = harness();
    let a = h.add_worker("node-a", 1).await;
    let render = h.add_program(&a, "render", -1).await;

    let doc: ScriptDocument = serde_json::from_value(json!({
        "name": "mixed",
        "programs": [
            {"index": 0, "program": render.id, "slave": "node-a"},
            {"index": 1, "program": "render", "slave": a.id},
        ],
        "filesystems": [],
    }))
    .unwrap();

    let script = h.engine.import_script(&doc).await.unwrap();
    let entries = h.store.script_entries(script.id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.target == EntryTarget::Program(render.id)));
}

#[tokio::test]
async fn import_with_unknown_reference_creates_nothing() {
    let h = harness();
    let a = h.add_worker("node-a", 1).await;
    h.add_program(&a, "render", -1).await;

    let doc: ScriptDocument = serde_json::from_value(json!({
        "name": "broken",
        "programs": [
            {"index": 0, "program": "render", "slave": "node-a"},
            {"index": 1, "program": "missing", "slave": "node-a"},
        ],
    }))
    .unwrap();

    let err = h.engine.import_script(&doc).await.unwrap_err();
    assert_eq!(
        err,
        CoreError::Validation(
            "Program `missing` does not exist on client `node-a`.".to_string()
        )
    );

    let unknown_worker: ScriptDocument = serde_json::from_value(json!({
        "name": "broken",
        "filesystems": [{"index": 0, "filesystem": "cfg", "slave": "node-z"}],
    }))
    .unwrap();
    assert_eq!(
        h.engine.import_script(&unknown_worker).await.unwrap_err().to_string(),
        "Validation failed: Client `node-z` does not exist."
    );

    // The name is still free.
    h.store.create_script("broken").await.unwrap();
}

#[tokio::test]
async fn export_unknown_script_is_not_found() {
    let h = harness();
    assert_matches!(
        h.engine.export_script(5, RefStyle::Id, RefStyle::Id).await,
        Err(CoreError::NotFound { entity: "script", id: 5 })
    );
}
