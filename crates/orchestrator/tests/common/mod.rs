//! Shared harness for orchestrator integration tests.
//!
//! Runs the engine against `MemoryStore`, and a command sink and waker that
//! record everything they are handed.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fsim_core::error::CoreError;
use fsim_core::program::{CreateProgram, Program};
use fsim_core::relocation::{CreateRelocation, PathKind, RelocationRecord};
use fsim_core::script::{EntryTarget, Script};
use fsim_core::store::{ProgramStore, RelocationStore, ScriptStore, WorkerStore};
use fsim_core::types::{DbId, StepIndex};
use fsim_core::worker::{CreateWorker, Worker};
use fsim_db::MemoryStore;
use fsim_events::NotificationBus;
use fsim_orchestrator::{CommandSink, Engine, OrchestratorConfig, WorkerWaker};
use fsim_protocol::{Command, Status};
use serde_json::{json, Value};
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

/// How long a test waits for something asynchronous before failing.
pub const WAIT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Recording sink
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(DbId, Command)>>,
}

#[async_trait]
impl CommandSink for RecordingSink {
    async fn send(&self, worker_id: DbId, command: &Command) -> Result<(), CoreError> {
        self.sent.lock().await.push((worker_id, command.clone()));
        Ok(())
    }
}

impl RecordingSink {
    pub async fn sent_to(&self, worker_id: DbId) -> Vec<Command> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|(id, _)| *id == worker_id)
            .map(|(_, c)| c.clone())
            .collect()
    }

    /// Wait until `worker_id` has received a command with `method`, and
    /// return the latest one.
    pub async fn wait_for_method(&self, worker_id: DbId, method: &str) -> Command {
        tokio::time::timeout(WAIT, async {
            loop {
                if let Some(cmd) = self
                    .sent_to(worker_id)
                    .await
                    .into_iter()
                    .rev()
                    .find(|c| c.method() == method)
                {
                    return cmd;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("worker {worker_id} never received `{method}`"))
    }
}

// ---------------------------------------------------------------------------
// Recording waker
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingWaker {
    woken: Mutex<Vec<DbId>>,
}

#[async_trait]
impl WorkerWaker for RecordingWaker {
    async fn wake(&self, worker: &Worker) -> Result<(), CoreError> {
        self.woken.lock().await.push(worker.id);
        Ok(())
    }
}

impl RecordingWaker {
    pub async fn woken(&self) -> Vec<DbId> {
        self.woken.lock().await.clone()
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub engine: Engine,
    pub store: Arc<MemoryStore>,
    pub sink: Arc<RecordingSink>,
    pub waker: Arc<RecordingWaker>,
    pub events: broadcast::Receiver<Status>,
}

pub fn harness() -> Harness {
    harness_with(OrchestratorConfig::default())
}

pub fn harness_with(config: OrchestratorConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingSink::default());
    let waker = Arc::new(RecordingWaker::default());
    let bus = Arc::new(NotificationBus::default());
    let events = bus.subscribe();
    let engine = Engine::new(store.clone(), sink.clone(), bus, waker.clone(), config);
    Harness {
        engine,
        store,
        sink,
        waker,
        events,
    }
}

impl Harness {
    pub async fn add_worker(&self, name: &str, last_octet: u8) -> Worker {
        self.store
            .create_worker(&CreateWorker {
                name: name.to_string(),
                ip_address: format!("10.0.0.{last_octet}"),
                mac_address: format!("aa:bb:cc:dd:ee:{last_octet:02x}"),
            })
            .await
            .unwrap()
    }

    /// Run the `online` handshake for `worker` to completion.
    pub async fn connect(&self, worker: &Worker) {
        let id = self.engine.worker_connected(worker).await.unwrap();
        self.reply_ok("online", id, json!("")).await;
    }

    pub async fn add_program(&self, worker: &Worker, name: &str, timeout_secs: i32) -> Program {
        self.store
            .create_program(&CreateProgram {
                name: name.to_string(),
                worker_id: worker.id,
                path: format!("/opt/{name}"),
                arguments: vec!["--fast".to_string()],
                timeout_secs,
            })
            .await
            .unwrap()
    }

    pub async fn add_relocation(
        &self,
        worker: &Worker,
        name: &str,
        source: &str,
        destination: &str,
        destination_kind: PathKind,
    ) -> RelocationRecord {
        self.store
            .create_relocation(&CreateRelocation {
                name: name.to_string(),
                worker_id: worker.id,
                source_path: source.to_string(),
                source_kind: PathKind::File,
                destination_path: destination.to_string(),
                destination_kind,
            })
            .await
            .unwrap()
    }

    pub async fn add_script(&self, name: &str, entries: &[(StepIndex, EntryTarget)]) -> Script {
        let script = self.store.create_script(name).await.unwrap();
        for (index, target) in entries {
            self.store.add_entry(script.id, *index, *target).await.unwrap();
        }
        script
    }

    pub async fn reply_ok(&self, method: &str, id: Uuid, result: Value) {
        let status = Status::ok(json!({"method": method, "result": result})).with_uuid(id);
        self.engine.process_status(status).await;
    }

    pub async fn reply_err(&self, method: &str, id: Uuid, result: Value) {
        let status = Status::err(json!({"method": method, "result": result})).with_uuid(id);
        self.engine.process_status(status).await;
    }

    /// Next notification matching `pred`, skipping everything else.
    pub async fn wait_for(&mut self, pred: impl Fn(&Status) -> bool) -> Status {
        tokio::time::timeout(WAIT, async {
            loop {
                let status = self.events.recv().await.expect("bus closed");
                if pred(&status) {
                    return status;
                }
            }
        })
        .await
        .expect("expected notification never arrived")
    }

    /// Every notification up to and including the first one matching `pred`.
    pub async fn collect_until(&mut self, pred: impl Fn(&Status) -> bool) -> Vec<Status> {
        tokio::time::timeout(WAIT, async {
            let mut seen = Vec::new();
            loop {
                let status = self.events.recv().await.expect("bus closed");
                let done = pred(&status);
                seen.push(status);
                if done {
                    return seen;
                }
            }
        })
        .await
        .expect("expected notification never arrived")
    }

    pub async fn wait_until_idle(&self) {
        tokio::time::timeout(WAIT, async {
            while self.engine.is_running().await {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("script run never finished");
    }
}

// ---------------------------------------------------------------------------
// Notification predicates
// ---------------------------------------------------------------------------

pub fn script_status(status: &Status, kind: &str) -> bool {
    status.payload["script_status"] == kind
}

pub fn program_status(status: &Status, kind: &str) -> bool {
    status.payload["program_status"] == kind
}

pub fn filesystem_status(status: &Status, kind: &str) -> bool {
    status.payload["filesystem_status"] == kind
}

pub fn message(status: &Status) -> Option<&str> {
    status.payload["message"].as_str()
}

pub fn error_message(status: &Status) -> bool {
    !status.is_ok()
}
