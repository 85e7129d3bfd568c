//! Script orchestration engine.
//!
//! - [`Orchestrator`] drives one script run at a time through its steps.
//! - [`programs`], [`relocation`] and [`connections`] issue commands to
//!   workers and keep the tracked records current.
//! - [`replies`] applies worker replies and wakes the orchestrator.
//! - [`power`] wakes and shuts down single workers, [`documents`] exports
//!   and imports scripts.
//! - [`Engine`] wires the pieces together behind one caller-facing API.

pub mod config;
pub mod connections;
pub mod context;
pub mod documents;
pub mod engine;
pub mod hub;
pub mod power;
pub mod programs;
pub mod relocation;
pub mod replies;
pub mod scheduler;
pub mod wake;
pub mod wol;

pub use config::OrchestratorConfig;
pub use context::EngineContext;
pub use engine::Engine;
pub use hub::{ChannelHub, CommandSink};
pub use scheduler::{Orchestrator, RunPhase};
pub use wake::{Wake, WakeHandle};
pub use wol::{NoopWaker, WakeOnLan, WorkerWaker};
