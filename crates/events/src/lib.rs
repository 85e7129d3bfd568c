//! Notification fan-out for observers of the engine.
//!
//! - [`NotificationBus`] is an in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`, carrying wire-ready [`Status`] envelopes.
//! - [`Notification`] and its per-topic enums are the typed payloads.
//!
//! [`Status`]: fsim_protocol::Status

pub mod bus;
pub mod notification;

pub use bus::NotificationBus;
pub use notification::{
    FilesystemEvent, Notification, ProgramEvent, ScriptEvent, WorkerEvent,
};
