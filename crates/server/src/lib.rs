//! fsim server library.
//!
//! Exposes config, state and the router so integration tests and the
//! binary entrypoint build the same application.

pub mod config;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
