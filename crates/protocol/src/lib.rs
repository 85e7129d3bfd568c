//! Wire format spoken between the server and its workers.
//!
//! Outgoing traffic is a [`Command`]; everything coming back (and every
//! notification fanned out to observers) is a [`Status`].

pub mod command;
pub mod error;
pub mod reply;
pub mod status;

pub use command::{Command, CommandKind};
pub use error::ProtocolError;
pub use reply::Reply;
pub use status::{Outcome, Status};
