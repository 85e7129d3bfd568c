pub mod commands;
pub mod notifications;

pub use commands::commands_handler;
pub use notifications::notifications_handler;
