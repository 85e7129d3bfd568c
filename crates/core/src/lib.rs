pub mod error;
pub mod program;
pub mod relocation;
pub mod script;
pub mod script_document;
pub mod store;
pub mod types;
pub mod worker;
