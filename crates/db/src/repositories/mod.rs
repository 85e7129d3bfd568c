//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods
//! that accept `&PgPool` as the first argument.

pub mod program_repo;
pub mod relocation_repo;
pub mod script_repo;
pub mod worker_repo;

pub use program_repo::ProgramRepo;
pub use relocation_repo::RelocationRepo;
pub use script_repo::ScriptRepo;
pub use worker_repo::WorkerRepo;
