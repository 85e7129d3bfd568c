//! Database row structs.
//!
//! Each submodule contains a `FromRow` struct matching the table and its
//! conversion into the domain type from `fsim-core`.

pub mod program;
pub mod relocation;
pub mod script;
pub mod worker;
