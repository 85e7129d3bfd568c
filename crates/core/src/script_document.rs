//! Portable form of a script.
//!
//! A [`ScriptDocument`] names its programs, filesystems and their workers
//! either by id or by name, so a script can be exported from one
//! installation and imported into another where the ids differ.
//!
//! ```json
//! {
//!   "name": "nightly",
//!   "programs": [{"index": 0, "program": "render", "slave": "node-a"}],
//!   "filesystems": [{"index": 1, "filesystem": 7, "slave": 2}]
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, StepIndex};

/// Reference to an entity by id or by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityRef {
    Id(DbId),
    Name(String),
}

impl EntityRef {
    pub fn matches(&self, id: DbId, name: &str) -> bool {
        match self {
            Self::Id(wanted) => *wanted == id,
            Self::Name(wanted) => wanted == name,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// How an export refers to entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefStyle {
    #[serde(alias = "int")]
    Id,
    #[serde(alias = "str")]
    Name,
}

impl RefStyle {
    pub fn pick(self, id: DbId, name: &str) -> EntityRef {
        match self {
            Self::Id => EntityRef::Id(id),
            Self::Name => EntityRef::Name(name.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramRef {
    pub index: StepIndex,
    pub program: EntityRef,
    #[serde(rename = "slave")]
    pub worker: EntityRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesystemRef {
    pub index: StepIndex,
    pub filesystem: EntityRef,
    #[serde(rename = "slave")]
    pub worker: EntityRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptDocument {
    pub name: String,
    #[serde(default)]
    pub programs: Vec<ProgramRef>,
    #[serde(default)]
    pub filesystems: Vec<FilesystemRef>,
}

impl ScriptDocument {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::Validation("Script name must not be empty".to_string()));
        }
        if self.programs.is_empty() && self.filesystems.is_empty() {
            return Err(CoreError::Validation(
                "Add a filesystem or a program to the script.".to_string(),
            ));
        }
        let indexes = self
            .programs
            .iter()
            .map(|p| p.index)
            .chain(self.filesystems.iter().map(|f| f.index));
        for index in indexes {
            if index < 0 {
                return Err(CoreError::Validation(format!(
                    "Script entry index must not be negative, got {index}"
                )));
            }
        }
        Ok(())
    }
}
