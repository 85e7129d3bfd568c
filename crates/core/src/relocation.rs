//! Filesystem relocation records and destination conflict detection.
//!
//! A relocation moves a file or directory on a worker from `source_path`
//! to `destination_path`, reversibly. Two relocations conflict when they
//! would put something at the same logical destination file; the planner
//! resolves that by restoring the older one first.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::types::DbId;

/// Suffix the worker appends to whatever it displaces at the destination.
pub const BACKUP_ENDING: &str = "_BACK";

/// Whether a path denotes a file or a directory.
///
/// On the destination side `File` means "replace with" and `Dir` means
/// "insert into".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathKind {
    File,
    Dir,
}

impl PathKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Dir => "dir",
        }
    }
}

impl fmt::Display for PathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PathKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "dir" => Ok(Self::Dir),
            other => Err(CoreError::Validation(format!("Unknown path kind: {other}"))),
        }
    }
}

/// A persisted relocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocationRecord {
    pub id: DbId,
    pub name: String,
    pub worker_id: DbId,
    pub source_path: String,
    pub source_kind: PathKind,
    pub destination_path: String,
    pub destination_kind: PathKind,
    /// Id of the last move/restore command sent for this record.
    pub command_id: Option<Uuid>,
    /// Set by a successful move, cleared by a successful restore.
    pub content_hash: Option<String>,
    pub last_error: Option<String>,
}

/// DTO for creating a relocation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRelocation {
    pub name: String,
    pub worker_id: DbId,
    pub source_path: String,
    pub source_kind: PathKind,
    pub destination_path: String,
    pub destination_kind: PathKind,
}

/// Display state of a relocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationState {
    Error,
    Moved,
    Restored,
}

impl RelocationRecord {
    pub fn is_moved(&self) -> bool {
        self.content_hash.as_deref().is_some_and(|h| !h.is_empty())
    }

    pub fn is_error(&self) -> bool {
        self.last_error.as_deref().is_some_and(|e| !e.is_empty())
    }

    pub fn state(&self) -> RelocationState {
        if self.is_error() {
            RelocationState::Error
        } else if self.is_moved() {
            RelocationState::Moved
        } else {
            RelocationState::Restored
        }
    }

    /// The file path this relocation occupies once moved.
    pub fn logical_destination(&self) -> LogicalPath {
        let dest = LogicalPath::parse(&self.destination_path);
        match self.destination_kind {
            PathKind::File => dest,
            PathKind::Dir => match LogicalPath::parse(&self.source_path).file_name() {
                Some(name) => dest.join(name),
                None => dest,
            },
        }
    }
}

/// A path reduced to its components.
///
/// Both `/` and `\` separate components; empty and `.` components are
/// dropped, so `C:\data\` and `C:/data` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicalPath {
    components: Vec<String>,
}

impl LogicalPath {
    pub fn parse(path: &str) -> Self {
        let components = path
            .split(['/', '\\'])
            .filter(|c| !c.is_empty() && *c != ".")
            .map(str::to_string)
            .collect();
        Self { components }
    }

    pub fn file_name(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    pub fn join(mut self, name: &str) -> Self {
        self.components.push(name.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.components.join("/"))
    }
}

/// Find the moved relocation that already occupies `target`'s logical
/// destination.
///
/// Only moved records on the same worker, other than `target` itself, are
/// considered. More than one match means the stored state is inconsistent
/// and is reported as [`CoreError::ConflictResolution`].
pub fn find_conflict<'a>(
    target: &RelocationRecord,
    candidates: &'a [RelocationRecord],
) -> Result<Option<&'a RelocationRecord>, CoreError> {
    let wanted = target.logical_destination();
    if wanted.is_empty() {
        return Err(CoreError::ConflictResolution(format!(
            "Filesystem `{}` has an empty destination",
            target.name
        )));
    }

    let mut matches = candidates.iter().filter(|c| {
        c.id != target.id
            && c.worker_id == target.worker_id
            && c.is_moved()
            && c.logical_destination() == wanted
    });

    let first = matches.next();
    if let Some(second) = matches.next() {
        return Err(CoreError::ConflictResolution(format!(
            "Destination `{wanted}` is occupied by more than one filesystem (`{}`, `{}`)",
            first.map(|c| c.name.as_str()).unwrap_or_default(),
            second.name
        )));
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn record(
        id: DbId,
        source: &str,
        dest: &str,
        dest_kind: PathKind,
        hash: Option<&str>,
    ) -> RelocationRecord {
        RelocationRecord {
            id,
            name: format!("fs-{id}"),
            worker_id: 1,
            source_path: source.to_string(),
            source_kind: PathKind::File,
            destination_path: dest.to_string(),
            destination_kind: dest_kind,
            command_id: None,
            content_hash: hash.map(str::to_string),
            last_error: None,
        }
    }

    #[test]
    fn logical_destination_of_file_kind_is_destination() {
        let r = record(1, "/src/a.cfg", "/etc/app/b.cfg", PathKind::File, None);
        assert_eq!(r.logical_destination(), LogicalPath::parse("/etc/app/b.cfg"));
    }

    #[test]
    fn logical_destination_of_dir_kind_appends_source_name() {
        let r = record(1, "/src/a.cfg", "/etc/app/", PathKind::Dir, None);
        assert_eq!(r.logical_destination().to_string(), "etc/app/a.cfg");
    }

    #[test]
    fn separators_are_normalized() {
        assert_eq!(
            LogicalPath::parse("C:\\data\\.\\x.txt"),
            LogicalPath::parse("C:/data//x.txt")
        );
    }

    #[test]
    fn dir_conflict_on_same_base_name() {
        let r = record(1, "/new/name", "/dest", PathKind::Dir, None);
        let c = record(2, "/old/name", "/dest", PathKind::Dir, Some("abc"));
        let others = vec![c.clone()];
        assert_eq!(find_conflict(&r, &others).unwrap(), Some(&c));
    }

    #[test]
    fn file_kind_conflicts_with_dir_kind_at_same_logical_path() {
        let r = record(1, "/new/other", "/dest/name", PathKind::File, None);
        let c = record(2, "C:\\old\\name", "/dest", PathKind::Dir, Some("abc"));
        let others = vec![c.clone()];
        assert_eq!(find_conflict(&r, &others).unwrap(), Some(&c));
    }

    #[test]
    fn unmoved_records_do_not_conflict() {
        let r = record(1, "/new/name", "/dest", PathKind::Dir, None);
        let c = record(2, "/old/name", "/dest", PathKind::Dir, Some(""));
        assert_eq!(find_conflict(&r, &[c]).unwrap(), None);
    }

    #[test]
    fn record_never_conflicts_with_itself() {
        let r = record(1, "/new/name", "/dest", PathKind::Dir, Some("abc"));
        assert_eq!(find_conflict(&r, &[r.clone()]).unwrap(), None);
    }

    #[test]
    fn other_worker_does_not_conflict() {
        let r = record(1, "/new/name", "/dest", PathKind::Dir, None);
        let mut c = record(2, "/old/name", "/dest", PathKind::Dir, Some("abc"));
        c.worker_id = 2;
        assert_eq!(find_conflict(&r, &[c]).unwrap(), None);
    }

    #[test]
    fn two_occupants_is_a_resolution_error() {
        let r = record(1, "/new/name", "/dest", PathKind::Dir, None);
        let c1 = record(2, "/old/name", "/dest", PathKind::Dir, Some("abc"));
        let c2 = record(3, "/x", "/dest/name", PathKind::File, Some("def"));
        assert_matches!(
            find_conflict(&r, &[c1, c2]),
            Err(CoreError::ConflictResolution(_))
        );
    }

    #[test]
    fn state_prefers_error() {
        let mut r = record(1, "/a", "/b", PathKind::File, Some("abc"));
        assert_eq!(r.state(), RelocationState::Moved);
        r.last_error = Some("disk full".to_string());
        assert_eq!(r.state(), RelocationState::Error);
    }

    #[test]
    fn path_kind_round_trips_through_str() {
        assert_eq!("dir".parse::<PathKind>().unwrap(), PathKind::Dir);
        assert_eq!(PathKind::File.as_str(), "file");
        assert!("folder".parse::<PathKind>().is_err());
    }
}
