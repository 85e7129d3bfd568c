//! Commands sent to a worker.
//!
//! On the wire a command is a flat JSON object `{method, uuid, ...params}`.
//! In Rust it is a [`Command`] carrying a typed [`CommandKind`]; the
//! conversion goes through the private `WireCommand` struct.

use fsim_core::program::Program;
use fsim_core::relocation::{PathKind, RelocationRecord, BACKUP_ENDING};
use fsim_core::types::DbId;
use serde::de::DeserializeOwned;
use serde::ser::Error as _;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::ProtocolError;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteParams {
    pub pid: DbId,
    /// Id the worker tags its log output and reply with.
    pub own_uuid: Uuid,
    pub path: String,
    pub arguments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocationParams {
    pub source_path: String,
    pub source_type: PathKind,
    pub destination_path: String,
    pub destination_type: PathKind,
    pub backup_ending: String,
}

impl RelocationParams {
    pub fn for_record(record: &RelocationRecord) -> Self {
        Self {
            source_path: record.source_path.clone(),
            source_type: record.source_kind,
            destination_path: record.destination_path.clone(),
            destination_type: record.destination_kind,
            backup_ending: BACKUP_ENDING.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreParams {
    #[serde(flatten)]
    pub relocation: RelocationParams,
    pub hash_value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogTarget {
    /// Command id of the execution whose log is addressed.
    pub target_uuid: Uuid,
}

#[derive(Deserialize)]
struct ChainParams {
    commands: Vec<Command>,
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// Handshake sent right after a worker connects.
    Online,
    Execute(ExecuteParams),
    /// Stop a running execution. Reuses the execute command's id.
    Stop,
    FilesystemMove(RelocationParams),
    FilesystemRestore(RestoreParams),
    /// Commands the worker runs in order; stops at the first failure.
    ChainExecution(Vec<Command>),
    GetLog(LogTarget),
    EnableLogging(LogTarget),
    DisableLogging(LogTarget),
    /// Power the worker off. Not answered.
    Shutdown,
}

impl CommandKind {
    /// Wire method name. `Stop` shares `"execute"` with `Execute`.
    pub fn method(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Execute(_) | Self::Stop => "execute",
            Self::FilesystemMove(_) => "filesystem_move",
            Self::FilesystemRestore(_) => "filesystem_restore",
            Self::ChainExecution(_) => "chain_execution",
            Self::GetLog(_) => "get_log",
            Self::EnableLogging(_) => "enable_logging",
            Self::DisableLogging(_) => "disable_logging",
            Self::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "WireCommand")]
pub struct Command {
    pub id: Uuid,
    pub kind: CommandKind,
}

impl Command {
    /// Create a command with a fresh id.
    pub fn new(kind: CommandKind) -> Self {
        Self::with_id(Uuid::new_v4(), kind)
    }

    pub fn with_id(id: Uuid, kind: CommandKind) -> Self {
        Self { id, kind }
    }

    pub fn online() -> Self {
        Self::new(CommandKind::Online)
    }

    /// Execute `program`; the command id doubles as `own_uuid`.
    pub fn execute(program: &Program) -> Self {
        let id = Uuid::new_v4();
        Self::with_id(
            id,
            CommandKind::Execute(ExecuteParams {
                pid: program.id,
                own_uuid: id,
                path: program.path.clone(),
                arguments: program.arguments.clone(),
            }),
        )
    }

    pub fn shutdown() -> Self {
        Self::new(CommandKind::Shutdown)
    }

    pub fn stop(execute_id: Uuid) -> Self {
        Self::with_id(execute_id, CommandKind::Stop)
    }

    pub fn filesystem_move(record: &RelocationRecord) -> Self {
        Self::new(CommandKind::FilesystemMove(RelocationParams::for_record(record)))
    }

    pub fn filesystem_restore(record: &RelocationRecord) -> Self {
        Self::new(CommandKind::FilesystemRestore(RestoreParams {
            relocation: RelocationParams::for_record(record),
            hash_value: record.content_hash.clone().unwrap_or_default(),
        }))
    }

    /// Chain `commands`. The chain reuses the id of its final command, so a
    /// failed chain correlates with the record awaiting that command.
    pub fn chain(commands: Vec<Command>) -> Self {
        let id = commands.last().map_or_else(Uuid::new_v4, |c| c.id);
        Self::with_id(id, CommandKind::ChainExecution(commands))
    }

    pub fn method(&self) -> &'static str {
        self.kind.method()
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    fn to_wire(&self) -> Result<WireCommand, serde_json::Error> {
        let params = match &self.kind {
            CommandKind::Online | CommandKind::Stop | CommandKind::Shutdown => Map::new(),
            CommandKind::Execute(p) => to_object(p)?,
            CommandKind::FilesystemMove(p) => to_object(p)?,
            CommandKind::FilesystemRestore(p) => to_object(p)?,
            CommandKind::ChainExecution(commands) => {
                let mut map = Map::new();
                map.insert("commands".to_string(), serde_json::to_value(commands)?);
                map
            }
            CommandKind::GetLog(t) | CommandKind::EnableLogging(t) | CommandKind::DisableLogging(t) => {
                to_object(t)?
            }
        };
        Ok(WireCommand {
            method: self.method().to_string(),
            uuid: self.id,
            params,
        })
    }
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Wire representation
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct WireCommand {
    method: String,
    uuid: Uuid,
    #[serde(flatten)]
    params: Map<String, Value>,
}

impl TryFrom<WireCommand> for Command {
    type Error = ProtocolError;

    fn try_from(wire: WireCommand) -> Result<Self, Self::Error> {
        let WireCommand { method, uuid, params } = wire;
        let kind = match method.as_str() {
            "online" => CommandKind::Online,
            "execute" if params.is_empty() => CommandKind::Stop,
            "execute" => CommandKind::Execute(from_params(params)?),
            "filesystem_move" => CommandKind::FilesystemMove(from_params(params)?),
            "filesystem_restore" => CommandKind::FilesystemRestore(from_params(params)?),
            "chain_execution" => {
                CommandKind::ChainExecution(from_params::<ChainParams>(params)?.commands)
            }
            "get_log" => CommandKind::GetLog(from_params(params)?),
            "enable_logging" => CommandKind::EnableLogging(from_params(params)?),
            "disable_logging" => CommandKind::DisableLogging(from_params(params)?),
            "shutdown" => CommandKind::Shutdown,
            other => return Err(ProtocolError::UnknownMethod(other.to_string())),
        };
        Ok(Command { id: uuid, kind })
    }
}

fn to_object<T: Serialize>(params: &T) -> Result<Map<String, Value>, serde_json::Error> {
    match serde_json::to_value(params)? {
        Value::Object(map) => Ok(map),
        _ => Err(serde_json::Error::custom("command parameters must be an object")),
    }
}

fn from_params<T: DeserializeOwned>(params: Map<String, Value>) -> Result<T, ProtocolError> {
    Ok(serde_json::from_value(Value::Object(params))?)
}
