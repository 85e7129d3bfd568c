//! The `{status, payload, uuid?}` envelope.

use fsim_core::error::CoreError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Ok,
    Err,
}

/// A worker reply or an observer notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    #[serde(rename = "status")]
    pub outcome: Outcome,
    pub payload: Value,
    /// Correlation id of the command this answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
}

impl Status {
    pub fn ok(payload: Value) -> Self {
        Self {
            outcome: Outcome::Ok,
            payload,
            uuid: None,
        }
    }

    pub fn err(payload: Value) -> Self {
        Self {
            outcome: Outcome::Err,
            payload,
            uuid: None,
        }
    }

    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.outcome == Outcome::Ok
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl From<&CoreError> for Status {
    fn from(err: &CoreError) -> Self {
        Status::err(Value::String(err.to_string()))
    }
}
