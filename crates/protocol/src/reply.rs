//! Decoding worker replies.
//!
//! A reply is a [`Status`] whose payload is `{method, result}`. The
//! correlation id is the top-level `uuid`; older workers put it in the
//! payload or inside the result instead.

use serde_json::Value;
use uuid::Uuid;

use crate::error::ProtocolError;
use crate::status::{Outcome, Status};

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub outcome: Outcome,
    pub method: String,
    pub result: Value,
    pub correlation_id: Option<Uuid>,
}

impl Reply {
    pub fn from_status(status: &Status) -> Result<Self, ProtocolError> {
        let method = status
            .payload
            .get("method")
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::MalformedPayload("missing `method`".to_string()))?
            .to_string();
        let result = status.payload.get("result").cloned().unwrap_or(Value::Null);

        let correlation_id = status
            .uuid
            .or_else(|| uuid_at(&status.payload))
            .or_else(|| uuid_at(&result));

        Ok(Self {
            outcome: status.outcome,
            method,
            result,
            correlation_id,
        })
    }

    pub fn is_ok(&self) -> bool {
        self.outcome == Outcome::Ok
    }

    /// The result rendered as text: strings verbatim, anything else as JSON.
    pub fn result_text(&self) -> String {
        match &self.result {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Sub-replies of a successful `chain_execution`, in execution order.
    pub fn chain_statuses(&self) -> Result<Vec<Status>, ProtocolError> {
        Ok(serde_json::from_value(self.result.clone())?)
    }

    /// `uuid` carried inside the result. A `get_log` result names the
    /// execution the log belongs to this way.
    pub fn result_uuid(&self) -> Option<Uuid> {
        uuid_at(&self.result)
    }

    /// Field of an object result, e.g. `log` of a `get_log` reply.
    pub fn result_field(&self, key: &str) -> Option<&Value> {
        self.result.get(key)
    }
}

fn uuid_at(value: &Value) -> Option<Uuid> {
    value
        .get("uuid")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}
