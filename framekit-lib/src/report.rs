//! The `{err, payload}` body of a frame report.

use crate::errors::FlowError;
use crate::CompletionResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub payload: Option<Value>,
}

impl FrameReport {
    pub fn success(payload: Value) -> Self {
        Self {
            err: None,
            payload: Some(payload),
        }
    }

    pub fn failure(err: Value) -> Self {
        Self {
            err: Some(err),
            payload: None,
        }
    }

    /// Read a report off the bus. Malformed bodies read as empty reports.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// An error wins over a payload; a report with neither is a dismissal.
    pub fn into_result(self) -> CompletionResult {
        match (
            self.err.filter(|e| !e.is_null()),
            self.payload.filter(|p| !p.is_null()),
        ) {
            (Some(err), _) => Err(FlowError::from_reported(err)),
            (None, Some(payload)) => Ok(payload),
            (None, None) => Err(FlowError::closed()),
        }
    }
}
