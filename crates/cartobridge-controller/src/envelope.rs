//! Wire envelopes for the host command channel.
//!
//! Requests: `{"map": 1, "id": 7, "method": "camera#move", "arguments": {...}}`.
//! Replies carry the request id and exactly one of `result`,
//! `notImplemented: true` or `error: {code, message}`.

use cartobridge_core::error::CODE_BAD_REQUEST;
use cartobridge_core::Response;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Host-level method creating a map instance.
pub const HOST_CREATE_MAP: &str = "host#createMap";
/// Host-level method disposing a map instance.
pub const HOST_DISPOSE_MAP: &str = "host#disposeMap";

/// One inbound command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub map: i64,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl RequestEnvelope {
    pub fn new(map: i64, id: impl Into<Value>, method: impl Into<String>, arguments: Value) -> Self {
        Self {
            map,
            id: id.into(),
            method: method.into(),
            arguments,
        }
    }

    /// Parses one JSON line. On failure the error envelope echoes whatever
    /// request id could be recovered.
    pub fn parse(line: &str) -> Result<Self, Box<ReplyEnvelope>> {
        let value: Value = serde_json::from_str(line)
            .map_err(|e| Box::new(ReplyEnvelope::bad_request(Value::Null, format!("invalid JSON: {}", e))))?;
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        serde_json::from_value(value)
            .map_err(|e| Box::new(ReplyEnvelope::bad_request(id, format!("invalid request: {}", e))))
    }
}

/// Error member of a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// One outbound reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, rename = "notImplemented", skip_serializing_if = "std::ops::Not::not")]
    pub not_implemented: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ReplyError>,
}

impl ReplyEnvelope {
    pub fn new(id: Value, response: Response) -> Self {
        let mut reply = Self {
            id,
            result: None,
            not_implemented: false,
            error: None,
        };
        match response {
            Response::Success { result } => reply.result = Some(result),
            Response::NotImplemented => reply.not_implemented = true,
            Response::Error { code, message, details } => {
                reply.error = Some(ReplyError { code, message, details });
            }
        }
        reply
    }

    pub fn bad_request(id: Value, message: impl Into<String>) -> Self {
        Self::new(
            id,
            Response::Error {
                code: CODE_BAD_REQUEST.to_string(),
                message: message.into(),
                details: None,
            },
        )
    }
}
