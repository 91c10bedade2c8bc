//! Method calls and their single-use reply slots.
//!
//! A [`MethodCall`] is a `"namespace#action"` name plus a JSON argument value.
//! Its answer travels through a [`MethodResult`], which wraps a one-shot
//! sender: answering consumes it, so a command can never be answered twice,
//! and dropping it unanswered sends a `reply_dropped` error so the host is
//! never left waiting.

use crate::error::{ArgumentError, CODE_PLUGIN_PANIC, CODE_REPLY_DROPPED};
use crate::types::LatLng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::oneshot;

/// A command addressed to one map instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    /// The part before `#`, or the whole name when there is none.
    pub fn namespace(&self) -> &str {
        self.method.split_once('#').map_or(self.method.as_str(), |(ns, _)| ns)
    }

    /// The part after `#`, empty when there is none.
    pub fn action(&self) -> &str {
        self.method.split_once('#').map_or("", |(_, action)| action)
    }

    /// Borrowed view over the argument map.
    pub fn args(&self) -> Args<'_> {
        Args::new(&self.arguments)
    }
}

/// Typed accessors over a JSON argument map.
///
/// Absent arguments, a null argument value and a non-map argument value all
/// behave like an empty map.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    map: Option<&'a Map<String, Value>>,
}

impl<'a> Args<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self {
            map: value.as_object(),
        }
    }

    /// Raw value; JSON null counts as absent.
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.map.and_then(|m| m.get(name)).filter(|v| !v.is_null())
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn value(&self, name: &str) -> Result<&'a Value, ArgumentError> {
        self.get(name).ok_or_else(|| ArgumentError::missing(name))
    }

    pub fn str(&self, name: &str) -> Result<&'a str, ArgumentError> {
        self.value(name)?
            .as_str()
            .ok_or_else(|| ArgumentError::wrong_type(name, "string"))
    }

    pub fn f64(&self, name: &str) -> Result<f64, ArgumentError> {
        self.value(name)?
            .as_f64()
            .ok_or_else(|| ArgumentError::wrong_type(name, "number"))
    }

    pub fn i64(&self, name: &str) -> Result<i64, ArgumentError> {
        let value = self.value(name)?;
        value
            .as_i64()
            .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .ok_or_else(|| ArgumentError::wrong_type(name, "integer"))
    }

    pub fn bool(&self, name: &str) -> Result<bool, ArgumentError> {
        self.value(name)?
            .as_bool()
            .ok_or_else(|| ArgumentError::wrong_type(name, "bool"))
    }

    pub fn list(&self, name: &str) -> Result<&'a Vec<Value>, ArgumentError> {
        self.value(name)?
            .as_array()
            .ok_or_else(|| ArgumentError::wrong_type(name, "list"))
    }

    pub fn object(&self, name: &str) -> Result<&'a Map<String, Value>, ArgumentError> {
        self.value(name)?
            .as_object()
            .ok_or_else(|| ArgumentError::wrong_type(name, "map"))
    }

    pub fn latlng(&self, name: &str) -> Result<LatLng, ArgumentError> {
        LatLng::from_value(self.value(name)?).ok_or_else(|| ArgumentError::wrong_type(name, "[lat, lng]"))
    }

    /// Optional string, ignoring values of the wrong type.
    pub fn opt_str(&self, name: &str) -> Option<&'a str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Optional number, ignoring values of the wrong type.
    pub fn opt_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }
}

/// Final answer to one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Success {
        result: Value,
    },
    Error {
        code: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
    NotImplemented,
}

impl Response {
    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success { .. })
    }

    /// The success payload, if any.
    pub fn result(&self) -> Option<&Value> {
        match self {
            Response::Success { result } => Some(result),
            _ => None,
        }
    }

    /// The error code, if any.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Response::Error { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Single-use reply slot for one command.
#[derive(Debug)]
pub struct MethodResult {
    method: String,
    sender: Option<oneshot::Sender<Response>>,
}

impl MethodResult {
    /// Creates a slot and the receiver the caller awaits.
    pub fn channel(method: impl Into<String>) -> (Self, oneshot::Receiver<Response>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                method: method.into(),
                sender: Some(tx),
            },
            rx,
        )
    }

    /// Method this slot answers.
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn success(self, result: Value) {
        self.send(Response::Success { result });
    }

    /// Answers with JSON null.
    pub fn success_null(self) {
        self.success(Value::Null);
    }

    pub fn error(self, code: impl Into<String>, message: impl Into<String>) {
        self.send(Response::Error {
            code: code.into(),
            message: message.into(),
            details: None,
        });
    }

    pub fn error_with_details(self, code: impl Into<String>, message: impl Into<String>, details: Value) {
        self.send(Response::Error {
            code: code.into(),
            message: message.into(),
            details: Some(details),
        });
    }

    pub fn not_implemented(self) {
        self.send(Response::NotImplemented);
    }

    fn send(mut self, response: Response) {
        if let Some(tx) = self.sender.take() {
            if tx.send(response).is_err() {
                tracing::trace!(method = %self.method, "Reply receiver already gone");
            }
        }
    }
}

impl Drop for MethodResult {
    fn drop(&mut self) {
        if let Some(tx) = self.sender.take() {
            // Dropped during unwinding means the handler panicked.
            let (code, message) = if std::thread::panicking() {
                (CODE_PLUGIN_PANIC, format!("handler for {} panicked", self.method))
            } else {
                (CODE_REPLY_DROPPED, format!("no reply was produced for {}", self.method))
            };
            tracing::warn!(method = %self.method, code, "Reply slot dropped without an answer");
            let _ = tx.send(Response::Error {
                code: code.to_string(),
                message,
                details: None,
            });
        }
    }
}
