//! Message types for the portcullis command protocol
//!
//! Both directions of the command channel carry UTF-8 JSON objects, one per
//! line. The commander sends [`CommandMessage`] frames; the daemon answers
//! with [`ResponseMessage`] frames.
//!
//! # Message Flow
//!
//! 1. Commander knocks the decoy ports and connects to the command port
//! 2. Daemon sends a `welcome` frame
//! 3. Commander sends `{"type": <capability>, "params": {...}}` requests
//! 4. Daemon answers each with a `response` frame naming the command and
//!    carrying an [`ExecutionResult`], or an `error` frame for lines that
//!    do not decode
//! 5. `{"type": "disconnect"}` receives a final response and ends the session

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Command type that terminates the session instead of dispatching
pub const DISCONNECT_TYPE: &str = "disconnect";

/// A decoded request from the commander
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandMessage {
    /// Capability to invoke (e.g. "shell", "read_file", "ping")
    #[serde(rename = "type")]
    pub kind: String,

    /// Capability parameters; empty when the capability takes none
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

impl CommandMessage {
    /// Create a message with no parameters
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Map::new(),
        }
    }

    /// Add a parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Whether this message asks the session to end
    pub fn is_disconnect(&self) -> bool {
        self.kind == DISCONNECT_TYPE
    }
}

/// A frame sent from the daemon to the commander
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResponseMessage {
    /// First frame on every admitted connection
    Welcome { message: String },

    /// Result of a dispatched command
    Response {
        /// The command type the result answers
        command: String,
        result: ExecutionResult,
    },

    /// A line that could not be decoded as a command
    Error { message: String },
}

/// Uniform result envelope returned by every capability
///
/// Capability-specific fields (stdout, content, entries, ...) are carried
/// in the flattened map so the wire shape stays
/// `{"success": ..., <fields>..., "error"?: ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,

    #[serde(flatten)]
    pub fields: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// A successful result with no fields yet
    pub fn ok() -> Self {
        Self {
            success: true,
            fields: Map::new(),
            error: None,
        }
    }

    /// A failed result carrying a structured error message
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            fields: Map::new(),
            error: Some(error.into()),
        }
    }

    /// Attach a capability-specific field
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_message_params_default_to_empty() {
        let msg: CommandMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg.kind, "ping");
        assert!(msg.params.is_empty());
    }

    #[test]
    fn command_message_roundtrip_with_params() {
        let msg = CommandMessage::new("shell").param("command", "uname -a");
        let json = serde_json::to_string(&msg).unwrap();
        let decoded: CommandMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.kind, "shell");
        assert_eq!(
            decoded.params.get("command").and_then(Value::as_str),
            Some("uname -a")
        );
    }

    #[test]
    fn disconnect_detection() {
        assert!(CommandMessage::new("disconnect").is_disconnect());
        assert!(!CommandMessage::new("ping").is_disconnect());
    }

    #[test]
    fn response_frame_is_tagged_by_type() {
        let frame = ResponseMessage::Response {
            command: "ping".to_string(),
            result: ExecutionResult::ok().field("message", "pong"),
        };
        let json: Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "response");
        assert_eq!(json["command"], "ping");
        assert_eq!(json["result"]["success"], true);
        assert_eq!(json["result"]["message"], "pong");
    }

    #[test]
    fn failure_result_carries_error_and_omits_it_on_success() {
        let failed = serde_json::to_value(ExecutionResult::failure("no such file")).unwrap();
        assert_eq!(failed["success"], false);
        assert_eq!(failed["error"], "no such file");

        let ok = serde_json::to_value(ExecutionResult::ok()).unwrap();
        assert_eq!(ok["success"], true);
        assert!(ok.get("error").is_none());
    }

    #[test]
    fn result_fields_flatten_into_the_envelope() {
        let json = r#"{"success":true,"stdout":"hi\n","stderr":"","returncode":0}"#;
        let result: ExecutionResult = serde_json::from_str(json).unwrap();
        assert!(result.success);
        assert_eq!(
            result.fields.get("stdout").and_then(Value::as_str),
            Some("hi\n")
        );
        assert_eq!(
            result.fields.get("returncode").and_then(Value::as_i64),
            Some(0)
        );
        assert!(result.error.is_none());
    }
}
