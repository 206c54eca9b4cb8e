//! Request and side-channel message types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Map;

/// Message type names.
pub mod msg_type {
    pub const EXECUTE_REQUEST: &str = "execute_request";
    pub const EXECUTE_REPLY: &str = "execute_reply";
    pub const COMPLETE_REQUEST: &str = "complete_request";
    pub const COMPLETE_REPLY: &str = "complete_reply";
    pub const INSPECT_REQUEST: &str = "inspect_request";
    pub const INSPECT_REPLY: &str = "inspect_reply";
    pub const IS_COMPLETE_REQUEST: &str = "is_complete_request";
    pub const IS_COMPLETE_REPLY: &str = "is_complete_reply";
    pub const KERNEL_INFO_REQUEST: &str = "kernel_info_request";
    pub const KERNEL_INFO_REPLY: &str = "kernel_info_reply";
    pub const SHUTDOWN_REQUEST: &str = "shutdown_request";
    pub const SHUTDOWN_REPLY: &str = "shutdown_reply";

    pub const STATUS: &str = "status";
    pub const EXECUTE_INPUT: &str = "execute_input";
    pub const STREAM: &str = "stream";
    pub const ERROR: &str = "error";
    pub const EXECUTE_RESULT: &str = "execute_result";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Shell,
    Iopub,
    Control,
    Stdin,
}

/// One inbound message: a type tag plus its content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub msg_id: Option<String>,
    pub msg_type: String,
    #[serde(default)]
    pub content: serde_json::Value,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub code: String,
    /// Run without emitting anything on the side channel.
    #[serde(default)]
    pub silent: bool,
    #[serde(default = "default_true")]
    pub store_history: bool,
    #[serde(default)]
    pub user_expressions: Map<String, serde_json::Value>,
    #[serde(default = "default_true")]
    pub allow_stdin: bool,
}

impl ExecuteRequest {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            silent: false,
            store_history: true,
            user_expressions: Map::new(),
            allow_stdin: true,
        }
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteRequest {
    pub code: String,
    pub cursor_pos: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectRequest {
    pub code: String,
    pub cursor_pos: usize,
    #[serde(default)]
    pub detail_level: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsCompleteRequest {
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShutdownRequest {
    #[serde(default)]
    pub restart: bool,
}

// ── Side-channel content ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamContent {
    pub name: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorContent {
    pub ename: String,
    pub evalue: String,
    pub traceback: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResultContent {
    pub execution_count: u32,
    pub data: BTreeMap<String, String>,
    pub metadata: Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteInputContent {
    pub code: String,
    pub execution_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionState {
    Starting,
    Busy,
    Idle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusContent {
    pub execution_state: ExecutionState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_request_defaults() {
        let request: ExecuteRequest = serde_json::from_str(r#"{"code": "(+ 1 2)"}"#).unwrap();
        assert_eq!(request, ExecuteRequest::new("(+ 1 2)"));
    }

    #[test]
    fn envelope_without_id_or_content() {
        let envelope: Envelope = serde_json::from_str(r#"{"msg_type": "kernel_info_request"}"#).unwrap();
        assert_eq!(envelope.msg_id, None);
        assert!(envelope.content.is_null());
    }
}
