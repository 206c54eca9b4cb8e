//! Reply records returned on the shell channel.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Map;

/// `ename` of submissions that fail to parse.
pub const PARSE_ERROR: &str = "ParseError";
/// `ename` of failures inside the kernel itself.
pub const INTERNAL_ERROR: &str = "InternalError";

/// Jupyter messaging protocol version implemented.
pub const PROTOCOL_VERSION: &str = "5.3";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// Outcome of one submission.
///
/// The traceback of an error record is always empty; the rendered trace
/// travels on the side channel instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ExecuteReply {
    Ok {
        execution_count: u32,
        payload: Vec<serde_json::Value>,
        user_expressions: Map<String, serde_json::Value>,
    },
    Error {
        execution_count: u32,
        ename: String,
        evalue: String,
        traceback: Vec<String>,
    },
}

impl ExecuteReply {
    pub fn ok(execution_count: u32) -> Self {
        Self::Ok {
            execution_count,
            payload: Vec::new(),
            user_expressions: Map::new(),
        }
    }

    pub fn error(execution_count: u32, ename: impl Into<String>, evalue: impl Into<String>) -> Self {
        Self::Error {
            execution_count,
            ename: ename.into(),
            evalue: evalue.into(),
            traceback: Vec::new(),
        }
    }

    pub fn execution_count(&self) -> u32 {
        match self {
            Self::Ok { execution_count, .. } | Self::Error { execution_count, .. } => {
                *execution_count
            }
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn ename(&self) -> Option<&str> {
        match self {
            Self::Error { ename, .. } => Some(ename),
            Self::Ok { .. } => None,
        }
    }

    pub fn evalue(&self) -> Option<&str> {
        match self {
            Self::Error { evalue, .. } => Some(evalue),
            Self::Ok { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteReply {
    pub status: Status,
    pub matches: Vec<String>,
    pub cursor_start: usize,
    pub cursor_end: usize,
    pub metadata: Map<String, serde_json::Value>,
}

impl CompleteReply {
    pub fn new(matches: Vec<String>, cursor_start: usize, cursor_end: usize) -> Self {
        Self {
            status: Status::Ok,
            matches,
            cursor_start,
            cursor_end,
            metadata: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectReply {
    pub status: Status,
    pub found: bool,
    pub data: BTreeMap<String, String>,
    pub metadata: Map<String, serde_json::Value>,
}

impl InspectReply {
    pub fn found(text: String) -> Self {
        let mut data = BTreeMap::new();
        data.insert("text/plain".to_string(), text);
        Self {
            status: Status::Ok,
            found: true,
            data,
            metadata: Map::new(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: Status::Ok,
            found: false,
            data: BTreeMap::new(),
            metadata: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    Complete,
    Incomplete,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsCompleteReply {
    pub status: Completeness,
    /// Suggested indent for the next line of an incomplete submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub name: String,
    pub version: String,
    pub mimetype: String,
    pub file_extension: String,
    pub codemirror_mode: String,
}

impl Default for LanguageInfo {
    fn default() -> Self {
        Self {
            name: "hy".into(),
            version: vibe_eval::LANGUAGE_VERSION.into(),
            mimetype: "text/x-hylang".into(),
            file_extension: ".hy".into(),
            codemirror_mode: "scheme".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelpLink {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelInfoReply {
    pub status: Status,
    pub protocol_version: String,
    pub implementation: String,
    pub implementation_version: String,
    pub language_info: LanguageInfo,
    pub banner: String,
    pub help_links: Vec<HelpLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShutdownReply {
    pub status: Status,
    pub restart: bool,
}
