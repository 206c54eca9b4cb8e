//! Outbound message delivery.
//!
//! Sending is fire-and-forget: a transport that cannot deliver logs the
//! failure and carries on, so the execute cycle never fails because of
//! its side channel.

use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;
use serde_json::{json, Map};
use tracing::{error, warn};
use vibe_eval::StreamName;

use crate::messages::{msg_type, Channel, ErrorContent, ExecuteResultContent, StreamContent};

pub trait Transport {
    fn send(&mut self, channel: Channel, msg_type: &str, content: serde_json::Value);

    /// Id of the request that outbound messages answer, if any.
    fn set_parent(&mut self, _parent_id: Option<&str>) {}
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, channel: Channel, msg_type: &str, content: serde_json::Value) {
        (**self).send(channel, msg_type, content);
    }

    fn set_parent(&mut self, parent_id: Option<&str>) {
        (**self).set_parent(parent_id);
    }
}

/// Serialize `content` and send it.
pub fn publish<C: Serialize>(transport: &mut dyn Transport, channel: Channel, msg_type: &str, content: &C) {
    match serde_json::to_value(content) {
        Ok(value) => transport.send(channel, msg_type, value),
        Err(err) => error!(msg_type, %err, "failed to serialize message"),
    }
}

// ── Implementations ───────────────────────────────────────────────────────

/// A message captured by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub channel: Channel,
    pub msg_type: String,
    pub content: serde_json::Value,
}

/// Keeps every message in memory, in send order.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub messages: Vec<SentMessage>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_type(&self, msg_type: &str) -> Vec<&SentMessage> {
        self.messages
            .iter()
            .filter(|m| m.msg_type == msg_type)
            .collect()
    }

    pub fn msg_types(&self) -> Vec<&str> {
        self.messages.iter().map(|m| m.msg_type.as_str()).collect()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, channel: Channel, msg_type: &str, content: serde_json::Value) {
        self.messages.push(SentMessage {
            channel,
            msg_type: msg_type.to_string(),
            content,
        });
    }
}

/// Writes one JSON object per line:
/// `{"channel", "msg_type", "parent_id", "content"}`.
#[derive(Debug)]
pub struct JsonLinesTransport<W: Write> {
    out: W,
    parent_id: Option<String>,
}

impl<W: Write> JsonLinesTransport<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            parent_id: None,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Transport for JsonLinesTransport<W> {
    fn send(&mut self, channel: Channel, msg_type: &str, content: serde_json::Value) {
        let line = json!({
            "channel": channel,
            "msg_type": msg_type,
            "parent_id": self.parent_id,
            "content": content,
        });
        let written = writeln!(self.out, "{line}").and_then(|()| self.out.flush());
        if let Err(err) = written {
            warn!(msg_type, %err, "failed to write message");
        }
    }

    fn set_parent(&mut self, parent_id: Option<&str>) {
        self.parent_id = parent_id.map(str::to_string);
    }
}

// ── Side channel ──────────────────────────────────────────────────────────

/// The execute cycle's view of the transport: typed iopub emissions that
/// all become no-ops for silent submissions.
pub(crate) struct SideChannel<'a> {
    transport: &'a mut dyn Transport,
    silent: bool,
}

impl<'a> SideChannel<'a> {
    pub(crate) fn new(transport: &'a mut dyn Transport, silent: bool) -> Self {
        Self { transport, silent }
    }

    pub(crate) fn is_silent(&self) -> bool {
        self.silent
    }

    fn emit<C: Serialize>(&mut self, msg_type: &str, content: &C) {
        if !self.silent {
            publish(&mut *self.transport, Channel::Iopub, msg_type, content);
        }
    }

    /// Empty text is not sent.
    pub(crate) fn emit_stream(&mut self, name: StreamName, text: &str) {
        if text.is_empty() {
            return;
        }
        self.emit(
            msg_type::STREAM,
            &StreamContent {
                name: name.as_str().to_string(),
                text: text.to_string(),
            },
        );
    }

    pub(crate) fn emit_error(&mut self, ename: &str, evalue: &str, traceback: Vec<String>) {
        self.emit(
            msg_type::ERROR,
            &ErrorContent {
                ename: ename.to_string(),
                evalue: evalue.to_string(),
                traceback,
            },
        );
    }

    pub(crate) fn emit_result(&mut self, execution_count: u32, data: BTreeMap<String, String>) {
        self.emit(
            msg_type::EXECUTE_RESULT,
            &ExecuteResultContent {
                execution_count,
                data,
                metadata: Map::new(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_lines_format() {
        let mut transport = JsonLinesTransport::new(Vec::new());
        transport.set_parent(Some("abc"));
        transport.send(Channel::Iopub, "status", json!({"execution_state": "busy"}));
        let text = String::from_utf8(transport.into_inner()).unwrap();
        let line: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(
            line,
            json!({
                "channel": "iopub",
                "msg_type": "status",
                "parent_id": "abc",
                "content": {"execution_state": "busy"},
            })
        );
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn silent_side_channel_sends_nothing() {
        let mut transport = RecordingTransport::new();
        let mut side = SideChannel::new(&mut transport, true);
        side.emit_stream(StreamName::Primary, "x");
        side.emit_error("E", "e", vec![]);
        assert!(transport.messages.is_empty());
    }

    #[test]
    fn empty_streams_are_skipped() {
        let mut transport = RecordingTransport::new();
        let mut side = SideChannel::new(&mut transport, false);
        side.emit_stream(StreamName::Primary, "");
        side.emit_stream(StreamName::Diagnostic, "oops");
        assert_eq!(transport.msg_types(), vec!["stream"]);
        assert_eq!(transport.messages[0].content["name"], "stderr");
    }
}
