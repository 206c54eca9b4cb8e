//! Rendering of the trace lines sent with `error` messages.

use vibe_eval::{BoundaryTag, Fault};

use crate::reader::{SyntaxFailure, INPUT_NAME};
use crate::reply::PARSE_ERROR;

pub const TRACEBACK_HEADER: &str = "Traceback (most recent call last):";

/// Characters of the submission shown in a parse trace.
const PREVIEW_CHARS: usize = 50;

/// Three lines: location, a preview of the submission, the error.
pub fn syntax_trace(code: &str, failure: &SyntaxFailure) -> Vec<String> {
    vec![
        format!("  File \"{INPUT_NAME}\", line {}", failure.line),
        format!("    {}", preview(code)),
        format!("{PARSE_ERROR}: {}", failure.message),
    ]
}

fn preview(code: &str) -> String {
    let mut chars = code.trim().chars();
    let mut head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        head.push_str("...");
    }
    head
}

/// Trace of an evaluation fault with host frames removed.
///
/// With no guest frames left this is only the final `Kind: message` line.
pub fn guest_trace(fault: &Fault, tag: BoundaryTag) -> Vec<String> {
    let summary = summary_line(fault.kind(), &fault.message());
    let mut frames = fault.guest_frames(tag).peekable();
    if frames.peek().is_none() {
        return vec![summary];
    }
    let mut lines = vec![TRACEBACK_HEADER.to_string()];
    lines.extend(frames.flat_map(|frame| frame.render()));
    lines.push(summary);
    lines
}

fn summary_line(kind: &str, message: &str) -> String {
    if message.is_empty() {
        kind.to_string()
    } else {
        format!("{kind}: {message}")
    }
}
