//! Call-stack frames and fault records.
//!
//! Every guest function call and every top-level unit pushes a [`Frame`].
//! Hosts that drive the evaluator push a frame of their own first and keep
//! the returned [`BoundaryTag`]; when a fault comes back, frames the tag
//! covers belong to the host and are left out of user-facing traces.

use std::rc::Rc;

use vibe_types::SourceFile;

use crate::error::EvalError;

/// Who owns a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Pushed by the embedding program.
    Host,
    /// Pushed while running guest code.
    Guest,
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub origin: Origin,
    /// 1-based position on the stack.
    pub depth: usize,
    /// Function name, or `<module>` for a top-level unit.
    pub name: String,
    pub source: Option<Rc<SourceFile>>,
    /// Line most recently reached inside this frame.
    pub line: u32,
}

impl Frame {
    pub(crate) fn guest(name: impl Into<String>, source: Rc<SourceFile>, line: u32) -> Self {
        Self {
            origin: Origin::Guest,
            depth: 0,
            name: name.into(),
            source: Some(source),
            line,
        }
    }

    pub(crate) fn host(name: impl Into<String>) -> Self {
        Self {
            origin: Origin::Host,
            depth: 0,
            name: name.into(),
            source: None,
            line: 0,
        }
    }

    pub fn file(&self) -> &str {
        self.source.as_deref().map_or("<host>", |s| s.name.as_str())
    }

    pub fn source_line(&self) -> Option<&str> {
        self.source.as_deref()?.line(self.line)
    }

    /// The frame as traceback lines: a location line, then the source
    /// line when there is one.
    pub fn render(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "  File \"{}\", line {}, in {}",
            self.file(),
            self.line,
            self.name
        )];
        if let Some(text) = self.source_line().map(str::trim).filter(|t| !t.is_empty()) {
            lines.push(format!("    {text}"));
        }
        lines
    }
}

/// Marks the stack depth of a host frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryTag {
    depth: usize,
}

impl BoundaryTag {
    pub(crate) fn new(depth: usize) -> Self {
        Self { depth }
    }

    pub fn depth(self) -> usize {
        self.depth
    }

    /// True when `frame` sits at or below the tagged host frame.
    pub fn covers(self, frame: &Frame) -> bool {
        frame.depth <= self.depth
    }
}

/// A failed evaluation: the error plus the stack as it was when the error
/// was first raised, outermost frame first.
#[derive(Debug, Clone)]
pub struct Fault {
    pub error: EvalError,
    pub frames: Vec<Frame>,
}

impl Fault {
    pub fn kind(&self) -> &str {
        self.error.kind()
    }

    pub fn message(&self) -> String {
        self.error.to_string()
    }

    /// Frames above the host boundary, outermost first.
    pub fn guest_frames(&self, tag: BoundaryTag) -> impl Iterator<Item = &Frame> {
        self.frames.iter().filter(move |frame| !tag.covers(frame))
    }
}
