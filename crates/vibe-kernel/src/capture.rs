//! Output capture for one submission.

use std::cell::RefCell;
use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;

use vibe_eval::{Streams, Target};

use crate::error::{KernelError, KernelResult};

/// In-memory stream target whose contents stay readable after it has
/// been handed to the evaluator.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn take_text(&self) -> String {
        let bytes = std::mem::take(&mut *self.0.borrow_mut());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Text written while a [`CaptureScope`] was open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    pub primary: String,
    pub diagnostic: String,
}

/// Redirects both evaluator streams into fresh buffers until ended or
/// dropped. Dropping without [`CaptureScope::end`] restores the previous
/// targets and discards what was captured.
pub struct CaptureScope {
    streams: Streams,
    previous: Option<(Target, Target)>,
    primary: SharedBuffer,
    diagnostic: SharedBuffer,
}

impl CaptureScope {
    pub fn begin(streams: &Streams) -> KernelResult<Self> {
        let primary = SharedBuffer::default();
        let diagnostic = SharedBuffer::default();
        let previous = streams
            .redirect(Box::new(primary.clone()), Box::new(diagnostic.clone()))
            .ok_or(KernelError::CaptureActive)?;
        Ok(Self {
            streams: streams.clone(),
            previous: Some(previous),
            primary,
            diagnostic,
        })
    }

    /// Restore the previous targets and return the captured text.
    pub fn end(mut self) -> Captured {
        self.restore();
        Captured {
            primary: self.primary.take_text(),
            diagnostic: self.diagnostic.take_text(),
        }
    }

    fn restore(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.streams.restore(previous);
        }
    }
}

impl Drop for CaptureScope {
    fn drop(&mut self) {
        self.restore();
    }
}

impl fmt::Debug for CaptureScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureScope")
            .field("active", &self.previous.is_some())
            .finish_non_exhaustive()
    }
}
