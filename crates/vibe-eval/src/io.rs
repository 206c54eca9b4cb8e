//! Output streams guest code writes to.
//!
//! The evaluator never touches process stdout/stderr directly: `print`
//! goes through [`Streams`], whose two targets the kernel swaps out for
//! in-memory buffers while a cell runs.

use std::cell::RefCell;
use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;

/// Which of the two output streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamName {
    /// Regular output (`stdout`).
    Primary,
    /// Diagnostic output (`stderr`).
    Diagnostic,
}

impl StreamName {
    /// Wire name used by notebook front ends.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "stdout",
            Self::Diagnostic => "stderr",
        }
    }
}

/// A boxed stream target.
pub type Target = Box<dyn Write>;

struct Targets {
    primary: Target,
    diagnostic: Target,
    redirected: bool,
}

/// Shared handle to the evaluator's two output targets.
///
/// Cloning shares the targets, so a redirect made through one handle is
/// seen by every writer.
#[derive(Clone)]
pub struct Streams {
    inner: Rc<RefCell<Targets>>,
}

impl Streams {
    pub fn new(primary: impl Write + 'static, diagnostic: impl Write + 'static) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Targets {
                primary: Box::new(primary),
                diagnostic: Box::new(diagnostic),
                redirected: false,
            })),
        }
    }

    /// Process stdout and stderr.
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }

    /// Both targets discard everything.
    pub fn discard() -> Self {
        Self::new(io::sink(), io::sink())
    }

    pub fn write(&self, name: StreamName, text: &str) -> io::Result<()> {
        let mut targets = self.inner.borrow_mut();
        let target = match name {
            StreamName::Primary => &mut targets.primary,
            StreamName::Diagnostic => &mut targets.diagnostic,
        };
        target.write_all(text.as_bytes())?;
        target.flush()
    }

    /// Install new targets and hand back the previous ones.
    ///
    /// Returns `None`, leaving everything untouched, when a redirect is
    /// already in place: only one may be active at a time.
    pub fn redirect(&self, primary: Target, diagnostic: Target) -> Option<(Target, Target)> {
        let mut targets = self.inner.borrow_mut();
        if targets.redirected {
            return None;
        }
        targets.redirected = true;
        let old_primary = std::mem::replace(&mut targets.primary, primary);
        let old_diagnostic = std::mem::replace(&mut targets.diagnostic, diagnostic);
        Some((old_primary, old_diagnostic))
    }

    /// Put back targets returned by [`Streams::redirect`].
    pub fn restore(&self, previous: (Target, Target)) {
        let mut targets = self.inner.borrow_mut();
        targets.primary = previous.0;
        targets.diagnostic = previous.1;
        targets.redirected = false;
    }

    pub fn is_redirected(&self) -> bool {
        self.inner.borrow().redirected
    }
}

impl fmt::Debug for Streams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Streams")
            .field("redirected", &self.is_redirected())
            .finish_non_exhaustive()
    }
}
