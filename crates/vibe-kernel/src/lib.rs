//! vibekernel: a notebook kernel for a Hy-flavoured Lisp.
//!
//! A [`Session`] owns the interpreter state and the execution counter and
//! runs the execute cycle: parse a submission into units, evaluate them in
//! order under output capture, publish streams, errors and the final value
//! on a [`Transport`], and return an [`ExecuteReply`]. [`Kernel`] wraps a
//! session with request dispatch for the other message types.
//!
//! ```
//! use vibe_kernel::{ExecuteRequest, RecordingTransport, Session};
//!
//! let mut session = Session::new();
//! let mut transport = RecordingTransport::new();
//! let reply = session.execute(&ExecuteRequest::new("(+ 1 2 3)"), &mut transport);
//! assert!(reply.is_ok());
//! assert_eq!(reply.execution_count(), 1);
//! assert_eq!(transport.of_type("execute_result")[0].content["data"]["text/plain"], "6");
//! ```

pub mod capture;
pub mod complete;
pub mod config;
mod controller;
pub mod error;
pub mod kernel;
pub mod messages;
pub mod presenter;
pub mod reader;
pub mod reply;
pub mod session;
pub mod traceback;
pub mod transport;

pub use capture::{CaptureScope, Captured, SharedBuffer};
pub use config::KernelConfig;
pub use error::{KernelError, KernelResult};
pub use kernel::Kernel;
pub use messages::{
    Channel, CompleteRequest, Envelope, ExecuteRequest, InspectRequest, IsCompleteRequest,
    ShutdownRequest,
};
pub use presenter::present;
pub use reader::{read_units, SyntaxFailure};
pub use reply::{
    CompleteReply, Completeness, ExecuteReply, InspectReply, IsCompleteReply, KernelInfoReply,
    ShutdownReply,
};
pub use session::{ExecutionCounter, Session};
pub use transport::{publish, JsonLinesTransport, RecordingTransport, SentMessage, Transport};
