//! The execute cycle: parse, count, capture, evaluate, present, reply.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use tracing::{debug, error, info, warn};
use vibe_eval::{StreamName, Value};
use vibe_types::SourceFile;

use crate::capture::CaptureScope;
use crate::error::KernelResult;
use crate::messages::ExecuteRequest;
use crate::presenter;
use crate::reader;
use crate::reply::{ExecuteReply, INTERNAL_ERROR, PARSE_ERROR};
use crate::session::Session;
use crate::traceback;
use crate::transport::{SideChannel, Transport};

impl Session {
    /// Run one submission and build its outcome.
    ///
    /// Never fails: syntax errors, guest errors, kernel errors and panics
    /// all come back as an error reply. Side-channel messages go to
    /// `transport` unless the request is silent.
    pub fn execute(&mut self, request: &ExecuteRequest, transport: &mut dyn Transport) -> ExecuteReply {
        if request.code.trim().is_empty() {
            return ExecuteReply::ok(self.counter.current());
        }
        debug!(
            silent = request.silent,
            store_history = request.store_history,
            "execute request"
        );

        let mut side = SideChannel::new(transport, request.silent);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run_submission(&request.code, &mut side)
        }));
        match outcome {
            Ok(Ok(reply)) => reply,
            Ok(Err(err)) => {
                self.evaluator.recover();
                self.internal_fault(&err.to_string(), &mut side)
            }
            Err(payload) => {
                self.evaluator.recover();
                self.internal_fault(&panic_message(payload.as_ref()), &mut side)
            }
        }
    }

    fn run_submission(&mut self, code: &str, side: &mut SideChannel<'_>) -> KernelResult<ExecuteReply> {
        let units = match reader::read_units(code) {
            Ok(units) => units,
            Err(failure) => {
                warn!(line = failure.line, reason = %failure.message, "parse failed");
                side.emit_error(
                    PARSE_ERROR,
                    &failure.message,
                    traceback::syntax_trace(code, &failure),
                );
                return Ok(ExecuteReply::error(
                    self.counter.current(),
                    PARSE_ERROR,
                    failure.message,
                ));
            }
        };

        let count = self.counter.increment();
        info!(execution_count = count, units = units.len(), "executing");
        let source = Rc::new(SourceFile::new(format!("<cell-{count}>"), code));

        let scope = CaptureScope::begin(self.evaluator.streams())?;
        let tag = self.evaluator.enter_host("execute");
        let evaluator = &mut self.evaluator;
        let result = units
            .iter()
            .try_fold(Value::None, |_, unit| evaluator.evaluate(unit, &source));
        self.evaluator.leave_host(tag);

        let value = match result {
            Ok(value) => value,
            Err(fault) => {
                // Output captured before the failure is discarded.
                drop(scope);
                let (ename, evalue) = (fault.kind().to_string(), fault.message());
                warn!(execution_count = count, %ename, %evalue, "evaluation failed");
                side.emit_error(&ename, &evalue, traceback::guest_trace(&fault, tag));
                return Ok(ExecuteReply::error(count, ename, evalue));
            }
        };

        let captured = scope.end();
        side.emit_stream(StreamName::Primary, &captured.primary);
        side.emit_stream(StreamName::Diagnostic, &captured.diagnostic);
        if !value.is_none() && !side.is_silent() {
            let data = presenter::present(&mut self.evaluator, &value);
            side.emit_result(count, data);
        }
        debug!(execution_count = count, "execution finished");
        Ok(ExecuteReply::ok(count))
    }

    fn internal_fault(&self, message: &str, side: &mut SideChannel<'_>) -> ExecuteReply {
        error!(fault = message, "internal kernel fault");
        side.emit_error(
            INTERNAL_ERROR,
            message,
            vec![format!("{INTERNAL_ERROR}: {message}")],
        );
        ExecuteReply::error(self.counter.current(), INTERNAL_ERROR, message)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "kernel panicked".to_string()
    }
}
