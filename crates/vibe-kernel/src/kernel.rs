//! Request dispatch around a [`Session`].

use std::io::BufRead;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::KernelResult;
use crate::messages::{
    msg_type, Channel, CompleteRequest, Envelope, ExecuteInputContent, ExecuteRequest,
    ExecutionState, InspectRequest, IsCompleteRequest, ShutdownRequest, StatusContent,
};
use crate::reply::{HelpLink, KernelInfoReply, LanguageInfo, ShutdownReply, Status, PROTOCOL_VERSION};
use crate::session::Session;
use crate::transport::{publish, Transport};

pub const DEFAULT_BANNER: &str = "vibekernel: a Hy-flavoured Lisp kernel";
const HELP_TEXT: &str = "Hy Documentation";
const HELP_URL: &str = "https://hylang.org/hy/doc/";

/// A session plus the transport its replies and broadcasts go to.
pub struct Kernel<T: Transport> {
    session: Session,
    transport: T,
    shutdown: bool,
}

impl<T: Transport> Kernel<T> {
    pub fn new(session: Session, transport: T) -> Self {
        Self {
            session,
            transport,
            shutdown: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// Handle one JSON-encoded envelope. Blank lines are ignored.
    pub fn handle_line(&mut self, line: &str) -> KernelResult<()> {
        if line.trim().is_empty() {
            return Ok(());
        }
        let envelope: Envelope = serde_json::from_str(line)?;
        self.handle(&envelope)
    }

    /// Handle one request, bracketed by busy and idle status broadcasts.
    pub fn handle(&mut self, envelope: &Envelope) -> KernelResult<()> {
        debug!(msg_type = %envelope.msg_type, msg_id = ?envelope.msg_id, "request");
        self.transport.set_parent(envelope.msg_id.as_deref());
        self.publish_status(ExecutionState::Busy);
        let result = self.dispatch(envelope);
        self.publish_status(ExecutionState::Idle);
        self.transport.set_parent(None);
        result
    }

    /// Read envelopes line by line until input ends or a shutdown request
    /// is handled. Malformed lines, including ones that are not UTF-8, are
    /// logged and skipped.
    pub fn run<R: BufRead>(&mut self, mut input: R) -> KernelResult<()> {
        info!("kernel ready");
        self.publish_status(ExecutionState::Starting);
        let mut buf = Vec::new();
        while !self.shutdown {
            buf.clear();
            if input.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line.trim_end_matches(['\n', '\r']),
                Err(err) => {
                    warn!(%err, "skipping request that is not UTF-8");
                    continue;
                }
            };
            if let Err(err) = self.handle_line(line) {
                warn!(%err, "skipping request");
            }
        }
        info!(execution_count = self.session.execution_count(), "kernel stopped");
        Ok(())
    }

    fn dispatch(&mut self, envelope: &Envelope) -> KernelResult<()> {
        match envelope.msg_type.as_str() {
            msg_type::EXECUTE_REQUEST => {
                let request: ExecuteRequest = content(envelope)?;
                if !request.silent {
                    let input = ExecuteInputContent {
                        code: request.code.clone(),
                        execution_count: self.session.execution_count() + 1,
                    };
                    publish(&mut self.transport, Channel::Iopub, msg_type::EXECUTE_INPUT, &input);
                }
                let reply = self.session.execute(&request, &mut self.transport);
                publish(&mut self.transport, Channel::Shell, msg_type::EXECUTE_REPLY, &reply);
            }
            msg_type::COMPLETE_REQUEST => {
                let request: CompleteRequest = content(envelope)?;
                let reply = self.session.complete(&request.code, request.cursor_pos);
                publish(&mut self.transport, Channel::Shell, msg_type::COMPLETE_REPLY, &reply);
            }
            msg_type::INSPECT_REQUEST => {
                let request: InspectRequest = content(envelope)?;
                let reply = self
                    .session
                    .inspect(&request.code, request.cursor_pos, request.detail_level);
                publish(&mut self.transport, Channel::Shell, msg_type::INSPECT_REPLY, &reply);
            }
            msg_type::IS_COMPLETE_REQUEST => {
                let request: IsCompleteRequest = content(envelope)?;
                let reply = self.session.is_complete(&request.code);
                publish(&mut self.transport, Channel::Shell, msg_type::IS_COMPLETE_REPLY, &reply);
            }
            msg_type::KERNEL_INFO_REQUEST => {
                let reply = self.kernel_info();
                publish(&mut self.transport, Channel::Shell, msg_type::KERNEL_INFO_REPLY, &reply);
            }
            msg_type::SHUTDOWN_REQUEST => {
                let request: ShutdownRequest = if envelope.content.is_null() {
                    ShutdownRequest::default()
                } else {
                    content(envelope)?
                };
                info!(restart = request.restart, "shutdown requested");
                let reply = ShutdownReply {
                    status: Status::Ok,
                    restart: request.restart,
                };
                publish(&mut self.transport, Channel::Control, msg_type::SHUTDOWN_REPLY, &reply);
                self.shutdown = true;
            }
            other => warn!(msg_type = other, "ignoring unsupported message type"),
        }
        Ok(())
    }

    pub fn kernel_info(&self) -> KernelInfoReply {
        let config = self.session.config();
        KernelInfoReply {
            status: Status::Ok,
            protocol_version: PROTOCOL_VERSION.to_string(),
            implementation: config.kernel_name.clone(),
            implementation_version: env!("CARGO_PKG_VERSION").to_string(),
            language_info: LanguageInfo::default(),
            banner: config
                .banner
                .clone()
                .unwrap_or_else(|| DEFAULT_BANNER.to_string()),
            help_links: vec![HelpLink {
                text: HELP_TEXT.to_string(),
                url: HELP_URL.to_string(),
            }],
        }
    }

    fn publish_status(&mut self, execution_state: ExecutionState) {
        publish(
            &mut self.transport,
            Channel::Iopub,
            msg_type::STATUS,
            &StatusContent { execution_state },
        );
    }
}

fn content<C: DeserializeOwned>(envelope: &Envelope) -> KernelResult<C> {
    Ok(C::deserialize(&envelope.content)?)
}
