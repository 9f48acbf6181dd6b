//! Request dispatcher.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use courier_modules::{Module, ModuleRegistry, Payload, Request};
use tracing::{debug, error, info, warn};

use super::DISPATCH_TARGET;
use super::errors::DispatchError;
use super::request::parse_request;
use super::response::Response;
use crate::transport::{MessageCallback, ParsedChunks, ResponseSender};

/// Turns inbound requests into exactly one response each.
///
/// The dispatcher validates the message, looks the module up in a shared
/// read-only registry, performs the action, and sends the outcome back to
/// the requester. Every failure becomes an error response; nothing
/// propagates to the caller.
#[derive(Debug, Clone)]
pub struct RequestDispatcher {
    registry: Arc<ModuleRegistry>,
    response_timeout_secs: u64,
}

impl RequestDispatcher {
    /// Creates a dispatcher over `registry`.
    ///
    /// `response_timeout_secs` is attached to every outbound response.
    #[must_use]
    pub const fn new(registry: Arc<ModuleRegistry>, response_timeout_secs: u64) -> Self {
        Self {
            registry,
            response_timeout_secs,
        }
    }

    /// Registry used for routing.
    #[must_use]
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Handles one inbound message and replies through `sender`.
    ///
    /// Returns the response that was handed to `sender`. A delivery failure
    /// is logged and not retried; the requester is expected to ask again.
    #[must_use]
    pub fn dispatch(&self, chunks: &ParsedChunks, sender: &dyn ResponseSender) -> Response {
        info!(
            target: DISPATCH_TARGET,
            id = chunks.id(),
            sender = chunks.sender(),
            "received request"
        );

        let response = self
            .process(chunks)
            .map_or_else(
                |error| {
                    log_failure(chunks, &error);
                    Response::error(chunks.id(), chunks.sender(), error.to_string())
                },
                |result| Response::success(chunks.id(), chunks.sender(), result),
            )
            .with_debug(chunks.debug().to_vec());

        if let Err(error) = sender.send(&response.to_outbound(self.response_timeout_secs)) {
            error!(
                target: DISPATCH_TARGET,
                id = chunks.id(),
                sender = chunks.sender(),
                %error,
                "failed to deliver response"
            );
        }
        response
    }

    /// Wraps the dispatcher in a callback suitable for
    /// [`Connector::register_callback`](crate::transport::Connector::register_callback).
    #[must_use]
    pub fn into_callback(self: Arc<Self>) -> MessageCallback {
        Box::new(move |chunks: &ParsedChunks, sender: &dyn ResponseSender| {
            let response = self.dispatch(chunks, sender);
            debug!(
                target: DISPATCH_TARGET,
                id = response.in_reply_to(),
                success = response.is_success(),
                "request handled"
            );
        })
    }

    fn process(&self, chunks: &ParsedChunks) -> Result<Payload, DispatchError> {
        let request = parse_request(chunks)?;
        let module = self
            .registry
            .lookup(request.module())
            .ok_or_else(|| DispatchError::unknown_module(request.module()))?;

        debug!(
            target: DISPATCH_TARGET,
            id = request.id(),
            module = request.module(),
            action = request.action(),
            kind = %module.kind(),
            "performing action"
        );
        perform(module.as_ref(), &request)
    }
}

/// Runs the action, converting a panic into an error.
fn perform(module: &dyn Module, request: &Request) -> Result<Payload, DispatchError> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        module.perform_request(request.action(), request)
    }))
    .map_err(|_| DispatchError::ModulePanicked {
        module: request.module().to_owned(),
        action: request.action().to_owned(),
    })?;
    Ok(result?)
}

fn log_failure(chunks: &ParsedChunks, error: &DispatchError) {
    if error.is_validation() {
        warn!(
            target: DISPATCH_TARGET,
            id = chunks.id(),
            sender = chunks.sender(),
            %error,
            "rejected invalid request"
        );
    } else {
        error!(
            target: DISPATCH_TARGET,
            id = chunks.id(),
            sender = chunks.sender(),
            %error,
            diagnostics = error.diagnostics().unwrap_or_default(),
            "failed to process request"
        );
    }
}
