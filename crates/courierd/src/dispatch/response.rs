//! Response assembly for dispatched requests.
//!
//! A response carries either the module's result object or an error message,
//! never both. Debug entries from the request travel back with either kind
//! as `{"debug_data": "<entry>"}` chunks.

use courier_modules::Payload;
use serde_json::Value;

use crate::transport::{OutboundMessage, RESPONSE_SCHEMA};

/// Key of the message field in an error response.
pub const ERROR_KEY: &str = "error";

/// Key of the text field in a debug chunk.
pub const DEBUG_DATA_KEY: &str = "debug_data";

/// Outcome carried by a [`Response`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// The module's result object.
    Success(Payload),
    /// A human-readable failure message.
    Error(String),
}

/// The single reply produced for an accepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    in_reply_to: String,
    recipient: String,
    body: ResponseBody,
    debug: Vec<String>,
}

impl Response {
    /// Creates a successful response.
    #[must_use]
    pub fn success(
        in_reply_to: impl Into<String>,
        recipient: impl Into<String>,
        result: Payload,
    ) -> Self {
        Self::new(in_reply_to, recipient, ResponseBody::Success(result))
    }

    /// Creates an error response.
    #[must_use]
    pub fn error(
        in_reply_to: impl Into<String>,
        recipient: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(in_reply_to, recipient, ResponseBody::Error(message.into()))
    }

    fn new(in_reply_to: impl Into<String>, recipient: impl Into<String>, body: ResponseBody) -> Self {
        Self {
            in_reply_to: in_reply_to.into(),
            recipient: recipient.into(),
            body,
            debug: Vec::new(),
        }
    }

    /// Attaches debug entries to forward.
    #[must_use]
    pub fn with_debug(mut self, debug: Vec<String>) -> Self {
        self.debug = debug;
        self
    }

    /// Identifier of the request being answered.
    #[must_use]
    pub const fn in_reply_to(&self) -> &str {
        self.in_reply_to.as_str()
    }

    /// Endpoint the response is addressed to.
    #[must_use]
    pub const fn recipient(&self) -> &str {
        self.recipient.as_str()
    }

    /// Outcome of the request.
    #[must_use]
    pub const fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// Returns `true` for a successful response.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.body, ResponseBody::Success(_))
    }

    /// Builds the data section: the result, or `{"error": <message>}`.
    #[must_use]
    pub fn data(&self) -> Payload {
        match &self.body {
            ResponseBody::Success(result) => result.clone(),
            ResponseBody::Error(message) => {
                let mut data = Payload::new();
                data.insert(ERROR_KEY.to_owned(), Value::String(message.clone()));
                data
            }
        }
    }

    /// Wraps each forwarded debug entry in a `{"debug_data": ...}` chunk.
    #[must_use]
    pub fn debug_chunks(&self) -> Vec<Payload> {
        self.debug
            .iter()
            .map(|entry| {
                let mut chunk = Payload::new();
                chunk.insert(DEBUG_DATA_KEY.to_owned(), Value::String(entry.clone()));
                chunk
            })
            .collect()
    }

    /// Addresses the response back to the requester.
    #[must_use]
    pub fn to_outbound(&self, timeout_secs: u64) -> OutboundMessage {
        OutboundMessage {
            recipients: vec![self.recipient.clone()],
            schema: RESPONSE_SCHEMA.to_owned(),
            timeout_secs,
            in_reply_to: self.in_reply_to.clone(),
            data: self.data(),
            debug: self.debug_chunks(),
        }
    }
}
