//! Transport contract between the agent and its message broker.
//!
//! The agent never talks to the broker directly. It registers a callback per
//! inbound schema on a [`Connector`], and replies through the
//! [`ResponseSender`] half of the same connector. Connection establishment,
//! framing, reconnection, and encryption all live behind these traits.
//!
//! [`LineConnector`] is the only implementation shipped here. It reads one
//! JSON envelope per line and writes one JSON response per line, which makes
//! the agent drivable from a pipe or a test.

mod errors;
mod line;

#[cfg(test)]
mod tests;

use courier_modules::Payload;
use serde_json::Value;

pub use self::errors::ConnectionError;
pub use self::line::LineConnector;

pub(crate) const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Schema of inbound action requests.
pub const REQUEST_SCHEMA: &str = "cnc_request";

/// Schema of responses to action requests.
pub const RESPONSE_SCHEMA: &str = "cnc_response";

/// Data section of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageData {
    /// Structured JSON content.
    Json(Value),
    /// Opaque text content.
    Text(String),
}

/// An inbound message split into envelope, data, and debug chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedChunks {
    id: String,
    sender: String,
    data: Option<MessageData>,
    debug: Vec<String>,
}

impl ParsedChunks {
    /// Creates a message with no data and no debug entries.
    #[must_use]
    pub fn new(id: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sender: sender.into(),
            data: None,
            debug: Vec::new(),
        }
    }

    /// Attaches a data section.
    #[must_use]
    pub fn with_data(mut self, data: MessageData) -> Self {
        self.data = Some(data);
        self
    }

    /// Attaches a JSON data section.
    #[must_use]
    pub fn with_json(self, data: Value) -> Self {
        self.with_data(MessageData::Json(data))
    }

    /// Attaches debug entries recorded by intermediaries.
    #[must_use]
    pub fn with_debug(mut self, debug: Vec<String>) -> Self {
        self.debug = debug;
        self
    }

    /// Message identifier assigned by the sender.
    #[must_use]
    pub const fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Endpoint that sent the message.
    #[must_use]
    pub const fn sender(&self) -> &str {
        self.sender.as_str()
    }

    /// Data section, when present.
    #[must_use]
    pub const fn data(&self) -> Option<&MessageData> {
        self.data.as_ref()
    }

    /// Debug entries in arrival order.
    #[must_use]
    pub fn debug(&self) -> &[String] {
        &self.debug
    }
}

/// A message handed to a [`ResponseSender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Endpoints that should receive the message.
    pub recipients: Vec<String>,
    /// Schema name of the data section.
    pub schema: String,
    /// How long the broker should try to deliver the message.
    pub timeout_secs: u64,
    /// Identifier of the request this message answers.
    pub in_reply_to: String,
    /// Data section.
    pub data: Payload,
    /// Debug chunks, each of the form `{"debug_data": "<entry>"}`.
    pub debug: Vec<Payload>,
}

/// Outbound half of a connection.
pub trait ResponseSender: Send + Sync {
    /// Delivers `message` to its recipients.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] when the message cannot be handed to the
    /// broker. Callers do not retry.
    fn send(&self, message: &OutboundMessage) -> Result<(), ConnectionError>;
}

/// Callback invoked for each inbound message of a registered schema.
///
/// The connector passes itself as the sender so the callback can reply.
pub type MessageCallback = Box<dyn Fn(&ParsedChunks, &dyn ResponseSender) + Send + Sync>;

/// A broker connection that delivers inbound messages to callbacks.
pub trait Connector: ResponseSender {
    /// Routes inbound messages of `schema` to `callback`, replacing any
    /// callback registered earlier for the same schema.
    fn register_callback(&mut self, schema: &str, callback: MessageCallback);

    /// Establishes the connection.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Configuration`] when the connector cannot
    /// start with its current setup.
    fn connect(&mut self) -> Result<(), ConnectionError>;

    /// Processes inbound messages until the connection ends.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] when the connection fails for good.
    fn monitor_connection(&mut self) -> Result<(), ConnectionError>;
}
