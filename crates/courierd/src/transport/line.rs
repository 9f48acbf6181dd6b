//! Newline-delimited JSON connector.
//!
//! Each input line is an envelope:
//!
//! ```json
//! {"id":"42","sender":"controller","message_type":"cnc_request","data_type":"json",
//!  "data":{"module":"echo","action":"echo","params":{"msg":"hi"}},"debug":["hop"]}
//! ```
//!
//! `message_type` defaults to `cnc_request` and `data_type` to `json`; `data`
//! and `debug` may be omitted. Each response is written as one line:
//!
//! ```json
//! {"id":"courierd-1","in_reply_to":"42","recipients":["controller"],
//!  "message_type":"cnc_response","data":{"msg":"hi"},"debug":[{"debug_data":"hop"}]}
//! ```
//!
//! Malformed lines and lines whose schema has no callback are logged and
//! skipped. End of input ends the connection cleanly.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use courier_modules::Payload;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{
    ConnectionError, Connector, MessageCallback, MessageData, OutboundMessage, ParsedChunks,
    REQUEST_SCHEMA, ResponseSender, TRANSPORT_TARGET,
};

/// Connector that exchanges JSON lines over a reader and a writer.
pub struct LineConnector<R, W> {
    // Only `monitor_connection` reads; the mutex keeps the connector `Sync`.
    reader: Mutex<R>,
    sender: LineSender<W>,
    callbacks: HashMap<String, MessageCallback>,
}

impl<R, W> LineConnector<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    /// Creates a disconnected connector.
    #[must_use]
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(reader),
            sender: LineSender {
                writer: Mutex::new(writer),
                connected: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
            },
            callbacks: HashMap::new(),
        }
    }

    /// Returns `true` between a successful `connect` and the end of input.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.sender.connected.load(Ordering::SeqCst)
    }

    /// Consumes the connector and returns its writer.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Configuration`] if a writer lock was
    /// poisoned by a panicking sender.
    pub fn into_writer(self) -> Result<W, ConnectionError> {
        self.sender
            .writer
            .into_inner()
            .map_err(|_| ConnectionError::configuration("writer lock poisoned"))
    }
}

impl<R, W> ResponseSender for LineConnector<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn send(&self, message: &OutboundMessage) -> Result<(), ConnectionError> {
        self.sender.send(message)
    }
}

impl<R, W> Connector for LineConnector<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn register_callback(&mut self, schema: &str, callback: MessageCallback) {
        debug!(target: TRANSPORT_TARGET, schema, "registered message callback");
        self.callbacks.insert(schema.to_owned(), callback);
    }

    fn connect(&mut self) -> Result<(), ConnectionError> {
        if self.callbacks.is_empty() {
            return Err(ConnectionError::configuration(
                "no message callbacks registered",
            ));
        }
        self.sender.connected.store(true, Ordering::SeqCst);
        info!(target: TRANSPORT_TARGET, "line transport connected");
        Ok(())
    }

    fn monitor_connection(&mut self) -> Result<(), ConnectionError> {
        let Self {
            reader: reader_lock,
            sender,
            callbacks,
        } = self;
        if !sender.connected.load(Ordering::SeqCst) {
            return Err(ConnectionError::NotConnected);
        }
        let reader = reader_lock
            .get_mut()
            .map_err(|_| ConnectionError::configuration("reader lock poisoned"))?;

        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            let read = match reader.read_until(b'\n', &mut buffer) {
                Ok(read) => read,
                Err(error) => {
                    sender.connected.store(false, Ordering::SeqCst);
                    return Err(ConnectionError::io(error));
                }
            };
            if read == 0 {
                sender.connected.store(false, Ordering::SeqCst);
                info!(target: TRANSPORT_TARGET, "input closed; line transport disconnected");
                return Ok(());
            }

            let trimmed = buffer.trim_ascii();
            if trimmed.is_empty() {
                continue;
            }
            let (schema, chunks) = match parse_envelope(trimmed) {
                Ok(parsed) => parsed,
                Err(error) => {
                    warn!(target: TRANSPORT_TARGET, %error, "skipping malformed envelope");
                    continue;
                }
            };
            if let Some(callback) = callbacks.get(&schema) {
                callback(&chunks, &*sender);
                continue;
            }
            warn!(
                target: TRANSPORT_TARGET,
                schema = %schema,
                id = chunks.id(),
                "no callback registered for message schema; skipping"
            );
        }
    }
}

struct LineSender<W> {
    writer: Mutex<W>,
    connected: AtomicBool,
    next_id: AtomicU64,
}

impl<W: Write + Send> ResponseSender for LineSender<W> {
    fn send(&self, message: &OutboundMessage) -> Result<(), ConnectionError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ConnectionError::NotConnected);
        }
        let id = format!(
            "{}-{}",
            env!("CARGO_PKG_NAME"),
            self.next_id.fetch_add(1, Ordering::Relaxed)
        );
        let line = ResponseLine {
            id: &id,
            in_reply_to: &message.in_reply_to,
            recipients: &message.recipients,
            message_type: &message.schema,
            data: &message.data,
            debug: &message.debug,
        };
        let mut encoded =
            serde_json::to_vec(&line).map_err(|error| ConnectionError::send(error.to_string()))?;
        encoded.push(b'\n');

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| ConnectionError::send("writer lock poisoned"))?;
        writer.write_all(&encoded).map_err(ConnectionError::io)?;
        writer.flush().map_err(ConnectionError::io)?;

        debug!(
            target: TRANSPORT_TARGET,
            id = %id,
            in_reply_to = %message.in_reply_to,
            timeout_secs = message.timeout_secs,
            "wrote response line"
        );
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct ResponseLine<'a> {
    id: &'a str,
    in_reply_to: &'a str,
    recipients: &'a [String],
    message_type: &'a str,
    data: &'a Payload,
    debug: &'a [Payload],
}

#[derive(Debug, Deserialize)]
struct Envelope {
    id: String,
    sender: String,
    #[serde(default = "default_message_type")]
    message_type: String,
    #[serde(default)]
    data_type: DataType,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    debug: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum DataType {
    #[default]
    Json,
    Text,
}

fn default_message_type() -> String {
    REQUEST_SCHEMA.to_owned()
}

/// Splits an envelope line into its schema and parsed chunks.
///
/// Lines that are not UTF-8 fail here as JSON syntax errors.
fn parse_envelope(line: &[u8]) -> Result<(String, ParsedChunks), serde_json::Error> {
    let envelope: Envelope = serde_json::from_slice(line)?;
    let data_type = envelope.data_type;
    let data = envelope.data.map(|value| match (data_type, value) {
        (DataType::Json, json) => MessageData::Json(json),
        (DataType::Text, Value::String(text)) => MessageData::Text(text),
        (DataType::Text, other) => MessageData::Text(other.to_string()),
    });
    let mut parsed = ParsedChunks::new(envelope.id, envelope.sender).with_debug(envelope.debug);
    if let Some(section) = data {
        parsed = parsed.with_data(section);
    }
    Ok((envelope.message_type, parsed))
}
