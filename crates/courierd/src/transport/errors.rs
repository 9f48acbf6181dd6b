//! Error types for transport operations.

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Errors surfaced by a [`Connector`](super::Connector) or
/// [`ResponseSender`](super::ResponseSender).
#[derive(Debug, Clone, Error)]
pub enum ConnectionError {
    /// The connector was set up incorrectly and cannot start.
    #[error("connector misconfigured: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },

    /// An operation required an established connection.
    #[error("not connected")]
    NotConnected,

    /// A message could not be delivered.
    #[error("failed to send message: {message}")]
    Send {
        /// Description of the delivery failure.
        message: String,
    },

    /// Reading from or writing to the underlying channel failed.
    #[error("transport I/O failed: {source}")]
    Io {
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
}

impl ConnectionError {
    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a delivery error.
    #[must_use]
    pub fn send(message: impl Into<String>) -> Self {
        Self::Send {
            message: message.into(),
        }
    }

    /// Wraps an I/O error.
    #[must_use]
    pub fn io(source: io::Error) -> Self {
        Self::Io {
            source: Arc::new(source),
        }
    }
}
