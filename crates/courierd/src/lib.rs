//! The Courier agent.
//!
//! `courierd` receives action requests from a message broker, routes each one
//! to a named module, and sends exactly one response back to the requester.
//! Modules are either built in or external executables discovered in the
//! modules directory at startup (see [`courier_modules`]).
//!
//! Startup runs in a fixed order: load configuration, initialise structured
//! telemetry, build the module registry, then attach the
//! [`RequestDispatcher`] to a [`Connector`] and serve until the connection
//! ends. Health hooks emit structured events at each stage so operators can
//! see which step failed.
//!
//! The broker protocol itself lives behind the [`transport`] traits. The
//! bundled [`LineConnector`] speaks newline-delimited JSON over any reader
//! and writer, which is how the binary runs by default (stdin and stdout).

mod bootstrap;
pub mod dispatch;
mod health;
pub mod telemetry;
pub mod transport;

pub use bootstrap::{
    Agent, AgentError, ConfigLoader, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use dispatch::{DispatchError, RequestDispatcher, Response, ResponseBody};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{
    ConnectionError, Connector, LineConnector, MessageCallback, MessageData, OutboundMessage,
    ParsedChunks, ResponseSender,
};

#[cfg(all(test, unix))]
mod tests;
