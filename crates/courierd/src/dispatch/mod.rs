//! Request dispatch for inbound action messages.
//!
//! The dispatcher is the `cnc_request` callback. For each message it:
//!
//! 1. validates the data section (see [`parse_request`]);
//! 2. looks the named module up in the registry;
//! 3. performs the action, catching module panics;
//! 4. sends exactly one response back to the sender with schema
//!    `cnc_response`.
//!
//! ## Response format
//!
//! A successful response's data section is the module's result object. A
//! failed one is `{"error": "<message>"}`, for example:
//!
//! ```json
//! {"error":"unknown module: nope"}
//! ```
//!
//! Debug entries that arrived with the request are returned in both cases.

mod dispatcher;
mod errors;
mod request;
mod response;


pub use self::dispatcher::RequestDispatcher;
pub use self::errors::DispatchError;
pub use self::request::parse_request;
pub use self::response::{DEBUG_DATA_KEY, ERROR_KEY, Response, ResponseBody};

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
