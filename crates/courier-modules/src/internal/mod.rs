//! Built-in modules executed in-process.
//!
//! These handlers are small, fixed computations over the request and never
//! block for long, so no deadline applies to them.

mod echo;
mod inventory;
mod ping;
mod status;

use std::sync::Arc;
use std::time::Instant;

pub use self::echo::Echo;
pub use self::inventory::Inventory;
pub use self::ping::Ping;
pub use self::status::Status;

use crate::module::Module;

/// Version reported by modules that describe the agent.
pub(crate) const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns every built-in module.
///
/// `started` is the agent start time reported by the `status` module.
#[must_use]
pub fn builtin_modules(started: Instant) -> Vec<Arc<dyn Module>> {
    vec![
        Arc::new(Echo::new()),
        Arc::new(Inventory::new()),
        Arc::new(Ping::new()),
        Arc::new(Status::new(started)),
    ]
}
