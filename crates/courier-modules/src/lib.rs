//! Action modules for the Courier agent.
//!
//! The `courier-modules` crate provides everything the agent needs to turn a
//! validated request into a result: the [`Module`] contract, the built-in
//! modules, the [`ExternalModule`] adapter that runs executables on disk as
//! short-lived subprocesses, and the [`ModuleRegistry`] that maps module
//! names to handlers.
//!
//! # Architecture
//!
//! At startup the agent builds a registry once: built-in modules first, then
//! every executable found in the modules directory. Loading is best-effort;
//! a file that fails to describe itself is logged and skipped. After
//! [`ModuleRegistryBuilder::build`] the registry is immutable and can be
//! shared across threads without locking.
//!
//! External modules are isolated by the process boundary. Each action call
//! spawns the executable afresh, exchanges one JSON document in each
//! direction (see [`protocol`]), and is killed if it overruns its deadline.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::time::Duration;
//!
//! use courier_modules::{ModuleRegistry, Request};
//!
//! let mut builder = ModuleRegistry::builder(Duration::from_secs(30));
//! builder.load_internal();
//! let report = builder.load_external(Path::new("/opt/courier/modules"));
//! let registry = builder.build();
//!
//! let request = Request::new("1", "controller", "ping", "ping");
//! let module = registry.lookup("ping").expect("ping is built in");
//! let result = module.perform_request("ping", &request);
//! # let _ = (report, result);
//! ```

pub mod error;
pub mod external;
pub mod internal;
pub mod module;
pub mod process;
pub mod protocol;
pub mod registry;

#[cfg(all(test, unix))]
mod tests;

pub use self::error::ModuleError;
pub use self::external::ExternalModule;
pub use self::module::{Module, ModuleKind};
pub use self::protocol::{ActionSpec, ActionTable, ModuleDescription, Payload, Request};
pub use self::registry::{
    LoadFailure, LoadReport, LoadedModule, ModuleRegistry, ModuleRegistryBuilder,
};
