//! The uniform contract every action handler implements.
//!
//! A [`Module`] is a named provider of one or more actions. In-process
//! modules compute their results directly; out-of-process modules delegate
//! each call to a freshly spawned executable. The dispatcher treats both
//! variants identically.

use crate::error::ModuleError;
use crate::protocol::{ActionSpec, ActionTable, Payload, Request};

/// Where a module's actions execute.
///
/// # Example
///
/// ```
/// use courier_modules::ModuleKind;
///
/// assert_eq!(ModuleKind::External.as_str(), "external");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    /// Built into the agent and executed in-process.
    Internal,
    /// Backed by an executable spawned once per action call.
    External,
}

impl ModuleKind {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::External => "external",
        }
    }
}

impl std::fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named handler exposing one or more actions.
///
/// Implementations must be safe to share across threads: the registry hands
/// out `Arc<dyn Module>` and lookups may happen concurrently.
///
/// # Example
///
/// ```
/// use courier_modules::{
///     ActionSpec, ActionTable, Module, ModuleError, ModuleKind, Payload, Request,
/// };
/// use courier_modules::module::action_table;
///
/// struct Constant {
///     actions: ActionTable,
/// }
///
/// impl Module for Constant {
///     fn name(&self) -> &str {
///         "constant"
///     }
///
///     fn kind(&self) -> ModuleKind {
///         ModuleKind::Internal
///     }
///
///     fn actions(&self) -> &ActionTable {
///         &self.actions
///     }
///
///     fn perform_request(&self, action: &str, _request: &Request) -> Result<Payload, ModuleError> {
///         self.ensure_action(action)?;
///         Ok(Payload::new())
///     }
/// }
///
/// let module = Constant { actions: action_table([ActionSpec::new("get")]) };
/// let request = Request::new("1", "controller", "constant", "get");
/// assert!(module.perform_request("get", &request).is_ok());
/// assert!(module.perform_request("set", &request).is_err());
/// ```
pub trait Module: Send + Sync {
    /// Unique module name used for routing.
    fn name(&self) -> &str;

    /// Whether the module runs in-process or as a subprocess.
    fn kind(&self) -> ModuleKind;

    /// Actions the module supports, keyed by name.
    fn actions(&self) -> &ActionTable;

    /// Performs one action for the given request.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::ActionNotFound`] for an undeclared action, and
    /// [`ModuleError::ActionTimeout`] or [`ModuleError::ActionExecution`]
    /// when the handler fails.
    fn perform_request(&self, action: &str, request: &Request) -> Result<Payload, ModuleError>;

    /// Returns `true` when the module declares `action`.
    fn has_action(&self, action: &str) -> bool {
        self.actions().contains_key(action)
    }

    /// Fails with [`ModuleError::ActionNotFound`] unless `action` is declared.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::ActionNotFound`] for an undeclared action.
    fn ensure_action(&self, action: &str) -> Result<(), ModuleError> {
        if self.has_action(action) {
            Ok(())
        } else {
            Err(ModuleError::action_not_found(self.name(), action))
        }
    }
}

/// Builds an action table from a list of declarations.
///
/// Later declarations with a repeated name replace earlier ones; callers
/// that must reject duplicates validate before building.
#[must_use]
pub fn action_table(specs: impl IntoIterator<Item = ActionSpec>) -> ActionTable {
    specs
        .into_iter()
        .map(|spec| (spec.name().to_owned(), spec))
        .collect()
}
