//! Error types for request dispatch failures.
//!
//! Every variant becomes an error response for the requester; none of them
//! stop the agent. The display text is what the requester sees.

use courier_modules::ModuleError;
use thiserror::Error;

/// Errors surfaced while validating, routing, or executing a request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The message carried no data section.
    #[error("no data")]
    NoData,

    /// The data section was not structured JSON.
    #[error("data is not in JSON format")]
    DataNotJson,

    /// The data section did not match the request schema.
    #[error("invalid request: {message}")]
    InvalidStructure {
        /// Description of the mismatch.
        message: String,
    },

    /// A required field was present but blank.
    #[error("invalid request: '{field}' must not be empty")]
    EmptyField {
        /// Name of the blank field.
        field: &'static str,
    },

    /// No module is registered under the requested name.
    #[error("unknown module: {name}")]
    UnknownModule {
        /// Requested module name.
        name: String,
    },

    /// The module rejected or failed the action.
    #[error(transparent)]
    Module(#[from] ModuleError),

    /// The module panicked while handling the action.
    #[error("module '{module}' failed unexpectedly while performing '{action}'")]
    ModulePanicked {
        /// Module name.
        module: String,
        /// Action name.
        action: String,
    },
}

impl DispatchError {
    /// Creates an invalid structure error.
    #[must_use]
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Creates an unknown module error.
    #[must_use]
    pub fn unknown_module(name: impl Into<String>) -> Self {
        Self::UnknownModule { name: name.into() }
    }

    /// Returns `true` when the request was rejected before reaching a module.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::NoData
                | Self::DataNotJson
                | Self::InvalidStructure { .. }
                | Self::EmptyField { .. }
                | Self::UnknownModule { .. }
        )
    }

    /// Diagnostic output captured from a failed module, if any.
    #[must_use]
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::Module(error) => error.diagnostics(),
            _ => None,
        }
    }
}
