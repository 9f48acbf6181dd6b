//! Domain errors raised by module loading and action execution.
//!
//! All errors use a `thiserror`-derived enum with structured context so the
//! dispatcher can log them precisely while still reducing each one to a
//! single human-readable message for the requester. I/O errors are wrapped
//! in `Arc` to keep the type cheap to clone and within the
//! `result_large_err` budget.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Errors arising from module loading and action execution.
#[derive(Debug, Clone, Error)]
pub enum ModuleError {
    /// An external module could not be loaded from disk.
    #[error("failed to load module from '{}': {message}", path.display())]
    ModuleLoad {
        /// Path of the executable that was being loaded.
        path: PathBuf,
        /// Human-readable failure description.
        message: String,
        /// Optional underlying I/O error.
        #[source]
        source: Option<Arc<std::io::Error>>,
    },

    /// The module does not declare the requested action.
    #[error("unknown action '{action}' for module '{module}'")]
    ActionNotFound {
        /// Module name.
        module: String,
        /// Action name that was requested.
        action: String,
    },

    /// The action did not complete within its deadline.
    #[error("action '{action}' of module '{module}' timed out after {timeout:?}")]
    ActionTimeout {
        /// Module name.
        module: String,
        /// Action name.
        action: String,
        /// Deadline that was exceeded.
        timeout: Duration,
    },

    /// The action ran but failed or produced unusable output.
    #[error("action '{action}' of module '{module}' failed: {message}")]
    ActionExecution {
        /// Module name.
        module: String,
        /// Action name.
        action: String,
        /// Description of the failure.
        message: String,
        /// Diagnostics captured from the handler's standard error.
        stderr: String,
    },
}

impl ModuleError {
    /// Creates a load error without an underlying I/O cause.
    #[must_use]
    pub fn module_load(path: &Path, message: impl Into<String>) -> Self {
        Self::ModuleLoad {
            path: path.to_path_buf(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a load error caused by an I/O failure.
    #[must_use]
    pub fn module_load_io(path: &Path, message: impl Into<String>, source: std::io::Error) -> Self {
        Self::ModuleLoad {
            path: path.to_path_buf(),
            message: message.into(),
            source: Some(Arc::new(source)),
        }
    }

    /// Creates an unknown action error.
    #[must_use]
    pub fn action_not_found(module: impl Into<String>, action: impl Into<String>) -> Self {
        Self::ActionNotFound {
            module: module.into(),
            action: action.into(),
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn action_timeout(
        module: impl Into<String>,
        action: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self::ActionTimeout {
            module: module.into(),
            action: action.into(),
            timeout,
        }
    }

    /// Creates an execution error carrying captured diagnostics.
    #[must_use]
    pub fn action_execution(
        module: impl Into<String>,
        action: impl Into<String>,
        message: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::ActionExecution {
            module: module.into(),
            action: action.into(),
            message: message.into(),
            stderr: stderr.into(),
        }
    }

    /// Returns captured handler diagnostics, if this error carries any.
    #[must_use]
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::ActionExecution { stderr, .. } if !stderr.is_empty() => Some(stderr.as_str()),
            _ => None,
        }
    }
}
