use crate::error::ModuleError;
use crate::module::{Module, ModuleKind, action_table};
use crate::protocol::{ActionSpec, ActionTable, Payload, Request};

/// Returns the request parameters unchanged.
#[derive(Debug, Clone)]
pub struct Echo {
    actions: ActionTable,
}

impl Echo {
    /// Creates the module.
    #[must_use]
    pub fn new() -> Self {
        Self {
            actions: action_table([
                ActionSpec::new("echo").with_description("Returns the request parameters")
            ]),
        }
    }
}

impl Default for Echo {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Internal
    }

    fn actions(&self) -> &ActionTable {
        &self.actions
    }

    fn perform_request(&self, action: &str, request: &Request) -> Result<Payload, ModuleError> {
        self.ensure_action(action)?;
        Ok(request.params().clone())
    }
}
