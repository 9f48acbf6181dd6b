use serde_json::Value;

use crate::error::ModuleError;
use crate::module::{Module, ModuleKind, action_table};
use crate::protocol::{ActionSpec, ActionTable, Payload, Request};

/// Liveness check.
///
/// Replies with a constant status plus the debug entries the request picked
/// up on its way through the broker, which lets a requester trace the hops.
#[derive(Debug, Clone)]
pub struct Ping {
    actions: ActionTable,
}

impl Ping {
    /// Creates the module.
    #[must_use]
    pub fn new() -> Self {
        Self {
            actions: action_table([
                ActionSpec::new("ping").with_description("Reports that the agent is alive")
            ]),
        }
    }
}

impl Default for Ping {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for Ping {
    fn name(&self) -> &str {
        "ping"
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Internal
    }

    fn actions(&self) -> &ActionTable {
        &self.actions
    }

    fn perform_request(&self, action: &str, request: &Request) -> Result<Payload, ModuleError> {
        self.ensure_action(action)?;
        let hops = request
            .debug()
            .iter()
            .map(|entry| Value::String(entry.clone()))
            .collect();

        let mut result = Payload::new();
        result.insert("status".to_owned(), Value::from("ok"));
        result.insert("request_hops".to_owned(), Value::Array(hops));
        Ok(result)
    }
}
