use std::env::consts;

use serde_json::Value;

use crate::error::ModuleError;
use crate::module::{Module, ModuleKind, action_table};
use crate::protocol::{ActionSpec, ActionTable, Payload, Request};

use super::AGENT_VERSION;

/// Reports static facts about the host and the agent build.
#[derive(Debug, Clone)]
pub struct Inventory {
    actions: ActionTable,
}

impl Inventory {
    /// Creates the module.
    #[must_use]
    pub fn new() -> Self {
        Self {
            actions: action_table([ActionSpec::new("inventory")
                .with_description("Lists operating system and agent facts")]),
        }
    }
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for Inventory {
    fn name(&self) -> &str {
        "inventory"
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Internal
    }

    fn actions(&self) -> &ActionTable {
        &self.actions
    }

    fn perform_request(&self, action: &str, _request: &Request) -> Result<Payload, ModuleError> {
        self.ensure_action(action)?;
        let mut facts = Payload::new();
        facts.insert("os".to_owned(), Value::from(consts::OS));
        facts.insert("family".to_owned(), Value::from(consts::FAMILY));
        facts.insert("arch".to_owned(), Value::from(consts::ARCH));
        facts.insert("agent_version".to_owned(), Value::from(AGENT_VERSION));
        Ok(facts)
    }
}
