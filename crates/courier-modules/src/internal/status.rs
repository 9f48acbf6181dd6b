use std::time::Instant;

use serde_json::Value;

use crate::error::ModuleError;
use crate::module::{Module, ModuleKind, action_table};
use crate::protocol::{ActionSpec, ActionTable, Payload, Request};

use super::AGENT_VERSION;

/// Reports the agent's own runtime status.
#[derive(Debug, Clone)]
pub struct Status {
    actions: ActionTable,
    started: Instant,
}

impl Status {
    /// Creates the module; `started` marks the agent start time.
    #[must_use]
    pub fn new(started: Instant) -> Self {
        Self {
            actions: action_table([ActionSpec::new("query")
                .with_description("Reports process id, uptime and agent version")]),
            started,
        }
    }
}

impl Module for Status {
    fn name(&self) -> &str {
        "status"
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Internal
    }

    fn actions(&self) -> &ActionTable {
        &self.actions
    }

    fn perform_request(&self, action: &str, _request: &Request) -> Result<Payload, ModuleError> {
        self.ensure_action(action)?;
        let mut result = Payload::new();
        result.insert("status".to_owned(), Value::from("running"));
        result.insert("pid".to_owned(), Value::from(std::process::id()));
        result.insert(
            "uptime_secs".to_owned(),
            Value::from(self.started.elapsed().as_secs()),
        );
        result.insert("agent_version".to_owned(), Value::from(AGENT_VERSION));
        Ok(result)
    }
}
