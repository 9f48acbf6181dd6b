//! Request model and the external module wire contract.
//!
//! External modules talk to the agent over standard I/O using JSON:
//!
//! * **Discovery.** The executable is run with no arguments and a closed
//!   stdin. It must print one JSON [`ModuleDescription`] to stdout, for
//!   example `{"name":"pkg","actions":[{"name":"install"}]}`, and exit 0.
//! * **Invocation.** The executable is run with the action name as its only
//!   argument. Stdin receives one [`ActionInvocation`] line,
//!   `{"action":"install","params":{...}}`, followed by a newline and EOF.
//!   The executable prints one JSON object (the result) to stdout and exits
//!   0. Anything written to stderr is captured for logging only.
//!
//! A non-zero exit status always means failure, whatever was printed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// JSON object used for action parameters and results.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// A validated request routed to one module action.
///
/// # Example
///
/// ```
/// use courier_modules::{Payload, Request};
///
/// let mut params = Payload::new();
/// params.insert("msg".into(), "hi".into());
/// let request = Request::new("42", "controller", "echo", "echo").with_params(params);
/// assert_eq!(request.module(), "echo");
/// assert_eq!(request.params().get("msg"), Some(&serde_json::json!("hi")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    id: String,
    sender: String,
    module: String,
    action: String,
    #[serde(default)]
    params: Payload,
    #[serde(default)]
    debug: Vec<String>,
}

impl Request {
    /// Creates a request with empty params and no debug entries.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        sender: impl Into<String>,
        module: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            sender: sender.into(),
            module: module.into(),
            action: action.into(),
            params: Payload::new(),
            debug: Vec::new(),
        }
    }

    /// Sets the action parameters.
    #[must_use]
    pub fn with_params(mut self, params: Payload) -> Self {
        self.params = params;
        self
    }

    /// Sets the debug entries inherited from the inbound envelope.
    #[must_use]
    pub fn with_debug(mut self, debug: Vec<String>) -> Self {
        self.debug = debug;
        self
    }

    /// Correlation identifier of the inbound message.
    #[must_use]
    pub const fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Endpoint that sent the request.
    #[must_use]
    pub const fn sender(&self) -> &str {
        self.sender.as_str()
    }

    /// Target module name.
    #[must_use]
    pub const fn module(&self) -> &str {
        self.module.as_str()
    }

    /// Target action name.
    #[must_use]
    pub const fn action(&self) -> &str {
        self.action.as_str()
    }

    /// Action parameters; empty when the request carried none.
    #[must_use]
    pub const fn params(&self) -> &Payload {
        &self.params
    }

    /// Free-form debug entries carried by the inbound envelope.
    #[must_use]
    pub fn debug(&self) -> &[String] {
        &self.debug
    }
}

/// Declaration of one action a module supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl ActionSpec {
    /// Creates an action declaration without a description.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    /// Attaches a human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Action name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Actions of one module keyed by name.
pub type ActionTable = BTreeMap<String, ActionSpec>;

/// Self-description printed by an external module during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescription {
    name: String,
    actions: Vec<ActionSpec>,
}

impl ModuleDescription {
    /// Creates a description.
    #[must_use]
    pub fn new(name: impl Into<String>, actions: Vec<ActionSpec>) -> Self {
        Self {
            name: name.into(),
            actions,
        }
    }

    /// Declared module name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Declared actions in the order they were listed.
    #[must_use]
    pub fn actions(&self) -> &[ActionSpec] {
        &self.actions
    }

    /// Validates the description and converts it into its name and action
    /// table.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first violation: a blank module
    /// name, no actions, a blank action name, or a repeated action name.
    pub fn into_parts(self) -> Result<(String, ActionTable), String> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err(String::from("module name must not be empty"));
        }
        if self.actions.is_empty() {
            return Err(format!("module '{name}' declares no actions"));
        }

        let mut table = ActionTable::new();
        for action in self.actions {
            if action.name.trim().is_empty() {
                return Err(format!("module '{name}' declares an action with no name"));
            }
            if table.contains_key(&action.name) {
                return Err(format!(
                    "module '{name}' declares action '{}' more than once",
                    action.name
                ));
            }
            table.insert(action.name.clone(), action);
        }
        Ok((name, table))
    }
}

/// Input line written to an external module's stdin for one action call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActionInvocation<'a> {
    action: &'a str,
    params: &'a Payload,
}

impl<'a> ActionInvocation<'a> {
    /// Creates an invocation for the given action and parameters.
    #[must_use]
    pub const fn new(action: &'a str, params: &'a Payload) -> Self {
        Self { action, params }
    }

    /// Serialises the invocation as a single newline-terminated JSON line.
    ///
    /// # Errors
    ///
    /// Returns the serialisation error, which only occurs for parameter
    /// values `serde_json` cannot represent.
    pub fn to_line(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}
