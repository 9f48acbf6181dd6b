//! Out-of-process modules backed by executables on disk.
//!
//! An [`ExternalModule`] is built by running its executable once to obtain a
//! [`ModuleDescription`]. Every action call then spawns the executable
//! afresh through [`run_with_deadline`]; nothing is shared between calls.
//! See [`crate::protocol`] for the exact stdin/stdout contract.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::ModuleError;
use crate::module::{Module, ModuleKind};
use crate::process::{ProcessError, ProcessOutput, run_with_deadline};
use crate::protocol::{ActionInvocation, ActionTable, ModuleDescription, Payload, Request};

/// Tracing target for external module operations.
const EXTERNAL_TARGET: &str = "courier_modules::external";

/// A module whose actions run in a subprocess.
#[derive(Debug, Clone)]
pub struct ExternalModule {
    name: String,
    path: PathBuf,
    actions: ActionTable,
    timeout: Duration,
}

impl ExternalModule {
    /// Loads `executable` by querying its self-description.
    ///
    /// `timeout` bounds the discovery call and every later action call.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::ModuleLoad`] when the file is not a regular
    /// executable, the discovery call fails, times out, exits non-zero, or
    /// prints nothing, or the printed description is malformed.
    pub fn load(executable: impl Into<PathBuf>, timeout: Duration) -> Result<Self, ModuleError> {
        let path: PathBuf = executable.into();
        ensure_executable(&path)?;

        debug!(
            target: EXTERNAL_TARGET,
            path = %path.display(),
            "querying external module description"
        );

        let output = run_with_deadline(Command::new(&path), None, timeout).map_err(|error| {
            match error {
                ProcessError::Spawn(source) => {
                    ModuleError::module_load_io(&path, "failed to run executable", source)
                }
                other => ModuleError::module_load(&path, other.to_string()),
            }
        })?;

        let description = parse_description(&path, &output)?;
        let (name, actions) = description
            .into_parts()
            .map_err(|message| ModuleError::module_load(&path, message))?;

        Ok(Self {
            name,
            path,
            actions,
            timeout,
        })
    }

    /// Path of the backing executable.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Upper bound on each action call.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    fn execute(&self, action: &str, request: &Request) -> Result<ProcessOutput, ModuleError> {
        let input = ActionInvocation::new(action, request.params())
            .to_line()
            .map_err(|error| {
                ModuleError::action_execution(
                    &self.name,
                    action,
                    format!("failed to serialise request: {error}"),
                    "",
                )
            })?;

        let mut command = Command::new(&self.path);
        command.arg(action);

        debug!(
            target: EXTERNAL_TARGET,
            module = %self.name,
            action,
            request_id = request.id(),
            executable = %self.path.display(),
            "spawning external module"
        );

        run_with_deadline(command, Some(input), self.timeout).map_err(|error| match error {
            ProcessError::TimedOut { timeout } => {
                warn!(
                    target: EXTERNAL_TARGET,
                    module = %self.name,
                    action,
                    request_id = request.id(),
                    "external module timed out"
                );
                ModuleError::action_timeout(&self.name, action, timeout)
            }
            other => ModuleError::action_execution(&self.name, action, other.to_string(), ""),
        })
    }
}

impl Module for ExternalModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::External
    }

    fn actions(&self) -> &ActionTable {
        &self.actions
    }

    fn perform_request(&self, action: &str, request: &Request) -> Result<Payload, ModuleError> {
        self.ensure_action(action)?;

        let output = self.execute(action, request)?;
        let stderr = output.stderr_lossy();

        if !output.success() {
            warn!(
                target: EXTERNAL_TARGET,
                module = %self.name,
                action,
                status = %output.status(),
                stderr = %stderr,
                "external module failed"
            );
            return Err(ModuleError::action_execution(
                &self.name,
                action,
                format!("executable exited with {}", output.status()),
                stderr,
            ));
        }

        if !stderr.is_empty() {
            debug!(
                target: EXTERNAL_TARGET,
                module = %self.name,
                action,
                stderr = %stderr,
                "external module stderr output"
            );
        }

        parse_result(output.stdout()).map_err(|message| {
            warn!(
                target: EXTERNAL_TARGET,
                module = %self.name,
                action,
                %message,
                "external module produced invalid output"
            );
            ModuleError::action_execution(&self.name, action, message, stderr)
        })
    }
}

fn ensure_executable(path: &Path) -> Result<(), ModuleError> {
    let metadata = fs::metadata(path)
        .map_err(|error| ModuleError::module_load_io(path, "failed to read metadata", error))?;
    if !metadata.is_file() {
        return Err(ModuleError::module_load(path, "not a regular file"));
    }
    if !is_executable(&metadata) {
        return Err(ModuleError::module_load(path, "file is not executable"));
    }
    Ok(())
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;

    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    true
}

fn parse_description(path: &Path, output: &ProcessOutput) -> Result<ModuleDescription, ModuleError> {
    if !output.success() {
        let stderr = output.stderr_lossy();
        let detail = if stderr.is_empty() {
            String::new()
        } else {
            format!(": {stderr}")
        };
        return Err(ModuleError::module_load(
            path,
            format!("description query exited with {}{detail}", output.status()),
        ));
    }

    let stdout = output.stdout().trim_ascii();
    if stdout.is_empty() {
        return Err(ModuleError::module_load(
            path,
            "description query produced no output",
        ));
    }

    serde_json::from_slice(stdout).map_err(|error| {
        ModuleError::module_load(path, format!("invalid module description: {error}"))
    })
}

fn parse_result(stdout: &[u8]) -> Result<Payload, String> {
    let trimmed = stdout.trim_ascii();
    if trimmed.is_empty() {
        return Err(String::from("executable produced no output"));
    }
    match serde_json::from_slice::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Object(result)) => Ok(result),
        Ok(_) => Err(String::from("executable output is not a JSON object")),
        Err(error) => Err(format!("executable produced invalid JSON: {error}")),
    }
}
