//! Fixtures for tests that spawn shell-script modules.
//!
//! Writing an executable while another test thread forks can leave the file
//! open in the forked child, making `exec` fail with `ETXTBSY`. Every
//! [`ScriptDir`] therefore holds a process-wide lock for its lifetime so
//! script creation and spawning never interleave across tests.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;
use rstest::fixture;
use tempfile::TempDir;

static SPAWN_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Temporary directory of executable scripts, holding the spawn lock.
pub(crate) struct ScriptDir {
    dir: TempDir,
    _guard: MutexGuard<'static, ()>,
}

impl ScriptDir {
    pub(crate) fn new() -> Self {
        let guard = SPAWN_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        Self {
            dir: TempDir::new().expect("create temp dir"),
            _guard: guard,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes an executable `/bin/sh` script with the given body.
    pub(crate) fn script(&self, file_name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(file_name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod script");
        path
    }

    /// Writes a module script that describes itself as `name` with the given
    /// actions and runs `action_body` when invoked with an action argument.
    pub(crate) fn module(
        &self,
        file_name: &str,
        name: &str,
        actions: &[&str],
        action_body: &str,
    ) -> PathBuf {
        let description = describe(name, actions);
        self.script(
            file_name,
            &format!(
                "if [ \"$#\" -eq 0 ]; then\n  printf '%s\\n' '{description}'\n  exit 0\nfi\n{action_body}"
            ),
        )
    }
}

/// Renders a discovery description as compact JSON.
pub(crate) fn describe(name: &str, actions: &[&str]) -> String {
    let specs: Vec<serde_json::Value> = actions
        .iter()
        .map(|action| serde_json::json!({ "name": action }))
        .collect();
    serde_json::json!({ "name": name, "actions": specs }).to_string()
}

#[fixture]
pub(crate) fn scripts() -> ScriptDir {
    ScriptDir::new()
}
