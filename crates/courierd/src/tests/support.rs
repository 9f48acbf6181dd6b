//! Fixtures for agent tests.

use std::fs;
use std::io::Cursor;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use courier_config::Config;
use mockall::mock;
use rstest::fixture;
use serde_json::Value;
use tempfile::TempDir;

use crate::bootstrap::AgentError;
use crate::health::HealthReporter;
use crate::transport::{ConnectionError, LineConnector};
use courier_modules::{LoadReport, ModuleRegistry};

// Serialises script creation with spawning; see `ETXTBSY`.
static SPAWN_LOCK: Mutex<()> = Mutex::new(());

mock! {
    pub(crate) Reporter {}
    impl HealthReporter for Reporter {
        fn bootstrap_starting(&self);
        fn modules_loaded(&self, registry: &ModuleRegistry, report: &LoadReport);
        fn bootstrap_succeeded(&self, config: &Config);
        fn bootstrap_failed(&self, error: &AgentError);
        fn connection_established(&self);
        fn connection_closed(&self);
        fn connection_failed(&self, error: &ConnectionError);
    }
}

/// Temporary modules directory that holds the spawn lock while alive.
pub(crate) struct ModulesDir {
    dir: TempDir,
    _guard: MutexGuard<'static, ()>,
}

impl ModulesDir {
    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes an executable module script named `file_name`.
    ///
    /// The script describes itself as `name` with the single action `action`
    /// and answers every invocation with `reply`.
    pub(crate) fn module(&self, file_name: &str, name: &str, action: &str, reply: &str) -> PathBuf {
        self.script(
            file_name,
            &format!(
                "if [ \"$#\" -eq 0 ]; then\n  \
                 printf '%s\\n' '{{\"name\":\"{name}\",\"actions\":[{{\"name\":\"{action}\"}}]}}'\n  \
                 exit 0\nfi\ncat >/dev/null\nprintf '%s\\n' '{reply}'"
            ),
        )
    }

    /// Writes an executable `/bin/sh` script with the given body.
    pub(crate) fn script(&self, file_name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(file_name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod script");
        path
    }

    /// Configuration pointing at this directory.
    pub(crate) fn config(&self) -> Config {
        Config::default().with_modules_dir(self.path())
    }
}

#[fixture]
pub(crate) fn modules_dir() -> ModulesDir {
    let guard = SPAWN_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    ModulesDir {
        dir: TempDir::new().expect("create temp dir"),
        _guard: guard,
    }
}

/// A reporter that accepts any lifecycle event.
pub(crate) fn permissive_reporter() -> MockReporter {
    let mut reporter = MockReporter::new();
    reporter.expect_bootstrap_starting().return_const(());
    reporter.expect_modules_loaded().return_const(());
    reporter.expect_bootstrap_succeeded().return_const(());
    reporter.expect_bootstrap_failed().return_const(());
    reporter.expect_connection_established().return_const(());
    reporter.expect_connection_closed().return_const(());
    reporter.expect_connection_failed().return_const(());
    reporter
}

pub(crate) type TestConnector = LineConnector<Cursor<Vec<u8>>, Vec<u8>>;

/// Builds a connector that will read `lines`, one envelope per entry.
pub(crate) fn line_connector(lines: &[Value]) -> TestConnector {
    let mut input = String::new();
    for line in lines {
        input.push_str(&line.to_string());
        input.push('\n');
    }
    LineConnector::new(Cursor::new(input.into_bytes()), Vec::new())
}

/// Parses every line the connector wrote.
pub(crate) fn responses(connector: TestConnector) -> Vec<Value> {
    let output = connector.into_writer().expect("writer");
    String::from_utf8(output)
        .expect("utf8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("response is JSON"))
        .collect()
}
