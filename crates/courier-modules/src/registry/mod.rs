//! Module registry and loader.
//!
//! A [`ModuleRegistryBuilder`] collects internal modules and external
//! modules discovered on disk, then freezes into a [`ModuleRegistry`]. The
//! registry has no mutating methods: it is built once at startup and shared
//! read-only, so concurrent lookups need no locking. A future reload would
//! build a fresh registry and swap the `Arc`.
//!
//! Loading external modules is best-effort. Each file is loaded on its own;
//! a failure is logged, recorded in the [`LoadReport`], and the scan carries
//! on. When two modules share a name, the one registered later replaces the
//! earlier one. Directory entries are visited in file-name order so the
//! outcome is deterministic.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::error::ModuleError;
use crate::external::ExternalModule;
use crate::internal::builtin_modules;
use crate::module::Module;

/// Tracing target for registry operations.
const REGISTRY_TARGET: &str = "courier_modules::registry";

/// Immutable mapping from module name to handler.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use courier_modules::ModuleRegistry;
///
/// let mut builder = ModuleRegistry::builder(Duration::from_secs(30));
/// builder.load_internal();
/// let registry = builder.build();
/// assert!(registry.lookup("echo").is_some());
/// assert!(registry.lookup("nope").is_none());
/// ```
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn Module>>,
}

impl ModuleRegistry {
    /// Starts building a registry whose external modules use `action_timeout`.
    #[must_use]
    pub fn builder(action_timeout: Duration) -> ModuleRegistryBuilder {
        ModuleRegistryBuilder::new(action_timeout)
    }

    /// Looks up a module by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules.get(name).cloned()
    }

    /// Returns the registered module names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Iterates over the registered modules in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Module>> {
        self.modules.values()
    }

    /// Returns the number of registered modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` when no modules are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Logs one line per module listing its actions.
    pub fn log_loaded_modules(&self) {
        for name in self.names() {
            let Some(module) = self.modules.get(name) else {
                continue;
            };
            let actions: Vec<&str> = module.actions().keys().map(String::as_str).collect();
            info!(
                target: REGISTRY_TARGET,
                module = name,
                kind = %module.kind(),
                "loaded '{name}' module - {}",
                describe_actions(&actions)
            );
        }
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.names())
            .finish()
    }
}

fn describe_actions(actions: &[&str]) -> String {
    match actions {
        [] => String::from("found no action"),
        [single] => format!("action: {single}"),
        many => format!("actions: {}", many.join(", ")),
    }
}

/// A module successfully loaded from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModule {
    /// Declared module name.
    pub name: String,
    /// Executable the module was loaded from.
    pub path: PathBuf,
}

/// A file that could not be loaded as a module.
#[derive(Debug, Clone)]
pub struct LoadFailure {
    /// File that was skipped.
    pub path: PathBuf,
    /// Why loading failed.
    pub error: ModuleError,
}

/// Outcome of scanning one directory for external modules.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    loaded: Vec<LoadedModule>,
    failures: Vec<LoadFailure>,
}

impl LoadReport {
    /// Modules loaded, in load order.
    #[must_use]
    pub fn loaded(&self) -> &[LoadedModule] {
        &self.loaded
    }

    /// Files skipped because they failed to load, in scan order.
    #[must_use]
    pub fn failures(&self) -> &[LoadFailure] {
        &self.failures
    }

    /// Returns `true` when every scanned file loaded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Collects modules before freezing them into a [`ModuleRegistry`].
pub struct ModuleRegistryBuilder {
    modules: HashMap<String, Arc<dyn Module>>,
    action_timeout: Duration,
    started: Instant,
}

impl ModuleRegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new(action_timeout: Duration) -> Self {
        Self {
            modules: HashMap::new(),
            action_timeout,
            started: Instant::now(),
        }
    }

    /// Inserts a module, replacing and returning any module of the same name.
    pub fn insert(&mut self, module: Arc<dyn Module>) -> Option<Arc<dyn Module>> {
        let name = module.name().to_owned();
        let previous = self.modules.insert(name.clone(), module);
        if previous.is_some() {
            debug!(
                target: REGISTRY_TARGET,
                module = %name,
                "module replaced an earlier module of the same name"
            );
        }
        previous
    }

    /// Registers the built-in modules.
    pub fn load_internal(&mut self) -> &mut Self {
        for module in builtin_modules(self.started) {
            self.insert(module);
        }
        self
    }

    /// Loads every executable directly inside `dir` as an external module.
    ///
    /// Subdirectories are skipped. A missing or unreadable directory is
    /// logged and yields an empty report.
    pub fn load_external(&mut self, dir: &Path) -> LoadReport {
        info!(
            target: REGISTRY_TARGET,
            dir = %dir.display(),
            "loading external modules"
        );

        let mut report = LoadReport::default();
        let entries = match list_files(dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(
                    target: REGISTRY_TARGET,
                    dir = %dir.display(),
                    error = %err,
                    "failed to read the modules directory; external modules will not be loaded"
                );
                return report;
            }
        };

        for path in entries {
            match ExternalModule::load(&path, self.action_timeout) {
                Ok(module) => {
                    let name = module.name().to_owned();
                    self.insert(Arc::new(module));
                    report.loaded.push(LoadedModule { name, path });
                }
                Err(err) => {
                    error!(
                        target: REGISTRY_TARGET,
                        path = %path.display(),
                        error = %err,
                        "failed to load external module"
                    );
                    report.failures.push(LoadFailure { path, error: err });
                }
            }
        }
        report
    }

    /// Freezes the collected modules.
    #[must_use]
    pub fn build(self) -> ModuleRegistry {
        ModuleRegistry {
            modules: self.modules,
        }
    }
}

impl fmt::Debug for ModuleRegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ModuleRegistryBuilder")
            .field("modules", &names)
            .field("action_timeout", &self.action_timeout)
            .finish_non_exhaustive()
    }
}

/// Lists non-directory entries of `dir`, sorted by file name.
///
/// Only a failure to open `dir` is an error. Entries that cannot be read
/// are logged and skipped.
fn list_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)?.map(|entry| entry.map(|found| found.path()));
    Ok(keep_files(dir, entries))
}

fn keep_files(dir: &Path, entries: impl IntoIterator<Item = io::Result<PathBuf>>) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = entries
        .into_iter()
        .filter_map(|entry| match entry {
            // Follows symlinks, so a link to a directory is skipped too.
            Ok(path) if path.is_dir() => None,
            Ok(path) => Some(path),
            Err(err) => {
                warn!(
                    target: REGISTRY_TARGET,
                    dir = %dir.display(),
                    error = %err,
                    "skipping unreadable directory entry"
                );
                None
            }
        })
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    files
}

#[cfg(all(test, unix))]
mod tests;
