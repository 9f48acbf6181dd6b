use std::env;
use std::path::PathBuf;

/// Default log filter expression used by the agent.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default upper bound, in seconds, on a single external module invocation.
pub const DEFAULT_ACTION_TIMEOUT_SECS: u64 = 30;

/// Default delivery timeout, in seconds, attached to outbound responses.
pub const DEFAULT_RESPONSE_TIMEOUT_SECS: u64 = 10;

/// Name of the directory holding external module executables.
pub const MODULES_DIR_NAME: &str = "modules";

/// Default logging format for the agent.
#[must_use]
pub const fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Computes the default external modules directory.
///
/// The agent is expected to be installed as `<prefix>/bin/courierd`, with
/// external modules living under `<prefix>/modules`. When the executable path
/// cannot be resolved the per-user data directory is used instead.
#[must_use]
pub fn default_modules_dir() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.canonicalize().ok())
        .and_then(|exe| {
            exe.parent()
                .and_then(|bin| bin.parent())
                .map(|prefix| prefix.join(MODULES_DIR_NAME))
        })
        .unwrap_or_else(fallback_modules_dir)
}

fn fallback_modules_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("courier").join(MODULES_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(MODULES_DIR_NAME))
}
