//! Shared configuration for the Courier agent.
//!
//! Configuration is layered: built-in defaults are overridden by `COURIER_*`
//! environment variables, which are in turn overridden by command-line
//! flags. [`Config::load`] parses the process arguments and validates the
//! result; any failure is a startup-time configuration error and is fatal to
//! the agent.

mod defaults;
mod logging;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

pub use defaults::{
    DEFAULT_ACTION_TIMEOUT_SECS, DEFAULT_LOG_FILTER, DEFAULT_RESPONSE_TIMEOUT_SECS,
    MODULES_DIR_NAME, default_log_format, default_modules_dir,
};
pub use logging::{LogDestination, LogFormat};

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Command-line or environment input could not be parsed.
    #[error(transparent)]
    Cli(#[from] clap::Error),

    /// A timeout was configured as zero.
    #[error("{field} must be greater than zero")]
    ZeroTimeout {
        /// Name of the offending setting.
        field: &'static str,
    },

    /// The log filter expression was blank.
    #[error("log filter must not be empty")]
    EmptyLogFilter,

    /// The configured log file names a directory.
    #[error("log file {} is a directory", path.display())]
    LogFileIsDirectory {
        /// Configured log file path.
        path: PathBuf,
    },
}

/// Resolved agent configuration.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(
    name = "courierd",
    version,
    about = "Message-driven automation agent that routes requests to action modules"
)]
pub struct Config {
    /// Directory scanned for external module executables.
    #[arg(long, env = "COURIER_MODULES_DIR", value_name = "DIR")]
    modules_dir: Option<PathBuf>,

    /// Upper bound, in seconds, on each external module invocation.
    #[arg(
        long,
        env = "COURIER_ACTION_TIMEOUT_SECS",
        value_name = "SECS",
        default_value_t = DEFAULT_ACTION_TIMEOUT_SECS
    )]
    action_timeout_secs: u64,

    /// Delivery timeout, in seconds, attached to outbound responses.
    #[arg(
        long,
        env = "COURIER_RESPONSE_TIMEOUT_SECS",
        value_name = "SECS",
        default_value_t = DEFAULT_RESPONSE_TIMEOUT_SECS
    )]
    response_timeout_secs: u64,

    /// Tracing filter expression, for example `info,courierd=debug`.
    #[arg(
        long,
        env = "COURIER_LOG_FILTER",
        value_name = "FILTER",
        default_value = DEFAULT_LOG_FILTER
    )]
    log_filter: String,

    /// Log output format (`json` or `compact`).
    #[arg(
        long,
        env = "COURIER_LOG_FORMAT",
        value_name = "FORMAT",
        default_value_t = default_log_format()
    )]
    log_format: LogFormat,

    /// Append logs to this file instead of writing them to stderr.
    #[arg(long, env = "COURIER_LOG_FILE", value_name = "FILE")]
    log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            modules_dir: None,
            action_timeout_secs: DEFAULT_ACTION_TIMEOUT_SECS,
            response_timeout_secs: DEFAULT_RESPONSE_TIMEOUT_SECS,
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
            log_format: default_log_format(),
            log_file: None,
        }
    }
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_iter(std::env::args_os())
    }

    /// Loads configuration from an explicit argument list.
    ///
    /// The first item is treated as the binary name, matching
    /// [`std::env::args_os`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let config = Self::try_parse_from(args)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants clap cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroTimeout`] for a zero timeout,
    /// [`ConfigError::EmptyLogFilter`] for a blank filter, and
    /// [`ConfigError::LogFileIsDirectory`] when the log file is a directory.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.action_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout {
                field: "action_timeout_secs",
            });
        }
        if self.response_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout {
                field: "response_timeout_secs",
            });
        }
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::EmptyLogFilter);
        }
        if let Some(path) = self.log_file.as_deref().filter(|file| file.is_dir()) {
            return Err(ConfigError::LogFileIsDirectory {
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }

    /// Overrides the external modules directory.
    #[must_use]
    pub fn with_modules_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.modules_dir = Some(dir.into());
        self
    }

    /// Sends logs to `path` instead of stderr.
    #[must_use]
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Overrides the external action timeout.
    #[must_use]
    pub const fn with_action_timeout_secs(mut self, secs: u64) -> Self {
        self.action_timeout_secs = secs;
        self
    }

    /// Directory scanned for external modules.
    ///
    /// Falls back to [`default_modules_dir`] when none was configured.
    #[must_use]
    pub fn modules_dir(&self) -> PathBuf {
        self.modules_dir
            .clone()
            .unwrap_or_else(default_modules_dir)
    }

    /// Explicitly configured modules directory, if any.
    #[must_use]
    pub fn configured_modules_dir(&self) -> Option<&Path> {
        self.modules_dir.as_deref()
    }

    /// Upper bound on a single external module invocation.
    #[must_use]
    pub const fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs)
    }

    /// Delivery timeout attached to outbound responses, in seconds.
    #[must_use]
    pub const fn response_timeout_secs(&self) -> u64 {
        self.response_timeout_secs
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Where log records are written.
    #[must_use]
    pub fn log_destination(&self) -> LogDestination {
        LogDestination::from_log_file(self.log_file.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn load(args: &[&str]) -> Result<Config, ConfigError> {
        Config::load_from_iter(std::iter::once("courierd").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_apply_without_flags() {
        let config = load(&[]).expect("defaults load");
        assert_eq!(config.action_timeout(), Duration::from_secs(30));
        assert_eq!(config.response_timeout_secs(), 10);
        assert_eq!(config.log_filter(), "info");
        assert_eq!(config.log_format(), LogFormat::Json);
        assert!(config.configured_modules_dir().is_none());
        assert_eq!(config.log_destination(), LogDestination::Stderr);
    }

    #[test]
    fn flags_override_defaults() {
        let config = load(&[
            "--modules-dir",
            "/opt/courier/modules",
            "--action-timeout-secs",
            "5",
            "--log-format",
            "COMPACT",
            "--log-filter",
            "debug",
        ])
        .expect("flags load");
        assert_eq!(config.modules_dir(), PathBuf::from("/opt/courier/modules"));
        assert_eq!(config.action_timeout(), Duration::from_secs(5));
        assert_eq!(config.log_format(), LogFormat::Compact);
        assert_eq!(config.log_filter(), "debug");
    }

    #[rstest]
    #[case::action(&["--action-timeout-secs", "0"], "action_timeout_secs")]
    #[case::response(&["--response-timeout-secs", "0"], "response_timeout_secs")]
    fn zero_timeouts_are_rejected(#[case] args: &[&str], #[case] field: &str) {
        let error = load(args).expect_err("zero timeout must fail");
        assert!(
            matches!(error, ConfigError::ZeroTimeout { field: f } if f == field),
            "unexpected error: {error}"
        );
    }

    #[test]
    fn blank_log_filter_is_rejected() {
        let error = load(&["--log-filter", "  "]).expect_err("blank filter must fail");
        assert!(matches!(error, ConfigError::EmptyLogFilter));
    }

    #[test]
    fn unknown_log_format_is_a_cli_error() {
        let error = load(&["--log-format", "yaml"]).expect_err("bad format must fail");
        assert!(matches!(error, ConfigError::Cli(_)));
    }

    #[test]
    fn log_file_flag_selects_a_file_destination() {
        let config = load(&["--log-file", "/tmp/courierd.log"]).expect("flags load");
        assert_eq!(
            config.log_destination(),
            LogDestination::File(PathBuf::from("/tmp/courierd.log"))
        );
    }

    #[test]
    fn directory_log_file_is_rejected() {
        let dir = std::env::temp_dir();
        let error = Config::default()
            .with_log_file(&dir)
            .validate()
            .expect_err("directory must be rejected");
        assert!(matches!(error, ConfigError::LogFileIsDirectory { path } if path == dir));
    }

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().expect("default config validates");
    }
}
