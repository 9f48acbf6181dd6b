//! Structured telemetry for the agent.
//!
//! Standard output carries response lines, so events are written to stderr
//! or appended to the configured log file (see [`LogDestination`]). The
//! subscriber is process-global and installed at most once.

use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use courier_config::{Config, LogDestination, LogFormat};
use once_cell::sync::OnceCell;
use tracing::Subscriber;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, time::UtcTime, writer::BoxMakeWriter};

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Proof that telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured log filter expression did not parse.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// The log file could not be opened for appending.
    #[error("failed to open log file {}: {source}", path.display())]
    LogFile {
        /// Configured log file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
    /// Another global subscriber was already installed.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global tracing subscriber on first use.
///
/// Later calls return a fresh [`TelemetryHandle`] without touching global
/// state, so the configuration of the first call wins.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid, the log file
/// cannot be opened, or a foreign subscriber is already installed.
///
/// # Examples
///
/// ```rust
/// use courier_config::Config;
/// use courierd::telemetry;
///
/// # fn main() -> Result<(), courierd::telemetry::TelemetryError> {
/// let config = Config::default();
/// let first = telemetry::initialise(&config)?;
/// let second = telemetry::initialise(&config)?;
/// drop((first, second));
/// # Ok(())
/// # }
/// ```
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    INSTALLED
        .get_or_try_init(|| install_subscriber(config))
        .map(|()| TelemetryHandle)
}

fn install_subscriber(config: &Config) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(config.log_filter())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;
    let (writer, ansi) = open_writer(&config.log_destination())?;

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_ansi(ansi)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(writer);

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

/// Returns the event writer for `destination` and whether it takes colour.
fn open_writer(destination: &LogDestination) -> Result<(BoxMakeWriter, bool), TelemetryError> {
    match destination {
        LogDestination::Stderr => Ok((
            BoxMakeWriter::new(io::stderr),
            io::stderr().is_terminal(),
        )),
        LogDestination::File(path) => {
            let file = open_log_file(path)?;
            Ok((BoxMakeWriter::new(Arc::new(file)), false))
        }
    }
}

fn open_log_file(path: &Path) -> Result<File, TelemetryError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| TelemetryError::LogFile {
            path: path.to_path_buf(),
            source: Arc::new(source),
        })
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write;

    use super::*;

    #[test]
    fn rejects_invalid_filter_without_installing() {
        let config = Config::load_from_iter(["courierd", "--log-filter", "courierd=notalevel"])
            .expect("config parses");
        let error = install_subscriber(&config).expect_err("filter must be rejected");
        assert!(matches!(error, TelemetryError::Filter(_)));
    }

    #[test]
    fn log_file_is_appended_without_colour() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("courierd.log");
        fs::write(&path, "earlier run\n").expect("seed log");

        let (_writer, ansi) =
            open_writer(&LogDestination::File(path.clone())).expect("log file opens");
        assert!(!ansi);

        let mut file = open_log_file(&path).expect("log file reopens");
        writeln!(file, "this run").expect("append");
        assert_eq!(
            fs::read_to_string(&path).expect("read log"),
            "earlier run\nthis run\n"
        );
    }

    #[test]
    fn unopenable_log_file_is_reported_with_its_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let error = open_log_file(dir.path()).expect_err("a directory cannot be a log file");
        assert!(
            matches!(&error, TelemetryError::LogFile { path, .. } if path == dir.path()),
            "unexpected error: {error}"
        );
    }

    #[test]
    fn repeated_initialisation_is_idempotent() {
        let config = Config::default();
        initialise(&config).expect("first call");
        initialise(&config).expect("second call");
    }
}
