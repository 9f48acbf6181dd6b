//! Log output settings.
//!
//! Standard output belongs to the line transport, so log records never go
//! there. They are written to stderr or appended to a configured file.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How each log record is rendered.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event with the event fields at the top level.
    #[default]
    Json,
    /// One human-readable line per event.
    Compact,
}

/// Where log records are written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LogDestination {
    /// The agent's standard error stream.
    #[default]
    Stderr,
    /// A file opened for appending, created when missing.
    File(PathBuf),
}

impl LogDestination {
    /// Picks a file destination when `log_file` is set, stderr otherwise.
    #[must_use]
    pub fn from_log_file(log_file: Option<&Path>) -> Self {
        log_file.map_or(Self::Stderr, |path| Self::File(path.to_path_buf()))
    }
}

impl fmt::Display for LogDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stderr => f.write_str("stderr"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}
