//! Agent entrypoint.
//!
//! Resolves configuration from flags and `COURIER_*` environment variables,
//! bootstraps the agent, and serves requests over the line transport on
//! stdin and stdout until input closes.

use std::io::{self, BufReader, Write};
use std::process::ExitCode;
use std::sync::Arc;

use courier_config::{Config, ConfigError};
use courierd::{AgentError, LineConnector, StaticConfigLoader, StructuredHealthReporter};

fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        // Prints help, version, or a usage error, then exits.
        Err(ConfigError::Cli(error)) => error.exit(),
        Err(error) => return report(&error),
    };

    let reporter = Arc::new(StructuredHealthReporter::new());
    let agent = match courierd::bootstrap_with(&StaticConfigLoader::new(config), reporter) {
        Ok(agent) => agent,
        // Telemetry is not running yet, so nothing else will show this.
        Err(error @ (AgentError::Configuration { .. } | AgentError::Telemetry { .. })) => {
            return report(&error);
        }
        Err(_) => return ExitCode::FAILURE,
    };

    let mut connector = LineConnector::new(BufReader::new(io::stdin()), io::stdout());
    match agent.start(&mut connector) {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

fn report(error: &dyn std::error::Error) -> ExitCode {
    writeln!(io::stderr().lock(), "courierd: {error}").ok();
    ExitCode::FAILURE
}
