//! Structured health reporting for agent lifecycle events.

use courier_config::Config;
use courier_modules::{LoadReport, ModuleRegistry};

use crate::bootstrap::AgentError;
use crate::transport::ConnectionError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked once the module registry has been built.
    fn modules_loaded(&self, registry: &ModuleRegistry, report: &LoadReport);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &AgentError);

    /// Invoked once the connector reports a live connection.
    fn connection_established(&self);

    /// Invoked when the connection ends without error.
    fn connection_closed(&self);

    /// Invoked when connecting or monitoring fails.
    fn connection_failed(&self, error: &ConnectionError);
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting agent bootstrap"
        );
    }

    fn modules_loaded(&self, registry: &ModuleRegistry, report: &LoadReport) {
        registry.log_loaded_modules();
        tracing::info!(
            target: HEALTH_TARGET,
            event = "modules_loaded",
            modules = registry.len(),
            external = report.loaded().len(),
            skipped = report.failures().len(),
            "module registry ready"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            modules_dir = %config.modules_dir().display(),
            action_timeout_secs = config.action_timeout().as_secs(),
            response_timeout_secs = config.response_timeout_secs(),
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            log_destination = %config.log_destination(),
            "agent bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &AgentError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "agent bootstrap failed"
        );
    }

    fn connection_established(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "connection_established",
            "connected; waiting for requests"
        );
    }

    fn connection_closed(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "connection_closed",
            "connection closed"
        );
    }

    fn connection_failed(&self, error: &ConnectionError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "connection_failed",
            error = %error,
            "connection failed"
        );
    }
}
