//! Agent bootstrap orchestration.

use std::sync::Arc;

use courier_config::{Config, ConfigError};
use courier_modules::{LoadReport, ModuleRegistry};
use thiserror::Error;

use crate::dispatch::RequestDispatcher;
use crate::health::HealthReporter;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};
use crate::transport::{ConnectionError, Connector, REQUEST_SCHEMA};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the agent configuration.
    ///
    /// # Errors
    ///
    /// Returns the loader's [`ConfigError`] when configuration is invalid.
    fn load(&self) -> Result<Config, Arc<ConfigError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<ConfigError>> {
        Config::load().map_err(Arc::new)
    }
}

/// Loader that returns a configuration resolved earlier.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an already-resolved configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<ConfigError>> {
        self.config.validate().map_err(Arc::new)?;
        Ok(self.config.clone())
    }
}

/// Errors that stop the agent.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<ConfigError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The connector could not connect or lost its connection for good.
    #[error("connection failed: {source}")]
    Connection {
        /// Underlying transport error.
        #[source]
        source: ConnectionError,
    },
}

/// A bootstrapped agent, ready to be attached to a connector.
pub struct Agent {
    config: Config,
    dispatcher: Arc<RequestDispatcher>,
    load_report: LoadReport,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn HealthReporter>,
}

impl Agent {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Registry the agent routes requests to.
    #[must_use]
    pub fn registry(&self) -> &ModuleRegistry {
        self.dispatcher.registry()
    }

    /// Dispatcher handling inbound requests.
    #[must_use]
    pub fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    /// Outcome of loading external modules at startup.
    #[must_use]
    pub const fn load_report(&self) -> &LoadReport {
        &self.load_report
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Registers the dispatcher on `connector`, connects, and serves
    /// requests until the connection ends.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Connection`] when connecting fails or the
    /// connection is lost for good.
    pub fn start(&self, connector: &mut dyn Connector) -> Result<(), AgentError> {
        connector.register_callback(REQUEST_SCHEMA, Arc::clone(&self.dispatcher).into_callback());

        if let Err(source) = connector.connect() {
            self.reporter.connection_failed(&source);
            return Err(AgentError::Connection { source });
        }
        self.reporter.connection_established();

        if let Err(source) = connector.monitor_connection() {
            self.reporter.connection_failed(&source);
            return Err(AgentError::Connection { source });
        }
        self.reporter.connection_closed();
        Ok(())
    }
}

/// Bootstraps the agent using the supplied collaborators.
///
/// The sequence is: load configuration, initialise telemetry, register the
/// built-in modules, then load external modules from the configured
/// directory. External modules that fail to load are skipped; the agent
/// starts with whatever loaded.
///
/// # Errors
///
/// Returns [`AgentError::Configuration`] or [`AgentError::Telemetry`] when
/// the corresponding step fails.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<Agent, AgentError> {
    reporter.bootstrap_starting();

    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            let error = AgentError::Configuration { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let telemetry = match telemetry::initialise(&config) {
        Ok(handle) => handle,
        Err(source) => {
            let error = AgentError::Telemetry { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let mut builder = ModuleRegistry::builder(config.action_timeout());
    builder.load_internal();
    let load_report = builder.load_external(&config.modules_dir());
    let registry = builder.build();
    reporter.modules_loaded(&registry, &load_report);

    let dispatcher = Arc::new(RequestDispatcher::new(
        Arc::new(registry),
        config.response_timeout_secs(),
    ));
    reporter.bootstrap_succeeded(&config);

    Ok(Agent {
        config,
        dispatcher,
        load_report,
        telemetry,
        reporter,
    })
}
