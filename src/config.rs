//! Configuration loading
//!
//! Sources, lowest to highest priority:
//! 1. Built-in defaults
//! 2. Config file (explicit path, `EDDY_CONFIG_PATH`, or `eddy.{toml,yaml,json}` if present)
//! 3. Environment variables (`EDDY_INTERPRETER__YIELD_INTERVAL`, `EDDY_LOGGING__FILTER`)
//! 4. Builder overrides

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use ::config::{Environment, File};
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "EDDY";
const CONFIG_PATH_VAR: &str = "EDDY_CONFIG_PATH";
const DEFAULT_CONFIG_NAME: &str = "eddy";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub interpreter: InterpreterConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpreterConfig {
    /// Nodes processed between voluntary yields to the scheduler
    #[serde(default = "default_yield_interval")]
    pub yield_interval: u32,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            yield_interval: default_yield_interval(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_yield_interval() -> u32 {
    10_000
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load from file and environment without overrides
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    pub fn validate(&self) -> Result<()> {
        if self.interpreter.yield_interval == 0 {
            return Err(anyhow!("interpreter.yield_interval must be greater than 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    yield_interval: Option<u32>,
    log_filter: Option<String>,
}

impl ConfigBuilder {
    /// Config file to read instead of the default search
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn yield_interval(mut self, interval: Option<u32>) -> Self {
        self.yield_interval = interval;
        self
    }

    pub fn log_filter(mut self, filter: Option<String>) -> Self {
        self.log_filter = filter;
        self
    }

    pub fn build(self) -> Result<Config> {
        let mut builder = ::config::Config::builder();

        let explicit = self
            .config_path
            .or_else(|| std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from));
        builder = match &explicit {
            Some(path) => builder.add_source(File::from(path.as_path())),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_NAME).required(false)),
        };

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(interval) = self.yield_interval {
            builder = builder.set_override("interpreter.yield_interval", i64::from(interval))?;
        }
        if let Some(filter) = self.log_filter {
            builder = builder.set_override("logging.filter", filter)?;
        }

        let config: Config = builder
            .build()
            .and_then(|settings| settings.try_deserialize())
            .with_context(|| match &explicit {
                Some(path) => format!("Failed to load configuration from {}", path.display()),
                None => "Failed to load configuration".to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }
}
