//! Process-wide initialization
//!
//! Hosts that want a single shared runtime call `initialize` (or `InitBuilder::init`) once at
//! startup and reach the runtime through `runtime()` afterwards. Code that prefers explicit
//! ownership can construct a `Runtime` directly and skip this module.
//!
//! # Example
//!
//! ```no_run
//! use eddy_core::init::InitBuilder;
//!
//! # fn main() -> anyhow::Result<()> {
//! let runtime = InitBuilder::new().yield_interval(5_000).init()?;
//! assert_eq!(runtime.config().interpreter.yield_interval, 5_000);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use anyhow::{anyhow, Context, Result};
use tracing::info;

use crate::config::Config;
use crate::interrupt::lock;
use crate::runtime::Runtime;

/// Global runtime instance
static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Serializes concurrent initialization attempts
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Options for initializing the global runtime
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Config file path (overrides default search)
    pub config_path: Option<String>,

    /// Yield interval (overrides config file and env vars)
    pub yield_interval: Option<u32>,
}

/// Builder for constructing InitOptions
#[derive(Debug, Default)]
pub struct InitBuilder {
    options: InitOptions,
}

impl InitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the config file path
    pub fn config_path(mut self, path: impl Into<String>) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    /// Set the interpreter yield interval
    pub fn yield_interval(mut self, interval: u32) -> Self {
        self.options.yield_interval = Some(interval);
        self
    }

    pub fn init(self) -> Result<&'static Runtime> {
        initialize(self.options)
    }
}

/// Load configuration and install the global runtime.
///
/// Calling this more than once is safe: later calls return the runtime installed first and
/// ignore their options.
pub fn initialize(options: InitOptions) -> Result<&'static Runtime> {
    let _guard = lock(&INIT_LOCK);

    if let Some(runtime) = RUNTIME.get() {
        return Ok(runtime);
    }

    let config = Config::builder()
        .config_path(options.config_path.map(PathBuf::from))
        .yield_interval(options.yield_interval)
        .build()
        .context("Failed to load configuration")?;

    info!(
        yield_interval = config.interpreter.yield_interval,
        "Runtime initialized"
    );

    Ok(RUNTIME.get_or_init(|| Runtime::new(config)))
}

/// Check whether the global runtime has been installed
pub fn is_initialized() -> bool {
    RUNTIME.get().is_some()
}

/// The global runtime
pub fn runtime() -> Result<&'static Runtime> {
    RUNTIME
        .get()
        .ok_or_else(|| anyhow!("Runtime not initialized. Call init::initialize() first."))
}
