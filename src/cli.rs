use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::benchmark::{display_report, run_benchmark, BenchmarkParams};
use crate::config::Config;
use crate::runtime::Runtime;

#[derive(Parser)]
#[command(name = "eddy")]
#[command(about = "Eddy - an interruptible effect runtime", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Nodes between scheduler yields (overrides config file and env vars)
    #[arg(long, global = true)]
    pub yield_interval: Option<u32>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Time a long synchronous chain and a latency-bound concurrent group
    Bench {
        /// Length of the synchronous chain
        #[arg(long, default_value = "100000")]
        steps: usize,

        /// Branches per concurrent group
        #[arg(long, default_value = "100")]
        branches: usize,

        /// Milliseconds of simulated latency per branch
        #[arg(long, default_value = "10")]
        latency_ms: u64,

        /// Number of concurrent groups to time
        #[arg(long, default_value = "10")]
        rounds: usize,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments (for embedders that need to filter args)
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

/// Internal function that handles CLI commands
pub async fn run_cli_with_args(cli: Cli) -> Result<()> {
    // Load and validate configuration before any command runs
    let config = Config::builder()
        .config_path(cli.config.map(PathBuf::from))
        .yield_interval(cli.yield_interval)
        .build()?;

    init_tracing(&config.logging.filter);

    match cli.command {
        Commands::Bench {
            steps,
            branches,
            latency_ms,
            rounds,
            json,
        } => {
            let runtime = Runtime::new(config);
            let params = BenchmarkParams {
                steps,
                branches,
                latency_ms,
                rounds,
            };

            if !json {
                println!("🚀 Starting Eddy Benchmark");
                println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            }

            let report = run_benchmark(&runtime, params).await?;
            runtime.drain().await;

            if json {
                let rendered =
                    serde_json::to_string_pretty(&report).context("Failed to render report")?;
                println!("{}", rendered);
            } else {
                display_report(&report);
            }
        }

        Commands::Config => {
            let rendered = toml::to_string_pretty(&config).context("Failed to render config")?;
            print!("{}", rendered);
        }
    }

    Ok(())
}

/// Install the stderr subscriber. `RUST_LOG` wins over the configured filter.
fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    // Already installed when embedded in a host that set up tracing itself
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
