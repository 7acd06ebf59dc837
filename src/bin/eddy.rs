/// Eddy CLI
///
/// Administrative commands for the effect runtime: benchmarks and configuration inspection.

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    if let Err(error) = eddy_core::cli::run_cli().await {
        eprintln!("Error: {:#}", error);
        std::process::exit(1);
    }
}
