use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tarpull_server::Store;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "tarpull-server", about = "Read-only reference registry for tarpull")]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value_t = 5000)]
    port: u16,

    /// Directory holding `blobs/` and `repositories/`.
    #[arg(long, default_value = "./tarpull-registry-data")]
    data_dir: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("TARPULL_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = std::fs::create_dir_all(&cli.data_dir) {
        error!("cannot create {}: {e}", cli.data_dir.display());
        return ExitCode::FAILURE;
    }

    let addr = format!("0.0.0.0:{}", cli.port);
    info!("starting tarpull-server on {addr}");
    info!("data directory: {}", cli.data_dir.display());

    let store = Arc::new(Store::new(cli.data_dir));
    match tarpull_server::run_server(&store, &addr) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("cannot listen on {addr}: {e}");
            ExitCode::FAILURE
        }
    }
}
