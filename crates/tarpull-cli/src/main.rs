mod commands;

use clap::Parser;
use commands::{exit_code, ClientOverrides};
use std::path::PathBuf;
use std::process::ExitCode;
use tarpull_core::{install_signal_handler, BundleOptions};
use tarpull_schema::Platform;

#[derive(Debug, Parser)]
#[command(
    name = "tarpull",
    version,
    about = "Pull images from a registry into one docker-loadable archive"
)]
struct Cli {
    /// Registry host (e.g. registry-1.docker.io) or base URL.
    registry: String,

    /// File with one `repository:tag` per line.
    image_list: PathBuf,

    /// Archive to write; replaced only when the pull succeeds.
    output: PathBuf,

    /// Platform to select from manifest lists, as os/arch[/variant].
    #[arg(long, default_value = "linux/amd64")]
    platform: Platform,

    /// Blobs to download concurrently per image.
    #[arg(short, long, default_value_t = 1)]
    jobs: usize,

    /// Record failing images and continue with the rest.
    #[arg(long, default_value_t = false)]
    keep_going: bool,

    /// Write every blob occurrence, even when the digest is already in the archive.
    #[arg(long, default_value_t = false)]
    no_dedup: bool,

    /// Skip blob digest verification.
    #[arg(long, default_value_t = false)]
    no_verify: bool,

    /// Talk to the registry over http:// instead of https://.
    #[arg(long, default_value_t = false)]
    plain_http: bool,

    /// Bearer token sent with every request.
    #[arg(long)]
    token: Option<String>,

    /// Client config file (default: ~/.config/tarpull/config.json).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overall timeout per request, in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Output the run summary as structured JSON.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false)]
    trace: bool,
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("TARPULL_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    install_signal_handler();

    let overrides = ClientOverrides {
        config_path: cli.config.as_deref(),
        plain_http: cli.plain_http,
        token: cli.token.as_deref(),
        timeout_secs: cli.timeout,
    };
    let options = BundleOptions {
        platform: cli.platform,
        jobs: cli.jobs,
        keep_going: cli.keep_going,
        dedup: !cli.no_dedup,
        verify_digests: !cli.no_verify,
    };

    match commands::pull::run(
        &cli.registry,
        &cli.image_list,
        &cli.output,
        &overrides,
        options,
        cli.json,
    ) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(exit_code(&e))
        }
    }
}
