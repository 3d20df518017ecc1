pub mod pull;

use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tarpull_archive::ArchiveError;
use tarpull_core::{CoreError, ImageStatus};
use tarpull_registry::{ClientConfig, RegistryError};

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_INPUT_ERROR: u8 = 2;
pub const EXIT_REGISTRY_ERROR: u8 = 3;
pub const EXIT_ARCHIVE_ERROR: u8 = 4;
pub const EXIT_INTERRUPTED: u8 = 130;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

fn plain_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner())
}

pub fn spinner(msg: &str) -> ProgressBar {
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    let pb = ProgressBar::new_spinner();
    pb.set_style(style);
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(plain_style());
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(plain_style());
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_status(status: ImageStatus) -> String {
    use console::Style;
    match status {
        ImageStatus::Ok => Style::new().green().apply_to("ok").to_string(),
        ImageStatus::Failed => Style::new().red().bold().apply_to("failed").to_string(),
    }
}

/// Connection overrides given on the command line.
#[derive(Debug, Default)]
pub struct ClientOverrides<'a> {
    pub config_path: Option<&'a Path>,
    pub plain_http: bool,
    pub token: Option<&'a str>,
    pub timeout_secs: Option<u64>,
}

/// Build the client config: config file first, then command-line values.
pub fn client_config(
    registry: &str,
    overrides: &ClientOverrides<'_>,
) -> Result<ClientConfig, RegistryError> {
    let file = match overrides.config_path {
        Some(path) => Some(ClientConfig::load(path)?),
        None => ClientConfig::load_default()?,
    };
    let mut config = match file {
        Some(mut c) => {
            c.registry = ClientConfig::new(registry).registry;
            c
        }
        None => ClientConfig::new(registry),
    };
    config.plain_http |= overrides.plain_http;
    if let Some(token) = overrides.token {
        config.auth_token = Some(token.to_owned());
    }
    if overrides.timeout_secs.is_some() {
        config.timeout_secs = overrides.timeout_secs;
    }
    Ok(config)
}

/// Exit status for a failed run.
pub fn exit_code(err: &CoreError) -> u8 {
    match err {
        CoreError::Schema(_)
        | CoreError::Archive(ArchiveError::Create { .. })
        | CoreError::Registry(RegistryError::Config(_)) => EXIT_INPUT_ERROR,
        CoreError::Registry(_) => EXIT_REGISTRY_ERROR,
        CoreError::Archive(_) | CoreError::Io(_) => EXIT_ARCHIVE_ERROR,
        CoreError::Interrupted => EXIT_INTERRUPTED,
        CoreError::WorkerPanicked | CoreError::NothingBundled(_) => EXIT_FAILURE,
    }
}
