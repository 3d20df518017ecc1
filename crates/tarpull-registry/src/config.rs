use crate::RegistryError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_max_idle() -> usize {
    8
}

fn default_idle_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    crate::USER_AGENT.to_owned()
}

/// Connection settings for one registry.
///
/// Every field except `registry` has a default, so a config file may carry
/// only the tuning knobs and leave the registry to the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub registry: String,
    #[serde(default)]
    pub plain_http: bool,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default = "default_max_idle")]
    pub max_idle_connections: usize,
    #[serde(default = "default_max_idle")]
    pub max_idle_connections_per_host: usize,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(registry: &str) -> Self {
        Self {
            registry: registry.trim().trim_end_matches('/').to_owned(),
            plain_http: false,
            auth_token: None,
            max_idle_connections: default_max_idle(),
            max_idle_connections_per_host: default_max_idle(),
            idle_timeout_secs: default_idle_timeout(),
            timeout_secs: None,
            user_agent: default_user_agent(),
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_owned());
        self
    }

    #[must_use]
    pub fn with_plain_http(mut self, plain_http: bool) -> Self {
        self.plain_http = plain_http;
        self
    }

    /// Base URL requests are built on, without a trailing slash.
    pub fn base_url(&self) -> String {
        normalize_registry_url(&self.registry, self.plain_http)
    }

    /// Load config from `~/.config/tarpull/config.json`, if it exists.
    ///
    /// A missing file, or no `HOME` to find it under, is `Ok(None)`.
    pub fn load_default() -> Result<Option<Self>, RegistryError> {
        let Ok(path) = default_config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }

    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| RegistryError::Config(format!("invalid config {}: {e}", path.display())))
    }

}

/// Turn a registry argument into a base URL.
///
/// A bare host gets `https://`. An explicit scheme is kept, except that
/// `plain_http` always forces `http://`.
pub fn normalize_registry_url(registry: &str, plain_http: bool) -> String {
    let trimmed = registry.trim().trim_end_matches('/');
    let host = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"));
    match host {
        Some(h) if plain_http => format!("http://{h}"),
        Some(_) => trimmed.to_owned(),
        None if plain_http => format!("http://{trimmed}"),
        None => format!("https://{trimmed}"),
    }
}

pub fn default_config_path() -> Result<PathBuf, RegistryError> {
    let home =
        std::env::var("HOME").map_err(|_| RegistryError::Config("HOME not set".to_owned()))?;
    Ok(PathBuf::from(home).join(".config/tarpull/config.json"))
}
