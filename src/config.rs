//! TOML configuration for the brAIn shim.
//!
//! Every section is optional. Values that are not set fall back to the
//! defaults the brAIn service image expects (port 9000, container `brain`,
//! image `lusob04/brain`).

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
}

/// The container and endpoint that make up the interactive service.
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_image")]
    pub image: String,
    #[serde(default = "default_container_name")]
    pub container_name: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_runtime_binary")]
    pub runtime_binary: String,
    #[serde(default = "default_ingest_command")]
    pub ingest_command: Vec<String>,
    #[serde(default = "default_path_env")]
    pub path_env: String,
    #[serde(default = "default_key_env")]
    pub key_env: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            image: default_image(),
            container_name: default_container_name(),
            port: default_port(),
            endpoint: default_endpoint(),
            runtime_binary: default_runtime_binary(),
            ingest_command: default_ingest_command(),
            path_env: default_path_env(),
            key_env: default_key_env(),
        }
    }
}

fn default_image() -> String {
    "lusob04/brain".to_string()
}
fn default_container_name() -> String {
    "brain".to_string()
}
fn default_port() -> u16 {
    9000
}
fn default_endpoint() -> String {
    "http://localhost:9000".to_string()
}
fn default_runtime_binary() -> String {
    "docker".to_string()
}
fn default_ingest_command() -> Vec<String> {
    vec!["make".to_string(), "ingest".to_string()]
}
fn default_path_env() -> String {
    "MARKDOWN_FILES".to_string()
}
fn default_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

/// Poll budget for the reachability probe.
#[derive(Debug, Deserialize, Clone)]
pub struct ProbeConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            interval_ms: default_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}
fn default_interval_ms() -> u64 {
    2_000
}
fn default_request_timeout_ms() -> u64 {
    1_500
}

impl ProbeConfig {
    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        RetryPolicy::new(
            Duration::from_millis(self.timeout_ms),
            Duration::from_millis(self.interval_ms),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct VaultConfig {
    #[serde(default = "default_vault_path")]
    pub path: PathBuf,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            path: default_vault_path(),
        }
    }
}

fn default_vault_path() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Deserialize, Clone)]
pub struct SettingsConfig {
    #[serde(default = "default_settings_path")]
    pub path: PathBuf,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: default_settings_path(),
        }
    }
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("./config/brain-settings.json")
}

impl Config {
    /// All defaults. Used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Resolve the vault directory to an absolute path.
    ///
    /// The container bind-mounts the vault at the same path it has on the
    /// host, so a relative path would not survive the trip.
    pub fn resolve_vault(&self, override_path: Option<&Path>) -> Result<PathBuf> {
        let path = override_path.unwrap_or(self.vault.path.as_path());
        std::fs::canonicalize(path)
            .with_context(|| format!("Vault directory not found: {}", path.display()))
    }
}

/// Load the config file, falling back to defaults when it does not exist.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::minimal());
    }
    load_config(path)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let service = &config.service;
    if service.image.trim().is_empty() {
        bail!("service.image must not be empty");
    }
    if service.container_name.trim().is_empty() {
        bail!("service.container_name must not be empty");
    }
    if service.runtime_binary.trim().is_empty() {
        bail!("service.runtime_binary must not be empty");
    }
    if service.port == 0 {
        bail!("service.port must be > 0");
    }
    if !(service.endpoint.starts_with("http://") || service.endpoint.starts_with("https://")) {
        bail!(
            "service.endpoint must be an http(s) URL, got '{}'",
            service.endpoint
        );
    }

    if config.probe.timeout_ms == 0 {
        bail!("probe.timeout_ms must be > 0");
    }
    if config.probe.interval_ms == 0 {
        bail!("probe.interval_ms must be > 0");
    }

    Ok(())
}
