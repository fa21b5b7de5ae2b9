// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::provider::{ProviderEndpoint, ServiceProviderType};

/// Command line configuration for the OAuth service.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "spi-oauth", about = "OAuth2 token broker for service provider integration")]
pub struct OAuthConfig {
    /// The location of the service configuration file.
    #[arg(short = 'c', long, default_value = "/etc/spi/config.json", env = "SPI_CONFIG_FILE")]
    pub config_file: PathBuf,

    /// Host to bind on.
    #[arg(long, default_value = "0.0.0.0", env = "SPI_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short = 'p', long, default_value_t = 8000, env = "SPI_PORT")]
    pub port: u16,

    /// Tracing filter directive.
    #[arg(long, default_value = "info", env = "SPI_LOG_LEVEL")]
    pub log_level: String,

    /// Log output format: `text` or `json`.
    #[arg(long, default_value = "text", env = "SPI_LOG_FORMAT")]
    pub log_format: String,

    /// Upper bound on the upstream work done for a single request, in milliseconds.
    #[arg(long, default_value_t = 30000, env = "SPI_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,

    /// Idle lifetime of a browser session, in seconds.
    #[arg(long, default_value_t = 3600, env = "SPI_SESSION_TTL_SECS")]
    pub session_ttl_secs: u64,

    /// Interval between expired-session sweeps, in milliseconds.
    #[arg(long, default_value_t = 60000, env = "SPI_SESSION_SWEEP_MS")]
    pub session_sweep_ms: u64,

    /// Kubernetes API server base URL.
    #[arg(long, default_value = "https://kubernetes.default.svc", env = "SPI_KUBE_API_URL")]
    pub kube_api_url: String,

    /// CA bundle used to verify the Kubernetes API server.
    #[arg(long, env = "SPI_KUBE_CA_FILE")]
    pub kube_ca_file: Option<PathBuf>,

    /// Token storage backend.
    #[arg(long, value_enum, default_value_t = StorageBackend::Vault, env = "SPI_STORAGE")]
    pub storage: StorageBackend,
}

impl OAuthConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn session_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.session_sweep_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StorageBackend {
    /// HashiCorp Vault KV v2.
    Vault,
    /// Process memory; tokens are lost on restart.
    Memory,
}

/// Service configuration file contents.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileConfig {
    shared_secret_file: PathBuf,
    base_url: String,
    #[serde(default)]
    service_providers: Vec<ProviderConfig>,
    #[serde(default)]
    vault_host: Option<String>,
    #[serde(default = "default_vault_role")]
    vault_role: String,
    #[serde(default = "default_vault_mount")]
    vault_mount: String,
    #[serde(default = "default_service_account_token_file_path")]
    service_account_token_file_path: PathBuf,
}

fn default_vault_role() -> String {
    "spi-oauth".to_owned()
}

fn default_vault_mount() -> String {
    "spi".to_owned()
}

fn default_service_account_token_file_path() -> PathBuf {
    PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/token")
}

/// Fully resolved service configuration.
#[derive(Clone)]
pub struct Configuration {
    /// Secret used to sign OAuth state; read from `sharedSecretFile`.
    pub shared_secret: Vec<u8>,
    pub base_url: String,
    pub service_providers: Vec<ProviderConfig>,
    pub vault: VaultSettings,
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("shared_secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("service_providers", &self.service_providers)
            .field("vault", &self.vault)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct VaultSettings {
    pub host: Option<String>,
    pub role: String,
    pub mount: String,
    pub service_account_token_file_path: PathBuf,
}

/// OAuth application registered with one service provider.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub kind: ServiceProviderType,
    pub client_id: String,
    pub client_secret: String,
    /// Overrides the callback URL derived from the base URL.
    #[serde(default)]
    pub redirect_url: Option<String>,
    /// Overrides the provider's default authorization endpoint.
    #[serde(default)]
    pub auth_url: Option<String>,
    /// Overrides the provider's default token endpoint.
    #[serde(default)]
    pub token_url: Option<String>,
}

impl ProviderConfig {
    pub fn endpoint(&self) -> ProviderEndpoint {
        let defaults = self.kind.default_endpoint();
        ProviderEndpoint {
            auth_url: self.auth_url.clone().unwrap_or(defaults.auth_url),
            token_url: self.token_url.clone().unwrap_or(defaults.token_url),
        }
    }

    /// Callback URL registered with the provider.
    pub fn redirect_url(&self, base_url: &str) -> String {
        match self.redirect_url {
            Some(ref url) => url.clone(),
            None => format!("{}/{}/callback", base_url.trim_end_matches('/'), self.kind.route_prefix()),
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_url", &self.redirect_url)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .finish()
    }
}

/// Load the service configuration from a JSON file.
pub fn load_from(path: &Path) -> anyhow::Result<Configuration> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
    parse(&contents)
}

/// Parse configuration JSON and read the shared secret it points to.
pub fn parse(contents: &str) -> anyhow::Result<Configuration> {
    let file: FileConfig = serde_json::from_str(contents)?;

    let shared_secret = std::fs::read(&file.shared_secret_file).map_err(|e| {
        anyhow::anyhow!("reading shared secret {}: {e}", file.shared_secret_file.display())
    })?;
    if shared_secret.is_empty() {
        anyhow::bail!("shared secret file {} is empty", file.shared_secret_file.display());
    }

    let mut seen = std::collections::HashSet::new();
    for sp in &file.service_providers {
        if !seen.insert(sp.kind) {
            anyhow::bail!("service provider {} configured more than once", sp.kind);
        }
    }

    Ok(Configuration {
        shared_secret,
        base_url: file.base_url.trim_end_matches('/').to_owned(),
        service_providers: file.service_providers,
        vault: VaultSettings {
            host: file.vault_host,
            role: file.vault_role,
            mount: file.vault_mount,
            service_account_token_file_path: file.service_account_token_file_path,
        },
    })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
