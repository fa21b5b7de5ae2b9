// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use super::*;

fn secret_file(contents: &[u8]) -> anyhow::Result<tempfile::NamedTempFile> {
    let file = tempfile::NamedTempFile::new()?;
    std::fs::write(file.path(), contents)?;
    Ok(file)
}

fn config_json(secret_path: &Path) -> String {
    serde_json::json!({
        "sharedSecretFile": secret_path,
        "baseUrl": "https://spi.example.com/",
        "serviceProviders": [
            { "type": "GitHub", "clientId": "123", "clientSecret": "gh-client-secret" },
            {
                "type": "Quay",
                "clientId": "456",
                "clientSecret": "quay-client-secret",
                "redirectUrl": "https://localhost:8080/quay/callback"
            }
        ],
        "vaultHost": "http://vault:8200"
    })
    .to_string()
}

#[test]
fn reads_shared_secret_and_providers() -> anyhow::Result<()> {
    let secret = secret_file(b"secret")?;
    let cfg = parse(&config_json(secret.path()))?;

    assert_eq!(cfg.shared_secret, b"secret");
    assert_eq!(cfg.base_url, "https://spi.example.com");
    assert_eq!(cfg.service_providers.len(), 2);
    assert_eq!(cfg.service_providers[0].kind, ServiceProviderType::GitHub);
    assert_eq!(cfg.service_providers[1].client_id, "456");
    assert_eq!(cfg.vault.host.as_deref(), Some("http://vault:8200"));
    assert_eq!(cfg.vault.mount, "spi");
    assert_eq!(cfg.vault.role, "spi-oauth");
    Ok(())
}

#[test]
fn redirect_url_derives_from_base_url() -> anyhow::Result<()> {
    let secret = secret_file(b"secret")?;
    let cfg = parse(&config_json(secret.path()))?;

    assert_eq!(
        cfg.service_providers[0].redirect_url(&cfg.base_url),
        "https://spi.example.com/github/callback"
    );
    assert_eq!(
        cfg.service_providers[1].redirect_url(&cfg.base_url),
        "https://localhost:8080/quay/callback"
    );
    Ok(())
}

#[test]
fn endpoint_overrides_apply() -> anyhow::Result<()> {
    let cfg: ProviderConfig = serde_json::from_value(serde_json::json!({
        "type": "GitHub",
        "clientId": "c",
        "clientSecret": "s",
        "tokenUrl": "http://127.0.0.1:9000/token"
    }))?;
    let endpoint = cfg.endpoint();
    assert_eq!(endpoint.auth_url, "https://github.com/login/oauth/authorize");
    assert_eq!(endpoint.token_url, "http://127.0.0.1:9000/token");
    Ok(())
}

#[test]
fn missing_secret_file_is_an_error() {
    let json = config_json(Path::new("/nonexistent/spi-secret"));
    assert!(parse(&json).is_err());
}

#[test]
fn empty_secret_file_is_an_error() -> anyhow::Result<()> {
    let secret = secret_file(b"")?;
    assert!(parse(&config_json(secret.path())).is_err());
    Ok(())
}

#[test]
fn duplicate_provider_is_an_error() -> anyhow::Result<()> {
    let secret = secret_file(b"secret")?;
    let json = serde_json::json!({
        "sharedSecretFile": secret.path(),
        "baseUrl": "https://spi.example.com",
        "serviceProviders": [
            { "type": "GitHub", "clientId": "1", "clientSecret": "a" },
            { "type": "GitHub", "clientId": "2", "clientSecret": "b" }
        ]
    });
    assert!(parse(&json.to_string()).is_err());
    Ok(())
}

#[test]
fn debug_output_redacts_secrets() -> anyhow::Result<()> {
    let secret = secret_file(b"very-secret-bytes")?;
    let cfg = parse(&config_json(secret.path()))?;
    let debug = format!("{cfg:?}");
    assert!(!debug.contains("gh-client-secret"));
    assert!(!debug.contains("quay-client-secret"));
    assert!(!debug.contains("very-secret-bytes"));
    assert!(debug.contains("<redacted>"));
    Ok(())
}

#[test]
fn cli_defaults() -> anyhow::Result<()> {
    let config = OAuthConfig::try_parse_from(["spi-oauth"])?;
    assert_eq!(config.port, 8000);
    assert_eq!(config.config_file, PathBuf::from("/etc/spi/config.json"));
    assert_eq!(config.storage, StorageBackend::Vault);
    assert_eq!(config.request_timeout(), Duration::from_secs(30));
    assert_eq!(config.session_ttl(), Duration::from_secs(3600));
    Ok(())
}

#[test]
fn cli_overrides() -> anyhow::Result<()> {
    let config = OAuthConfig::try_parse_from([
        "spi-oauth",
        "--config-file",
        "/tmp/cfg.json",
        "-p",
        "9000",
        "--storage",
        "memory",
        "--log-format",
        "json",
    ])?;
    assert_eq!(config.port, 9000);
    assert_eq!(config.storage, StorageBackend::Memory);
    assert_eq!(config.log_format, "json");
    Ok(())
}
