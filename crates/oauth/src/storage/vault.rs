// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HashiCorp Vault KV v2 token storage.
//!
//! Authenticates with Vault's Kubernetes auth method using the service
//! account token mounted into the pod, then writes token data to
//! `{mount}/data/{namespace}/{name}`.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::config::VaultSettings;
use crate::storage::{OwnerRef, PersistedToken, TokenStorage};

/// Re-login this long before the Vault lease runs out.
const RENEW_MARGIN: Duration = Duration::from_secs(30);

struct VaultLogin {
    client_token: String,
    /// `None` for tokens without a lease.
    renew_after: Option<Instant>,
}

impl VaultLogin {
    fn is_fresh(&self) -> bool {
        self.renew_after.map_or(true, |at| Instant::now() < at)
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    auth: LoginAuth,
}

#[derive(Deserialize)]
struct LoginAuth {
    client_token: String,
    #[serde(default)]
    lease_duration: u64,
}

pub struct VaultTokenStorage {
    http: reqwest::Client,
    host: String,
    mount: String,
    role: String,
    service_account_token_path: PathBuf,
    login: RwLock<Option<VaultLogin>>,
}

impl VaultTokenStorage {
    pub fn new(host: &str, settings: &VaultSettings, timeout: Duration) -> anyhow::Result<Self> {
        crate::ensure_crypto();
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            host: host.trim_end_matches('/').to_owned(),
            mount: settings.mount.trim_matches('/').to_owned(),
            role: settings.role.clone(),
            service_account_token_path: settings.service_account_token_file_path.clone(),
            login: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    async fn login(&self) -> anyhow::Result<String> {
        let jwt = tokio::fs::read_to_string(&self.service_account_token_path).await.map_err(|e| {
            anyhow::anyhow!(
                "reading service account token {}: {e}",
                self.service_account_token_path.display()
            )
        })?;

        let body = serde_json::json!({ "role": self.role, "jwt": jwt.trim() });
        let resp = self.http.post(self.url("/v1/auth/kubernetes/login")).json(&body).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("vault login failed ({})", resp.status());
        }

        let parsed: LoginResponse = resp.json().await?;
        let renew_after = match parsed.auth.lease_duration {
            0 => None,
            secs => Some(Instant::now() + Duration::from_secs(secs).saturating_sub(RENEW_MARGIN)),
        };
        let client_token = parsed.auth.client_token;
        *self.login.write().await =
            Some(VaultLogin { client_token: client_token.clone(), renew_after });
        tracing::debug!(role = %self.role, "logged in to vault");
        Ok(client_token)
    }

    async fn client_token(&self) -> anyhow::Result<String> {
        if let Some(login) = self.login.read().await.as_ref() {
            if login.is_fresh() {
                return Ok(login.client_token.clone());
            }
        }
        self.login().await
    }

    async fn write(
        &self,
        client_token: &str,
        owner: &OwnerRef,
        token: &PersistedToken,
    ) -> anyhow::Result<StatusCode> {
        let path = format!("/v1/{}/data/{}/{}", self.mount, owner.namespace, owner.name);
        let resp = self
            .http
            .post(self.url(&path))
            .header("X-Vault-Token", client_token)
            .json(&serde_json::json!({ "data": token }))
            .send()
            .await?;
        Ok(resp.status())
    }
}

#[async_trait]
impl TokenStorage for VaultTokenStorage {
    async fn store(
        &self,
        _credential: &str,
        owner: &OwnerRef,
        token: &PersistedToken,
    ) -> anyhow::Result<()> {
        let client_token = self.client_token().await?;
        let mut status = self.write(&client_token, owner, token).await?;

        // A revoked or expired Vault token: log in again once and retry.
        if status == StatusCode::FORBIDDEN {
            tracing::debug!(owner = %owner, "vault rejected cached token, logging in again");
            *self.login.write().await = None;
            let client_token = self.login().await?;
            status = self.write(&client_token, owner, token).await?;
        }

        if !status.is_success() {
            anyhow::bail!("vault write for {owner} failed ({status})");
        }
        tracing::debug!(owner = %owner, "token stored in vault");
        Ok(())
    }
}

#[cfg(test)]
#[path = "vault_tests.rs"]
mod tests;
