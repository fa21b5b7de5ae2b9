// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! spi-oauth: OAuth2 authorization-code broker between service providers and
//! cluster token storage.

pub mod config;
pub mod controller;
pub mod error;
pub mod exchange;
pub mod gate;
pub mod kube;
pub mod oauthstate;
pub mod persist;
pub mod provider;
pub mod session;
pub mod state;
pub mod storage;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::{Arc, Once};

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::{Configuration, OAuthConfig, StorageBackend};
use crate::controller::{Controller, FlowServices};
use crate::exchange::HttpCodeExchanger;
use crate::kube::{ClusterClient, KubeClient};
use crate::oauthstate::StateCodec;
use crate::session::{spawn_session_sweeper, CookieSettings, FlowCorrelationStore, MemorySessionStore};
use crate::state::AppState;
use crate::storage::memory::MemoryTokenStorage;
use crate::storage::notify::NotifyingTokenStorage;
use crate::storage::vault::VaultTokenStorage;
use crate::storage::TokenStorage;
use crate::transport::build_router;

static CRYPTO: Once = Once::new();

/// Install the rustls crypto provider (needed for reqwest even on plain HTTP).
pub fn ensure_crypto() {
    CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Build the storage chain selected on the command line.
fn build_storage(
    config: &OAuthConfig,
    file: &Configuration,
    cluster: Arc<dyn ClusterClient>,
) -> anyhow::Result<Arc<dyn TokenStorage>> {
    let backend: Arc<dyn TokenStorage> = match config.storage {
        StorageBackend::Vault => {
            let host = file
                .vault
                .host
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("vaultHost is required with the vault backend"))?;
            Arc::new(VaultTokenStorage::new(host, &file.vault, config.request_timeout())?)
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory token storage; tokens are lost on restart");
            Arc::new(MemoryTokenStorage::new())
        }
    };
    Ok(Arc::new(NotifyingTokenStorage::new(backend, cluster)))
}

/// Run the OAuth service until shutdown.
pub async fn run(config: OAuthConfig) -> anyhow::Result<()> {
    let file = crate::config::load_from(&config.config_file)?;
    if file.service_providers.is_empty() {
        tracing::warn!("no service providers configured");
    }

    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let cluster: Arc<dyn ClusterClient> = Arc::new(KubeClient::new(
        &config.kube_api_url,
        config.kube_ca_file.as_deref(),
        config.request_timeout(),
    )?);
    let storage = build_storage(&config, &file, Arc::clone(&cluster))?;
    let sessions: Arc<dyn FlowCorrelationStore> =
        Arc::new(MemorySessionStore::new(config.session_ttl()));

    let services = FlowServices {
        codec: Arc::new(StateCodec::new(&file.shared_secret)?),
        sessions: Arc::clone(&sessions),
        cluster,
        exchanger: Arc::new(HttpCodeExchanger::new(config.request_timeout())?),
        storage,
        base_url: file.base_url.clone(),
        request_timeout: config.request_timeout(),
    };
    let controllers: Vec<Controller> = file
        .service_providers
        .iter()
        .map(|p| Controller::new(p.clone(), services.clone()))
        .collect();
    for c in &controllers {
        tracing::info!(provider = %c.kind(), redirect_uri = %c.redirect_uri(), "provider configured");
    }

    let cookie = CookieSettings {
        max_age: config.session_ttl(),
        secure: file.base_url.starts_with("https://"),
    };
    let state = Arc::new(AppState::new(controllers, cookie, shutdown.clone()));

    spawn_session_sweeper(sessions, config.session_sweep_interval(), shutdown.clone());
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
                shutdown.cancel();
            }
        });
    }

    tracing::info!("spi-oauth listening on {addr}");
    let router = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}
