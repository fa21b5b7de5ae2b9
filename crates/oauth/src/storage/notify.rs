// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use async_trait::async_trait;

use crate::kube::ClusterClient;
use crate::storage::{OwnerRef, PersistedToken, TokenStorage};

/// Wraps a backend and creates an `SPIAccessTokenDataUpdate` after each
/// successful write.
///
/// The notification is best effort: once the token is stored the write has
/// succeeded, and a failed notification is only logged.
pub struct NotifyingTokenStorage {
    inner: Arc<dyn TokenStorage>,
    cluster: Arc<dyn ClusterClient>,
}

impl NotifyingTokenStorage {
    pub fn new(inner: Arc<dyn TokenStorage>, cluster: Arc<dyn ClusterClient>) -> Self {
        Self { inner, cluster }
    }
}

#[async_trait]
impl TokenStorage for NotifyingTokenStorage {
    async fn store(
        &self,
        credential: &str,
        owner: &OwnerRef,
        token: &PersistedToken,
    ) -> anyhow::Result<()> {
        self.inner.store(credential, owner, token).await?;
        if let Err(e) = self.cluster.create_data_update(credential, owner).await {
            tracing::warn!(owner = %owner, err = %e, "failed to create token data update");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
