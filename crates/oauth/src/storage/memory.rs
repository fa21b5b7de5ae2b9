// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::storage::{OwnerRef, PersistedToken, TokenStorage};

/// Process-local token storage. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryTokenStorage {
    tokens: RwLock<HashMap<OwnerRef, PersistedToken>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, owner: &OwnerRef) -> Option<PersistedToken> {
        self.tokens.read().await.get(owner).cloned()
    }

    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }
}

#[async_trait]
impl TokenStorage for MemoryTokenStorage {
    async fn store(
        &self,
        _credential: &str,
        owner: &OwnerRef,
        token: &PersistedToken,
    ) -> anyhow::Result<()> {
        self.tokens.write().await.insert(owner.clone(), token.clone());
        tracing::debug!(owner = %owner, "token stored in memory");
        Ok(())
    }
}
