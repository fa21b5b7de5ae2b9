// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use crate::exchange::TokenResponse;
use crate::storage::{OwnerRef, PersistedToken, TokenStorage};

const DEFAULT_TOKEN_TYPE: &str = "bearer";

/// Maps provider token responses into stored token data.
#[derive(Clone)]
pub struct TokenPersister {
    storage: Arc<dyn TokenStorage>,
}

impl TokenPersister {
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        Self { storage }
    }

    /// `expires_in` is relative to `now` (epoch seconds); a missing or zero
    /// lifetime becomes expiry 0, meaning "does not expire".
    pub fn to_persisted(token: &TokenResponse, now: u64) -> PersistedToken {
        let expiry = match token.expires_in {
            Some(secs) if secs > 0 => now.saturating_add(secs),
            _ => 0,
        };
        let token_type = token
            .token_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TOKEN_TYPE)
            .to_owned();
        PersistedToken {
            access_token: token.access_token.clone(),
            token_type,
            refresh_token: token.refresh_token.clone().filter(|t| !t.is_empty()),
            expiry,
        }
    }

    pub async fn store(
        &self,
        credential: &str,
        owner: &OwnerRef,
        token: &TokenResponse,
    ) -> anyhow::Result<()> {
        let persisted = Self::to_persisted(token, crate::state::epoch_secs());
        self.storage.store(credential, owner, &persisted).await
    }
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;
