// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token storage: where exchanged tokens end up.
//!
//! Backends implement [`TokenStorage`]. [`notify::NotifyingTokenStorage`]
//! wraps any backend to tell the cluster that token data changed.

pub mod memory;
pub mod notify;
pub mod vault;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The `{name, namespace}` of the `SPIAccessToken` a token is stored for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerRef {
    pub name: String,
    pub namespace: String,
}

impl OwnerRef {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self { name: name.into(), namespace: namespace.into() }
    }

    /// Check that both parts are valid Kubernetes object names, so they can be
    /// spliced into API and storage paths.
    pub fn validate(&self) -> Result<(), String> {
        if !is_dns_label(&self.namespace) {
            return Err(format!("invalid namespace {:?}", self.namespace));
        }
        if !is_dns_subdomain(&self.name) {
            return Err(format!("invalid token name {:?}", self.name));
        }
        Ok(())
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// RFC 1123 label: lowercase alphanumerics and `-`, at most 63 characters.
fn is_dns_label(s: &str) -> bool {
    s.len() <= 63
        && s.starts_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit())
        && s.ends_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit())
        && s.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

/// RFC 1123 subdomain: dot-separated labels, at most 253 characters.
fn is_dns_subdomain(s: &str) -> bool {
    s.len() <= 253 && s.split('.').all(is_dns_label)
}

/// Token data as written to storage.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedToken {
    pub access_token: String,
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry as epoch seconds; 0 means the token does not expire.
    #[serde(default)]
    pub expiry: u64,
}

impl fmt::Debug for PersistedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistedToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Somewhere tokens can be written.
///
/// `credential` is the bearer credential of the user who completed the flow,
/// so backends that talk to the cluster act on that user's behalf.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    async fn store(
        &self,
        credential: &str,
        owner: &OwnerRef,
        token: &PersistedToken,
    ) -> anyhow::Result<()>;
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;
