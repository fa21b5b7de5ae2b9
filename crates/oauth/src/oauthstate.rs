// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signed OAuth flow state.
//!
//! The state travels through the browser and the service provider and comes
//! back verbatim, so it only needs authenticity: it carries identifiers and a
//! correlation key, never a credential. The wire form is
//! `base64url(json) "." base64url(hmac_sha256(secret, json))` without padding.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::hmac;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::FlowError;
use crate::state::epoch_secs;

const SEPARATOR: char = '.';

/// State minted by the operator when it asks a user to authorize a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AnonymousFlowState {
    pub token_name: String,
    pub token_namespace: String,
    pub scopes: Vec<String>,
    /// Epoch seconds.
    pub issued_at: u64,
}

impl AnonymousFlowState {
    pub fn new(token_name: impl Into<String>, token_namespace: impl Into<String>, scopes: Vec<String>) -> Self {
        Self {
            token_name: token_name.into(),
            token_namespace: token_namespace.into(),
            scopes,
            issued_at: epoch_secs(),
        }
    }
}

/// Anonymous state plus the key of the flow record holding the caller's
/// credential in the browser session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct KeyedFlowState {
    pub state: AnonymousFlowState,
    pub flow_key: String,
}

/// Why a state string was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    Missing,
    Malformed,
    BadSignature,
    BadPayload,
}

impl StateError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing state parameter",
            Self::Malformed => "malformed state",
            Self::BadSignature => "state signature mismatch",
            Self::BadPayload => "unexpected state payload",
        }
    }
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for StateError {}

impl From<StateError> for FlowError {
    fn from(e: StateError) -> Self {
        FlowError::InvalidState(e.to_string())
    }
}

/// Signs and verifies flow state with a shared HMAC-SHA256 secret.
///
/// Stateless apart from the key; share one instance across all requests.
pub struct StateCodec {
    key: hmac::Key,
}

impl StateCodec {
    pub fn new(secret: &[u8]) -> anyhow::Result<Self> {
        if secret.is_empty() {
            anyhow::bail!("state signing secret must not be empty");
        }
        Ok(Self { key: hmac::Key::new(hmac::HMAC_SHA256, secret) })
    }

    pub fn encode_anonymous(&self, state: &AnonymousFlowState) -> anyhow::Result<String> {
        self.encode(state)
    }

    pub fn encode_keyed(&self, state: &KeyedFlowState) -> anyhow::Result<String> {
        self.encode(state)
    }

    pub fn decode_anonymous(&self, encoded: &str) -> Result<AnonymousFlowState, StateError> {
        self.decode(encoded)
    }

    pub fn decode_keyed(&self, encoded: &str) -> Result<KeyedFlowState, StateError> {
        self.decode(encoded)
    }

    fn encode<T: Serialize>(&self, value: &T) -> anyhow::Result<String> {
        let payload = serde_json::to_vec(value)?;
        let tag = hmac::sign(&self.key, &payload);
        Ok(format!(
            "{}{SEPARATOR}{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(tag.as_ref())
        ))
    }

    fn decode<T: DeserializeOwned>(&self, encoded: &str) -> Result<T, StateError> {
        if encoded.is_empty() {
            return Err(StateError::Missing);
        }
        let (payload, tag) = encoded.split_once(SEPARATOR).ok_or(StateError::Malformed)?;
        if tag.contains(SEPARATOR) {
            return Err(StateError::Malformed);
        }
        let payload = URL_SAFE_NO_PAD.decode(payload).map_err(|_| StateError::Malformed)?;
        let tag = URL_SAFE_NO_PAD.decode(tag).map_err(|_| StateError::Malformed)?;

        // Nothing is parsed until the tag over the exact received bytes checks out.
        hmac::verify(&self.key, &payload, &tag).map_err(|_| StateError::BadSignature)?;
        serde_json::from_slice(&payload).map_err(|_| StateError::BadPayload)
    }
}

#[cfg(test)]
#[path = "oauthstate_tests.rs"]
mod tests;
