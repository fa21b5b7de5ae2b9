// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service provider profiles and consent URL construction.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Service providers the broker knows how to talk to.
///
/// Adding a provider means adding a variant and its default endpoints here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ServiceProviderType {
    GitHub,
    Quay,
}

impl ServiceProviderType {
    pub const ALL: [ServiceProviderType; 2] = [Self::GitHub, Self::Quay];

    /// Path prefix of the provider's routes (`/github/authenticate`, ...).
    pub fn route_prefix(&self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::Quay => "quay",
        }
    }

    pub fn from_route_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.route_prefix() == prefix)
    }

    pub fn default_endpoint(&self) -> ProviderEndpoint {
        match self {
            Self::GitHub => ProviderEndpoint {
                auth_url: "https://github.com/login/oauth/authorize".to_owned(),
                token_url: "https://github.com/login/oauth/access_token".to_owned(),
            },
            Self::Quay => ProviderEndpoint {
                auth_url: "https://quay.io/oauth/authorize".to_owned(),
                token_url: "https://quay.io/oauth/access_token".to_owned(),
            },
        }
    }
}

impl fmt::Display for ServiceProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GitHub => f.write_str("GitHub"),
            Self::Quay => f.write_str("Quay"),
        }
    }
}

/// OAuth endpoints of one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoint {
    pub auth_url: String,
    pub token_url: String,
}

/// Build the provider consent URL for an authorization code flow.
///
/// Scopes are joined with spaces, which every supported provider accepts.
pub fn build_auth_url(
    auth_url: &str,
    client_id: &str,
    redirect_uri: &str,
    scopes: &[String],
    state: &str,
) -> String {
    let joiner = if auth_url.contains('?') { '&' } else { '?' };
    format!(
        "{auth_url}{joiner}client_id={client_id}\
         &redirect_uri={redirect_uri}\
         &response_type=code\
         &scope={scope}\
         &state={state}",
        client_id = urlencoding(client_id),
        redirect_uri = urlencoding(redirect_uri),
        scope = urlencoding(&scopes.join(" ")),
        state = urlencoding(state),
    )
}

/// Form-style encoding for URL query parameters (spaces as `+`).
pub(crate) fn urlencoding(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            b' ' => out.push('+'),
            _ => {
                out.push('%');
                out.push(char::from(HEX[(b >> 4) as usize]));
                out.push(char::from(HEX[(b & 0xf) as usize]));
            }
        }
    }
    out
}

const HEX: &[u8; 16] = b"0123456789ABCDEF";

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
