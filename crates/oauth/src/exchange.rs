// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authorization-code exchange against a provider's token endpoint.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

/// Longest slice of an error body quoted in an error message.
const MAX_ERROR_BODY: usize = 256;

/// Parameters of one code exchange.
pub struct ExchangeRequest<'a> {
    pub token_url: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub redirect_uri: &'a str,
    pub code: &'a str,
    /// Scope hint from the callback, passed through verbatim.
    pub scope: Option<&'a str>,
}

/// Token endpoint response.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds from now.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[async_trait]
pub trait CodeExchanger: Send + Sync {
    async fn exchange(&self, request: &ExchangeRequest<'_>) -> anyhow::Result<TokenResponse>;
}

/// GitHub answers failed exchanges with 200 and an `error` field, so the body
/// is parsed loosely before deciding.
#[derive(Deserialize)]
struct RawTokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
    error_description: Option<String>,
}

pub struct HttpCodeExchanger {
    client: reqwest::Client,
}

impl HttpCodeExchanger {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        crate::ensure_crypto();
        Ok(Self { client: reqwest::Client::builder().timeout(timeout).build()? })
    }
}

#[async_trait]
impl CodeExchanger for HttpCodeExchanger {
    async fn exchange(&self, request: &ExchangeRequest<'_>) -> anyhow::Result<TokenResponse> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", request.code),
            ("redirect_uri", request.redirect_uri),
            ("client_id", request.client_id),
            ("client_secret", request.client_secret),
        ];
        if let Some(scope) = request.scope {
            form.push(("scope", scope));
        }

        let resp = self
            .client
            .post(request.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let mut text = truncate(&text, MAX_ERROR_BODY).to_owned();
            if !request.client_secret.is_empty() {
                text = text.replace(request.client_secret, "<redacted>");
            }
            anyhow::bail!("code exchange failed ({status}): {text}");
        }

        let raw: RawTokenResponse = resp.json().await?;
        if let Some(error) = raw.error {
            let description = raw.error_description.unwrap_or_default();
            anyhow::bail!("provider rejected code exchange: {error} {description}");
        }
        let access_token = match raw.access_token {
            Some(t) if !t.is_empty() => t,
            _ => anyhow::bail!("token response carried no access_token"),
        };

        Ok(TokenResponse {
            access_token,
            token_type: raw.token_type,
            refresh_token: raw.refresh_token,
            expires_in: raw.expires_in,
        })
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
#[path = "exchange_tests.rs"]
mod tests;
