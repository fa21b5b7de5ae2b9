// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal failures of a single OAuth flow.
///
/// None of these are retried within a request; the user restarts the flow by
/// hitting the authenticate endpoint again. Messages must never carry the
/// caller's bearer credential or a provider client secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// The signed state was missing, malformed, or failed verification.
    InvalidState(String),
    /// The cluster refused the caller (or no credential was presented).
    AuthorizationDenied(String),
    /// No flow record for the presented state in this browser session.
    FlowUnknown,
    /// The provider rejected the code or could not be reached.
    UpstreamExchangeFailed(String),
    /// The token could not be written to storage.
    PersistFailed(String),
    /// Infrastructure failure outside the flow taxonomy.
    Internal(String),
}

impl FlowError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidState(_) => 400,
            Self::AuthorizationDenied(_) => 401,
            Self::FlowUnknown => 401,
            Self::UpstreamExchangeFailed(_) => 400,
            Self::PersistFailed(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidState(_) => "INVALID_STATE",
            Self::AuthorizationDenied(_) => "AUTHORIZATION_DENIED",
            Self::FlowUnknown => "FLOW_UNKNOWN",
            Self::UpstreamExchangeFailed(_) => "UPSTREAM_EXCHANGE_FAILED",
            Self::PersistFailed(_) => "PERSIST_FAILED",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::InvalidState(msg)
            | Self::AuthorizationDenied(msg)
            | Self::UpstreamExchangeFailed(msg)
            | Self::PersistFailed(msg)
            | Self::Internal(msg) => msg.clone(),
            Self::FlowUnknown => "no active oauth flow found for the state key".to_owned(),
        }
    }

    /// Whether the failure is the server's fault rather than the caller's.
    pub fn is_server_error(&self) -> bool {
        self.http_status() >= 500
    }

    pub fn to_error_body(&self) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: self.message() }
    }

    pub fn to_http_response(&self) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse { error: self.to_error_body() }))
    }
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.as_str(), self.message())
    }
}

impl std::error::Error for FlowError {}

impl IntoResponse for FlowError {
    fn into_response(self) -> Response {
        self.to_http_response().into_response()
    }
}

/// Top-level error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
