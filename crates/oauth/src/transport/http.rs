// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the OAuth flow endpoints.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header::{AUTHORIZATION, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::controller::{AuthenticateRequest, CallbackRequest, Controller, Redirect};
use crate::error::{ErrorBody, ErrorResponse, FlowError};
use crate::provider::ServiceProviderType;
use crate::session::{CookieSettings, SessionId};
use crate::state::AppState;

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub providers: Vec<ServiceProviderType>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthenticateQuery {
    #[serde(default)]
    pub state: Option<String>,
}

/// Unrecognized parameters are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub redirect_after_login: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

// -- Handlers -----------------------------------------------------------------

/// `GET /health`
pub async fn health(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse { status: "running".to_owned(), providers: s.providers() })
}

/// `GET /{provider}/authenticate`
pub async fn authenticate(
    State(s): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<AuthenticateQuery>,
    headers: HeaderMap,
) -> Response {
    let Some(controller) = resolve(&s, &provider) else {
        return unknown_provider(&provider);
    };

    // A non-UTF-8 header is still "present", so it must not read as absent.
    let authorization = headers.get(AUTHORIZATION).map(|v| v.to_str().unwrap_or_default());
    let req = AuthenticateRequest {
        state: query.state.as_deref(),
        authorization,
        session: SessionId::from_headers(&headers),
    };
    match controller.authenticate(req).await {
        Ok(redirect) => found(redirect, &s.cookie),
        Err(e) => flow_failure(controller.kind(), "authenticate", e),
    }
}

/// `GET /{provider}/callback`
pub async fn callback(
    State(s): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
) -> Response {
    let Some(controller) = resolve(&s, &provider) else {
        return unknown_provider(&provider);
    };

    let req = CallbackRequest {
        state: query.state.as_deref(),
        code: query.code.as_deref(),
        scope: query.scope.as_deref(),
        redirect_after_login: query.redirect_after_login.as_deref(),
        error: query.error.as_deref(),
        error_description: query.error_description.as_deref(),
        session: SessionId::from_headers(&headers),
    };
    match controller.callback(req).await {
        Ok(redirect) => found(redirect, &s.cookie),
        Err(e) => flow_failure(controller.kind(), "callback", e),
    }
}

// -- Helpers ------------------------------------------------------------------

fn resolve<'a>(s: &'a AppState, prefix: &str) -> Option<&'a Arc<Controller>> {
    ServiceProviderType::from_route_prefix(prefix).and_then(|kind| s.controller(kind))
}

fn found(redirect: Redirect, cookie: &CookieSettings) -> Response {
    let mut builder =
        Response::builder().status(StatusCode::FOUND).header(LOCATION, redirect.location);
    if let Some(ref id) = redirect.session {
        builder = builder.header(SET_COOKIE, cookie.set_cookie(id));
    }
    match builder.body(Body::empty()) {
        Ok(resp) => resp,
        Err(e) => {
            tracing::error!(err = %e, "failed to build redirect response");
            FlowError::Internal("invalid redirect location".into()).into_response()
        }
    }
}

fn flow_failure(provider: ServiceProviderType, step: &str, e: FlowError) -> Response {
    if e.is_server_error() {
        tracing::error!(provider = %provider, step, code = e.as_str(), err = %e.message(), "oauth flow failed");
    } else {
        tracing::warn!(provider = %provider, step, code = e.as_str(), err = %e.message(), "oauth flow rejected");
    }
    e.into_response()
}

fn unknown_provider(prefix: &str) -> Response {
    let body = ErrorResponse {
        error: ErrorBody {
            code: "NOT_FOUND".to_owned(),
            message: format!("no service provider configured for {prefix:?}"),
        },
    };
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}
