// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport for the OAuth service.

pub mod http;

use std::sync::Arc;

use axum::response::Html;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Page shown after a token was stored and no other target was requested.
const CALLBACK_SUCCESS_HTML: &str = "<!DOCTYPE html>
<html>
<head><meta charset=\"utf-8\"><title>Authenticated</title></head>
<body>
<h1>Authentication successful</h1>
<p>The token was stored. You can close this window.</p>
</body>
</html>
";

/// Build the axum `Router` with all OAuth routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(http::health))
        .route("/callback_success", get(|| async { Html(CALLBACK_SUCCESS_HTML) }))
        // Per-provider flow endpoints; the prefix selects the controller.
        .route("/{provider}/authenticate", get(http::authenticate))
        .route("/{provider}/callback", get(http::callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
