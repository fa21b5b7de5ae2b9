// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::controller::Controller;
use crate::provider::ServiceProviderType;
use crate::session::CookieSettings;

/// Shared server state.
pub struct AppState {
    pub controllers: HashMap<ServiceProviderType, Arc<Controller>>,
    pub cookie: CookieSettings,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(controllers: Vec<Controller>, cookie: CookieSettings, shutdown: CancellationToken) -> Self {
        let controllers = controllers.into_iter().map(|c| (c.kind(), Arc::new(c))).collect();
        Self { controllers, cookie, shutdown }
    }

    pub fn controller(&self, kind: ServiceProviderType) -> Option<&Arc<Controller>> {
        self.controllers.get(&kind)
    }

    /// Configured providers in a stable order.
    pub fn providers(&self) -> Vec<ServiceProviderType> {
        let mut kinds: Vec<_> = self.controllers.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

/// Current time as seconds since the Unix epoch.
pub fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
