// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use crate::kube::{ClusterClient, ResourceAttributes, SPI_GROUP, SPI_VERSION};

/// Resource a caller must be allowed to create before it may start a flow.
pub const GATED_RESOURCE: &str = "spiaccesstokendataupdates";
pub const GATED_VERB: &str = "create";

/// Checks that a caller may write token data into a namespace.
///
/// Every check goes to the cluster; results are never cached.
#[derive(Clone)]
pub struct AuthorizationGate {
    cluster: Arc<dyn ClusterClient>,
}

impl AuthorizationGate {
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        Self { cluster }
    }

    pub async fn can_create_token_record(
        &self,
        credential: &str,
        namespace: &str,
    ) -> anyhow::Result<bool> {
        let attributes = ResourceAttributes {
            namespace: namespace.to_owned(),
            verb: GATED_VERB.to_owned(),
            group: SPI_GROUP.to_owned(),
            version: SPI_VERSION.to_owned(),
            resource: GATED_RESOURCE.to_owned(),
        };
        self.cluster.self_subject_access_review(credential, &attributes).await
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
