// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Helpers for tests that need a real HTTP peer or a fake cluster.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use axum::Router;
use tokio::net::TcpListener;

use crate::kube::{AccessTokenObject, ClusterClient, ResourceAttributes};
use crate::storage::OwnerRef;

/// Serve `router` on an ephemeral localhost port and return its base URL.
///
/// The server task lives until the test runtime shuts down.
pub async fn serve(router: Router) -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(format!("http://{addr}"))
}

/// In-process [`ClusterClient`].
///
/// `credential` may act in the namespaces listed in `allowed`; every other
/// credential is denied everywhere.
pub struct FakeCluster {
    credential: String,
    allowed: HashSet<String>,
    pub reviews: Mutex<Vec<(String, ResourceAttributes)>>,
    pub fail_reviews: AtomicBool,
    pub fail_reads: AtomicBool,
}

impl FakeCluster {
    pub fn new(credential: &str, allowed: &[&str]) -> Self {
        Self {
            credential: credential.to_owned(),
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
            reviews: Mutex::new(Vec::new()),
            fail_reviews: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
        }
    }

    pub fn review_count(&self) -> usize {
        self.reviews.lock().map(|r| r.len()).unwrap_or_default()
    }

    fn permits(&self, credential: &str, namespace: &str) -> bool {
        credential == self.credential && self.allowed.contains(namespace)
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn self_subject_access_review(
        &self,
        credential: &str,
        attributes: &ResourceAttributes,
    ) -> anyhow::Result<bool> {
        if self.fail_reviews.load(Ordering::SeqCst) {
            anyhow::bail!("api server unavailable");
        }
        if let Ok(mut reviews) = self.reviews.lock() {
            reviews.push((credential.to_owned(), attributes.clone()));
        }
        Ok(self.permits(credential, &attributes.namespace))
    }

    async fn get_access_token(
        &self,
        credential: &str,
        owner: &OwnerRef,
    ) -> anyhow::Result<AccessTokenObject> {
        if self.fail_reads.load(Ordering::SeqCst) || !self.permits(credential, &owner.namespace) {
            anyhow::bail!("SPIAccessToken {owner} not readable");
        }
        Ok(AccessTokenObject {
            name: owner.name.clone(),
            namespace: owner.namespace.clone(),
            uid: Some("uid-1".into()),
        })
    }

    async fn create_data_update(&self, credential: &str, owner: &OwnerRef) -> anyhow::Result<()> {
        if !self.permits(credential, &owner.namespace) {
            anyhow::bail!("forbidden");
        }
        Ok(())
    }
}
