// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::kube::{AccessTokenObject, ResourceAttributes};
use crate::storage::memory::MemoryTokenStorage;

struct CountingCluster {
    updates: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl ClusterClient for CountingCluster {
    async fn self_subject_access_review(
        &self,
        _credential: &str,
        _attributes: &ResourceAttributes,
    ) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn get_access_token(
        &self,
        _credential: &str,
        owner: &OwnerRef,
    ) -> anyhow::Result<AccessTokenObject> {
        Ok(AccessTokenObject { name: owner.name.clone(), namespace: owner.namespace.clone(), uid: None })
    }

    async fn create_data_update(&self, _credential: &str, _owner: &OwnerRef) -> anyhow::Result<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("api server unavailable");
        }
        Ok(())
    }
}

struct FailingStorage;

#[async_trait]
impl TokenStorage for FailingStorage {
    async fn store(
        &self,
        _credential: &str,
        _owner: &OwnerRef,
        _token: &PersistedToken,
    ) -> anyhow::Result<()> {
        anyhow::bail!("backend down")
    }
}

fn token() -> PersistedToken {
    PersistedToken {
        access_token: "gho_abc".into(),
        token_type: "bearer".into(),
        refresh_token: None,
        expiry: 0,
    }
}

#[tokio::test]
async fn notifies_after_write() -> anyhow::Result<()> {
    let memory = Arc::new(MemoryTokenStorage::new());
    let cluster = Arc::new(CountingCluster { updates: AtomicUsize::new(0), fail: false });
    let storage = NotifyingTokenStorage::new(memory.clone(), cluster.clone());

    let owner = OwnerRef::new("tok", "ns");
    storage.store("caller", &owner, &token()).await?;

    assert_eq!(memory.get(&owner).await, Some(token()));
    assert_eq!(cluster.updates.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn failed_notification_keeps_the_write() -> anyhow::Result<()> {
    let memory = Arc::new(MemoryTokenStorage::new());
    let cluster = Arc::new(CountingCluster { updates: AtomicUsize::new(0), fail: true });
    let storage = NotifyingTokenStorage::new(memory.clone(), cluster.clone());

    storage.store("caller", &OwnerRef::new("tok", "ns"), &token()).await?;
    assert_eq!(memory.len().await, 1);
    assert_eq!(cluster.updates.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn failed_write_skips_notification() {
    let cluster = Arc::new(CountingCluster { updates: AtomicUsize::new(0), fail: false });
    let storage = NotifyingTokenStorage::new(Arc::new(FailingStorage), cluster.clone());

    assert!(storage.store("caller", &OwnerRef::new("tok", "ns"), &token()).await.is_err());
    assert_eq!(cluster.updates.load(Ordering::SeqCst), 0);
}
