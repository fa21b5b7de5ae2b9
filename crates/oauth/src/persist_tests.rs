// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::storage::memory::MemoryTokenStorage;

fn response(token_type: Option<&str>, expires_in: Option<u64>, refresh: Option<&str>) -> TokenResponse {
    TokenResponse {
        access_token: "gho_abc".into(),
        token_type: token_type.map(String::from),
        refresh_token: refresh.map(String::from),
        expires_in,
    }
}

#[yare::parameterized(
    relative_expiry = { Some(3600), 1_700_003_600 },
    no_expiry = { None, 0 },
    zero_expiry = { Some(0), 0 },
)]
fn expiry_is_absolute(expires_in: Option<u64>, expected: u64) {
    let token = TokenPersister::to_persisted(&response(None, expires_in, None), 1_700_000_000);
    assert_eq!(token.expiry, expected);
}

#[yare::parameterized(
    missing = { None, "bearer" },
    empty = { Some(""), "bearer" },
    given = { Some("Bearer"), "Bearer" },
)]
fn token_type_defaults_to_bearer(given: Option<&str>, expected: &str) {
    let token = TokenPersister::to_persisted(&response(given, None, None), 0);
    assert_eq!(token.token_type, expected);
}

#[test]
fn refresh_token_is_kept() {
    let token = TokenPersister::to_persisted(&response(None, None, Some("ghr_x")), 0);
    assert_eq!(token.refresh_token.as_deref(), Some("ghr_x"));
    let token = TokenPersister::to_persisted(&response(None, None, Some("")), 0);
    assert_eq!(token.refresh_token, None);
}

#[tokio::test]
async fn store_writes_against_owner() -> anyhow::Result<()> {
    let memory = Arc::new(MemoryTokenStorage::new());
    let persister = TokenPersister::new(memory.clone());
    let owner = OwnerRef::new("my-token", "team-a");

    persister.store("caller", &owner, &response(Some("bearer"), Some(60), None)).await?;

    let stored = memory.get(&owner).await.ok_or_else(|| anyhow::anyhow!("nothing stored"))?;
    assert_eq!(stored.access_token, "gho_abc");
    assert!(stored.expiry > crate::state::epoch_secs());
    Ok(())
}
