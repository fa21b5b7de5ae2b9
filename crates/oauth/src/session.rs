// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Browser sessions and the flow records they carry.
//!
//! A flow record maps a random flow key to the cluster credential presented
//! at authenticate time. The key travels through the provider inside the
//! signed state; the credential never leaves this process.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::FlowError;

pub const SESSION_COOKIE: &str = "spi_session";

const SESSION_ID_BYTES: usize = 32;

/// Opaque browser session identifier.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Accept only values this service could have generated.
    pub fn parse(value: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(value).ok()?;
        (bytes.len() == SESSION_ID_BYTES).then(|| Self(value.to_owned()))
    }

    /// Find the session cookie among the request's `Cookie` headers.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().strip_prefix(SESSION_COOKIE)?.strip_prefix('='))
            .find_map(Self::parse)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({}..)", self.0.get(..6).unwrap_or_default())
    }
}

/// Attributes of the session cookie.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub max_age: Duration,
    pub secure: bool,
}

impl CookieSettings {
    pub fn set_cookie(&self, id: &SessionId) -> String {
        let mut cookie = format!(
            "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            id.as_str(),
            self.max_age.as_secs()
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Short-lived mapping from `(session, flow key)` to a caller credential.
#[async_trait]
pub trait FlowCorrelationStore: Send + Sync {
    /// Whether the session exists and has not expired.
    async fn is_live(&self, session: &SessionId) -> bool;

    /// Record a flow, creating the session if needed.
    async fn put(&self, session: &SessionId, flow_key: &str, credential: &str);

    /// Remove and return the credential for a flow. A key yields at most once.
    async fn take_once(&self, session: &SessionId, flow_key: &str) -> Result<String, FlowError>;

    /// Drop expired sessions, returning how many were removed.
    async fn sweep_expired(&self) -> usize;
}

struct FlowRecord {
    credential: String,
    created: Instant,
}

struct SessionData {
    flows: HashMap<String, FlowRecord>,
    last_seen: Instant,
    /// Set by the sweeper when it removes the session from the map, so a
    /// writer holding a stale handle retries against a fresh session.
    evicted: bool,
}

struct Session {
    data: Mutex<SessionData>,
}

impl Session {
    fn new() -> Self {
        Self {
            data: Mutex::new(SessionData {
                flows: HashMap::new(),
                last_seen: Instant::now(),
                evicted: false,
            }),
        }
    }
}

/// Process-local [`FlowCorrelationStore`].
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    ttl: Duration,
    max_flows_per_session: usize,
}

impl MemorySessionStore {
    pub const DEFAULT_MAX_FLOWS: usize = 32;

    pub fn new(ttl: Duration) -> Self {
        Self::with_flow_limit(ttl, Self::DEFAULT_MAX_FLOWS)
    }

    /// Beyond `max_flows_per_session` open flows the oldest is dropped.
    pub fn with_flow_limit(ttl: Duration, max_flows_per_session: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
            max_flows_per_session: max_flows_per_session.max(1),
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn get_or_create(&self, id: &SessionId) -> Arc<Session> {
        if let Some(session) = self.get(id).await {
            return session;
        }
        let mut sessions = self.sessions.write().await;
        Arc::clone(sessions.entry(id.clone()).or_insert_with(|| Arc::new(Session::new())))
    }

    fn expired(&self, since: Instant, now: Instant) -> bool {
        now.saturating_duration_since(since) >= self.ttl
    }
}

#[async_trait]
impl FlowCorrelationStore for MemorySessionStore {
    async fn is_live(&self, session: &SessionId) -> bool {
        let Some(session) = self.get(session).await else {
            return false;
        };
        let data = session.data.lock().await;
        !data.evicted && !self.expired(data.last_seen, Instant::now())
    }

    async fn put(&self, session_id: &SessionId, flow_key: &str, credential: &str) {
        loop {
            let session = self.get_or_create(session_id).await;
            let mut data = session.data.lock().await;
            if data.evicted {
                continue;
            }

            let now = Instant::now();
            data.flows.retain(|_, r| !self.expired(r.created, now));
            if data.flows.len() >= self.max_flows_per_session {
                let oldest = data.flows.iter().min_by_key(|(_, r)| r.created).map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    data.flows.remove(&oldest);
                    tracing::debug!(session = ?session_id, "flow limit reached, dropped oldest flow");
                }
            }
            data.flows.insert(
                flow_key.to_owned(),
                FlowRecord { credential: credential.to_owned(), created: now },
            );
            data.last_seen = now;
            return;
        }
    }

    async fn take_once(&self, session_id: &SessionId, flow_key: &str) -> Result<String, FlowError> {
        let session = self.get(session_id).await.ok_or(FlowError::FlowUnknown)?;
        let mut data = session.data.lock().await;
        let now = Instant::now();
        if data.evicted || self.expired(data.last_seen, now) {
            return Err(FlowError::FlowUnknown);
        }

        let record = data.flows.remove(flow_key).ok_or(FlowError::FlowUnknown)?;
        if self.expired(record.created, now) {
            return Err(FlowError::FlowUnknown);
        }
        data.last_seen = now;
        Ok(record.credential)
    }

    async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| {
            // A locked session is in use right now and therefore not idle.
            let Ok(mut data) = session.data.try_lock() else {
                return true;
            };
            if self.expired(data.last_seen, now) {
                data.evicted = true;
                return false;
            }
            true
        });
        before - sessions.len()
    }
}

/// Spawn a background task that periodically drops expired sessions.
pub fn spawn_session_sweeper(
    store: Arc<dyn FlowCorrelationStore>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            let removed = store.sweep_expired().await;
            if removed > 0 {
                tracing::debug!(removed, "swept expired sessions");
            }
        }
    })
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
