// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-provider OAuth flow driver.
//!
//! `authenticate` checks the caller against the cluster, parks its credential
//! in the browser session under a fresh flow key and sends the browser to the
//! provider. `callback` resolves the flow key, exchanges the code and stores
//! the resulting token for the `SPIAccessToken` named in the state.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};

use crate::config::ProviderConfig;
use crate::error::FlowError;
use crate::exchange::{CodeExchanger, ExchangeRequest, TokenResponse};
use crate::gate::AuthorizationGate;
use crate::kube::ClusterClient;
use crate::oauthstate::{AnonymousFlowState, KeyedFlowState, StateCodec, StateError};
use crate::persist::TokenPersister;
use crate::provider::{build_auth_url, ProviderEndpoint, ServiceProviderType};
use crate::session::{FlowCorrelationStore, SessionId};
use crate::storage::{OwnerRef, TokenStorage};

/// Where a flow currently is. Logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowPhase {
    Start,
    StateIssued,
    AwaitingProvider,
    StateReturned,
    FlowResolved,
    Exchanged,
    Persisted,
    StateInvalid,
    AuthDenied,
    FlowUnknown,
    ExchangeFailed,
    PersistFailed,
}

impl FlowPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::StateIssued => "state_issued",
            Self::AwaitingProvider => "awaiting_provider",
            Self::StateReturned => "state_returned",
            Self::FlowResolved => "flow_resolved",
            Self::Exchanged => "exchanged",
            Self::Persisted => "persisted",
            Self::StateInvalid => "state_invalid",
            Self::AuthDenied => "auth_denied",
            Self::FlowUnknown => "flow_unknown",
            Self::ExchangeFailed => "exchange_failed",
            Self::PersistFailed => "persist_failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::StateInvalid
                | Self::AuthDenied
                | Self::FlowUnknown
                | Self::ExchangeFailed
                | Self::PersistFailed
        )
    }
}

impl fmt::Display for FlowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capabilities shared by every provider's controller.
#[derive(Clone)]
pub struct FlowServices {
    pub codec: Arc<StateCodec>,
    pub sessions: Arc<dyn FlowCorrelationStore>,
    pub cluster: Arc<dyn ClusterClient>,
    pub exchanger: Arc<dyn CodeExchanger>,
    pub storage: Arc<dyn TokenStorage>,
    pub base_url: String,
    pub request_timeout: Duration,
}

pub struct AuthenticateRequest<'a> {
    pub state: Option<&'a str>,
    /// Raw `Authorization` header value.
    pub authorization: Option<&'a str>,
    pub session: Option<SessionId>,
}

#[derive(Default)]
pub struct CallbackRequest<'a> {
    pub state: Option<&'a str>,
    pub code: Option<&'a str>,
    pub scope: Option<&'a str>,
    pub redirect_after_login: Option<&'a str>,
    pub error: Option<&'a str>,
    pub error_description: Option<&'a str>,
    pub session: Option<SessionId>,
}

/// A successful step: send the browser to `location`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub location: String,
    /// Session cookie to set, when one was issued or refreshed.
    pub session: Option<SessionId>,
}

/// Token obtained for a resolved flow.
pub struct Exchanged {
    pub token: TokenResponse,
    pub credential: String,
    pub state: AnonymousFlowState,
}

pub enum ExchangeOutcome {
    Authenticated(Exchanged),
    /// The flow key did not resolve in this session.
    AuthRequired,
    Failed(FlowError),
}

pub struct Controller {
    kind: ServiceProviderType,
    provider: ProviderConfig,
    endpoint: ProviderEndpoint,
    redirect_uri: String,
    services: FlowServices,
    gate: AuthorizationGate,
    persister: TokenPersister,
}

impl Controller {
    pub fn new(provider: ProviderConfig, services: FlowServices) -> Self {
        let endpoint = provider.endpoint();
        let redirect_uri = provider.redirect_url(&services.base_url);
        Self {
            kind: provider.kind,
            gate: AuthorizationGate::new(Arc::clone(&services.cluster)),
            persister: TokenPersister::new(Arc::clone(&services.storage)),
            provider,
            endpoint,
            redirect_uri,
            services,
        }
    }

    pub fn kind(&self) -> ServiceProviderType {
        self.kind
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    fn phase(&self, phase: FlowPhase) {
        tracing::debug!(provider = %self.kind, phase = %phase, "oauth flow transition");
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.services.request_timeout
    }

    pub async fn authenticate(&self, req: AuthenticateRequest<'_>) -> Result<Redirect, FlowError> {
        self.phase(FlowPhase::Start);
        let deadline = self.deadline();

        let state = req
            .state
            .filter(|s| !s.is_empty())
            .ok_or(StateError::Missing)
            .and_then(|s| self.services.codec.decode_anonymous(s))
            .map_err(|e| {
                self.phase(FlowPhase::StateInvalid);
                FlowError::from(e)
            })?;
        owner_of(&state).validate().map_err(|e| {
            self.phase(FlowPhase::StateInvalid);
            FlowError::InvalidState(e)
        })?;

        let credential = extract_bearer(req.authorization).inspect_err(|e| match e {
            FlowError::AuthorizationDenied(_) => self.phase(FlowPhase::AuthDenied),
            _ => self.phase(FlowPhase::StateInvalid),
        })?;

        let allowed = timeout_at(
            deadline,
            self.gate.can_create_token_record(credential, &state.token_namespace),
        )
        .await
        .map_err(|_| FlowError::Internal("authorization check timed out".into()))?
        .map_err(|e| {
            tracing::error!(provider = %self.kind, err = %e, "authorization check failed");
            FlowError::Internal("failed to determine if the caller has access".into())
        })?;
        if !allowed {
            self.phase(FlowPhase::AuthDenied);
            return Err(FlowError::AuthorizationDenied(format!(
                "not allowed to store tokens in namespace {}",
                state.token_namespace
            )));
        }

        // Unknown or expired ids are never adopted.
        let live = match &req.session {
            Some(id) => self.services.sessions.is_live(id).await,
            None => false,
        };
        let session = match req.session {
            Some(id) if live => id,
            _ => SessionId::generate(),
        };
        let flow_key = uuid::Uuid::new_v4().to_string();
        self.services.sessions.put(&session, &flow_key, credential).await;

        let scopes = state.scopes.clone();
        let keyed = KeyedFlowState { state, flow_key };
        let encoded = self
            .services
            .codec
            .encode_keyed(&keyed)
            .map_err(|e| FlowError::Internal(format!("encoding state: {e}")))?;
        self.phase(FlowPhase::StateIssued);

        let location = build_auth_url(
            &self.endpoint.auth_url,
            &self.provider.client_id,
            &self.redirect_uri,
            &scopes,
            &encoded,
        );
        self.phase(FlowPhase::AwaitingProvider);
        tracing::info!(
            provider = %self.kind,
            token = %owner_of(&keyed.state),
            "redirecting to provider consent"
        );
        Ok(Redirect { location, session: Some(session) })
    }

    /// Resolve the flow and exchange the code, without persisting anything.
    pub async fn finish_exchange(&self, req: &CallbackRequest<'_>, deadline: Instant) -> ExchangeOutcome {
        let keyed = match req
            .state
            .filter(|s| !s.is_empty())
            .ok_or(StateError::Missing)
            .and_then(|s| self.services.codec.decode_keyed(s))
        {
            Ok(keyed) => keyed,
            Err(e) => {
                self.phase(FlowPhase::StateInvalid);
                return ExchangeOutcome::Failed(e.into());
            }
        };
        if let Err(e) = owner_of(&keyed.state).validate() {
            self.phase(FlowPhase::StateInvalid);
            return ExchangeOutcome::Failed(FlowError::InvalidState(e));
        }
        self.phase(FlowPhase::StateReturned);

        let Some(session) = req.session.as_ref() else {
            self.phase(FlowPhase::FlowUnknown);
            return ExchangeOutcome::AuthRequired;
        };
        let credential = match self.services.sessions.take_once(session, &keyed.flow_key).await {
            Ok(credential) => credential,
            Err(_) => {
                self.phase(FlowPhase::FlowUnknown);
                return ExchangeOutcome::AuthRequired;
            }
        };
        self.phase(FlowPhase::FlowResolved);

        if let Some(error) = req.error.filter(|e| !e.is_empty()) {
            self.phase(FlowPhase::ExchangeFailed);
            let description = req.error_description.unwrap_or_default();
            return ExchangeOutcome::Failed(FlowError::UpstreamExchangeFailed(format!(
                "provider returned {error}: {description}"
            )));
        }
        let Some(code) = req.code.filter(|c| !c.is_empty()) else {
            self.phase(FlowPhase::ExchangeFailed);
            return ExchangeOutcome::Failed(FlowError::UpstreamExchangeFailed(
                "callback carried no authorization code".into(),
            ));
        };

        let request = ExchangeRequest {
            token_url: &self.endpoint.token_url,
            client_id: &self.provider.client_id,
            client_secret: &self.provider.client_secret,
            redirect_uri: &self.redirect_uri,
            code,
            scope: req.scope.filter(|s| !s.is_empty()),
        };
        let token = match timeout_at(deadline, self.services.exchanger.exchange(&request)).await {
            Ok(Ok(token)) => token,
            Ok(Err(e)) => {
                self.phase(FlowPhase::ExchangeFailed);
                return ExchangeOutcome::Failed(FlowError::UpstreamExchangeFailed(format!(
                    "error in service provider token exchange: {e}"
                )));
            }
            Err(_) => {
                self.phase(FlowPhase::ExchangeFailed);
                return ExchangeOutcome::Failed(FlowError::UpstreamExchangeFailed(
                    "service provider token exchange timed out".into(),
                ));
            }
        };
        self.phase(FlowPhase::Exchanged);

        ExchangeOutcome::Authenticated(Exchanged { token, credential, state: keyed.state })
    }

    pub async fn callback(&self, req: CallbackRequest<'_>) -> Result<Redirect, FlowError> {
        let deadline = self.deadline();
        let exchanged = match self.finish_exchange(&req, deadline).await {
            ExchangeOutcome::Authenticated(exchanged) => exchanged,
            ExchangeOutcome::AuthRequired => return Err(FlowError::FlowUnknown),
            ExchangeOutcome::Failed(e) => return Err(e),
        };

        self.sync_token(&exchanged, deadline)
            .await
            .inspect_err(|_| self.phase(FlowPhase::PersistFailed))?;
        self.phase(FlowPhase::Persisted);
        tracing::info!(
            provider = %self.kind,
            token = %owner_of(&exchanged.state),
            "token stored"
        );

        let location = req
            .redirect_after_login
            .and_then(safe_redirect)
            .map(String::from)
            .unwrap_or_else(|| format!("{}/callback_success", self.services.base_url));
        Ok(Redirect { location, session: None })
    }

    async fn sync_token(&self, exchanged: &Exchanged, deadline: Instant) -> Result<(), FlowError> {
        let owner = owner_of(&exchanged.state);

        let object = timeout_at(
            deadline,
            self.services.cluster.get_access_token(&exchanged.credential, &owner),
        )
        .await
        .map_err(|_| FlowError::PersistFailed("reading the token object timed out".into()))?
        .map_err(|e| FlowError::PersistFailed(format!("failed to read token object: {e}")))?;
        let owner = OwnerRef::new(object.name, object.namespace);

        timeout_at(deadline, self.persister.store(&exchanged.credential, &owner, &exchanged.token))
            .await
            .map_err(|_| FlowError::PersistFailed("storing the token timed out".into()))?
            .map_err(|e| FlowError::PersistFailed(format!("failed to store token data: {e}")))
    }
}

fn owner_of(state: &AnonymousFlowState) -> OwnerRef {
    OwnerRef::new(&state.token_name, &state.token_namespace)
}

/// Pull the credential out of an `Authorization: Bearer <credential>` header.
///
/// An absent header is a denial; anything present but unusable is a
/// malformed request.
pub fn extract_bearer(header: Option<&str>) -> Result<&str, FlowError> {
    let Some(header) = header else {
        return Err(FlowError::AuthorizationDenied("no bearer credential presented".into()));
    };
    let (scheme, credential) = header
        .trim()
        .split_once(' ')
        .ok_or_else(|| FlowError::InvalidState("malformed authorization header".into()))?;
    let credential = credential.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || credential.is_empty() || credential.contains(' ') {
        return Err(FlowError::InvalidState("malformed authorization header".into()));
    }
    Ok(credential)
}

/// Accept post-login redirects to local paths or http(s) URLs only.
pub fn safe_redirect(target: &str) -> Option<&str> {
    if target.is_empty() || target.chars().any(|c| c.is_control() || c == '\\') {
        return None;
    }
    if target.starts_with('/') {
        return (!target.starts_with("//")).then_some(target);
    }
    let rest = target.strip_prefix("https://").or_else(|| target.strip_prefix("http://"))?;
    (!rest.is_empty() && !rest.starts_with('/')).then_some(target)
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
