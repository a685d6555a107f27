use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::error::{upstream_message, VectraApiError};
use super::retry::RetryPolicy;
use crate::config::Credential;

const DEFAULT_TOKEN_LIFETIME: u64 = 3600;

/// A bearer token handed out for a single upstream request.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    value: String,
    expires_at: Instant,
}

impl SessionToken {
    pub fn new(value: impl Into<String>, expires_at: Instant) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    fn is_fresh(&self, margin: Duration) -> bool {
        self.expires_at > Instant::now() + margin
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    token_type: Option<String>,
}

/// Result of the most recent exchange, kept for callers that queued on it.
#[derive(Default)]
struct RefreshOutcome {
    generation: u64,
    failure: Option<VectraApiError>,
}

/// Owns the upstream credential and the process-wide token cache.
///
/// Readers of a fresh token only take the read lock. A refresh is serialized
/// behind `refresh_gate`. Callers that queued behind a refresh take its
/// outcome, the new token or the same failure, instead of issuing their own
/// exchange.
pub struct SessionManager {
    http: Client,
    credential: Credential,
    policy: RetryPolicy,
    refresh_margin: Duration,
    cached: RwLock<Option<SessionToken>>,
    refreshes: AtomicU64,
    refresh_gate: Mutex<RefreshOutcome>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("credential", &self.credential)
            .field("policy", &self.policy)
            .field("refresh_margin", &self.refresh_margin)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(
        http: Client,
        credential: Credential,
        policy: RetryPolicy,
        refresh_margin: Duration,
    ) -> Self {
        Self {
            http,
            credential,
            policy,
            refresh_margin,
            cached: RwLock::new(None),
            refreshes: AtomicU64::new(0),
            refresh_gate: Mutex::new(RefreshOutcome::default()),
        }
    }

    /// Returns a token whose expiry lies beyond the refresh margin.
    pub async fn get_valid_token(&self) -> Result<SessionToken, VectraApiError> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let observed = self.refreshes.load(Ordering::Acquire);
        let mut outcome = self.refresh_gate.lock().await;
        if let Some(token) = self.cached_token() {
            debug!("Reusing token refreshed by a concurrent caller");
            return Ok(token);
        }
        if outcome.generation != observed {
            if let Some(failure) = &outcome.failure {
                debug!(error = %failure, "Concurrent token refresh failed, sharing its error");
                return Err(replay(failure));
            }
        }

        let result = self.exchange().await;
        outcome.generation += 1;
        self.refreshes.store(outcome.generation, Ordering::Release);
        match result {
            Ok(token) => {
                outcome.failure = None;
                *self.cached.write().unwrap_or_else(|e| e.into_inner()) = Some(token.clone());
                Ok(token)
            }
            Err(e) => {
                outcome.failure = Some(replay(&e));
                Err(e)
            }
        }
    }

    /// Drops the cached token if it is still the one the caller saw rejected.
    pub fn invalidate(&self, stale: &SessionToken) {
        let mut cached = self.cached.write().unwrap_or_else(|e| e.into_inner());
        if cached.as_ref().map(|t| t.value == stale.value).unwrap_or(false) {
            debug!("Invalidating rejected session token");
            *cached = None;
        }
    }

    fn cached_token(&self) -> Option<SessionToken> {
        let cached = self.cached.read().unwrap_or_else(|e| e.into_inner());
        cached
            .as_ref()
            .filter(|t| t.is_fresh(self.refresh_margin))
            .cloned()
    }

    async fn exchange(&self) -> Result<SessionToken, VectraApiError> {
        let token_url = self.credential.token_url();
        let mut attempt = 1;

        loop {
            debug!(%token_url, attempt, "Requesting Vectra access token");
            let sent = self
                .http
                .post(&token_url)
                .header(AUTHORIZATION, format!("Token {}", self.credential.api_key))
                .header(ACCEPT, "application/json")
                .form(&[("grant_type", "client_credentials")])
                .send()
                .await;

            let failure = match sent {
                Ok(response) if response.status().is_success() => {
                    let status = response.status().as_u16();
                    match response.bytes().await {
                        Ok(bytes) => return issue_token(status, &bytes),
                        Err(e) => format!("failed to read token response: {}", e),
                    }
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let message = upstream_message(&response.text().await.unwrap_or_default());
                    if !self.policy.is_retryable(status) {
                        warn!(status, %message, "Vectra rejected the API credential");
                        return Err(VectraApiError::AuthenticationError { status, message });
                    }
                    format!("token endpoint returned {}: {}", status, message)
                }
                Err(e) => e.to_string(),
            };

            if !self.policy.can_retry(attempt) {
                warn!(attempt, error = %failure, "Token refresh failed, giving up");
                return Err(VectraApiError::Network {
                    attempts: attempt,
                    message: failure,
                });
            }
            let delay = self.policy.backoff(attempt);
            warn!(attempt, delay_ms = delay.as_millis() as u64, error = %failure, "Token refresh failed, retrying");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Turns a successful token endpoint body into a token that is still valid
/// when handed out.
fn issue_token(status: u16, body: &[u8]) -> Result<SessionToken, VectraApiError> {
    let body: TokenResponse =
        serde_json::from_slice(body).map_err(|e| VectraApiError::AuthenticationError {
            status,
            message: format!("malformed token response: {}", e),
        })?;
    if body.access_token.trim().is_empty() {
        return Err(VectraApiError::AuthenticationError {
            status,
            message: "token response carried an empty access_token".to_string(),
        });
    }
    if let Some(kind) = body.token_type.as_deref() {
        if !kind.eq_ignore_ascii_case("bearer") {
            warn!(token_type = %kind, "Unexpected token type from Vectra");
        }
    }
    let lifetime = body.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME);
    if lifetime == 0 {
        warn!("Vectra issued an already expired token");
        return Err(VectraApiError::AuthenticationError {
            status,
            message: "token response has expires_in of 0".to_string(),
        });
    }
    info!(expires_in = lifetime, "Obtained Vectra access token");
    Ok(SessionToken::new(
        body.access_token,
        Instant::now() + Duration::from_secs(lifetime),
    ))
}

/// Copies a refresh failure for a caller that waited on the same exchange.
fn replay(failure: &VectraApiError) -> VectraApiError {
    match failure {
        VectraApiError::AuthenticationError { status, message } => {
            VectraApiError::AuthenticationError {
                status: *status,
                message: message.clone(),
            }
        }
        VectraApiError::Network { attempts, message } => VectraApiError::Network {
            attempts: *attempts,
            message: message.clone(),
        },
        other => VectraApiError::Network {
            attempts: 1,
            message: other.to_string(),
        },
    }
}
