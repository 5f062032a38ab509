//! Authenticated API client
//!
//! Every request reads the access token from the credential store right
//! before it is sent and carries it as a bearer token. A 401 on a
//! non-exempt path starts the recovery protocol:
//!
//! 1. Exempt path (login, register, refresh, ...): return the 401 as is
//! 2. No refresh token stored: clear the session, notify, return the 401
//! 3. Stored token differs from the one sent: a refresh already finished,
//!    replay with the stored token
//! 4. Refresh already running: wait for it, then replay with its token
//! 5. Otherwise: lead the refresh, publish the outcome to the waiters,
//!    replay the original request with the new token
//!
//! Replays are never intercepted again, so each request is retried at most
//! once and a burst of 401s costs exactly one refresh call.

use std::sync::Arc;
use std::time::Duration;

use common::Secret;
use medkit_auth::{TokenResponse, TokenStore, api_url};
use reqwest::StatusCode;
use tracing::{debug, info, instrument, warn};

use crate::config::ClientConfig;
use crate::error::{ApiErrorBody, Error, Result};
use crate::metrics;
use crate::refresh::{RefreshGate, RefreshOutcome, Ticket};
use crate::request::{ApiRequest, ApiResponse};
use crate::session::SessionObserver;

/// HTTP client for the medkit API with transparent token refresh.
///
/// Share it across tasks behind an `Arc`. Refresh state belongs to the
/// instance, so two clients never wait on each other's refresh.
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
    store: Arc<dyn TokenStore>,
    gate: RefreshGate,
    observer: Option<Arc<dyn SessionObserver>>,
}

impl ApiClient {
    pub fn new(config: ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("building HTTP client: {e}")))?;
        info!(base_url = %config.base_url, "api client initialized");
        Ok(Self {
            http,
            config,
            store,
            gate: RefreshGate::new(),
            observer: None,
        })
    }

    /// Register the hook called when the session cannot be recovered.
    pub fn with_session_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Whether a credential pair is stored.
    pub async fn is_authenticated(&self) -> bool {
        self.store.get().await.is_some()
    }

    /// Whether a token refresh is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.gate.is_refreshing()
    }

    /// Requests currently queued behind the in-flight refresh.
    pub fn queued_requests(&self) -> usize {
        self.gate.waiting()
    }

    /// Persist the pair returned by login.
    pub async fn store_tokens(&self, tokens: &TokenResponse) -> Result<()> {
        self.store.set(tokens.credential_pair()).await?;
        Ok(())
    }

    /// Drop the stored pair (logout, account deletion).
    pub async fn clear_session(&self) -> Result<()> {
        self.store.clear().await?;
        Ok(())
    }

    /// Send `request`, refreshing the session once if it answers 401.
    #[instrument(
        skip_all,
        fields(
            request_id = %uuid::Uuid::new_v4(),
            method = %request.method,
            path = %request.path,
        )
    )]
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let sent = self.store.get().await.map(|pair| pair.access_token);
        let response = self.dispatch(&request, sent.as_ref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return finish(&request, response).await;
        }

        let failure = failure_from(&request, response).await;
        self.recover(request, sent, failure).await
    }

    /// Send `request` and decode the JSON answer.
    pub async fn execute_json<T: serde::de::DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<T> {
        self.execute(request).await?.json()
    }

    /// `sent` is the access token the failed attempt carried.
    async fn recover(
        &self,
        request: ApiRequest,
        sent: Option<Secret<String>>,
        failure: Error,
    ) -> Result<ApiResponse> {
        if self.config.is_exempt(&request.path) {
            debug!("401 from exempt endpoint, not refreshing");
            return Err(failure);
        }

        let Some(pair) = self.store.get().await else {
            // If the attempt carried a token, whoever cleared the store has
            // already notified the observer.
            if sent.is_none() {
                warn!("401 with no refresh token stored, ending session");
                self.end_session().await;
            } else {
                debug!("session ended while request was in flight");
            }
            return Err(failure);
        };

        // The stored token moved on since this attempt was sent: a refresh
        // of the same burst already finished, so reuse its token.
        if sent.as_ref() != Some(&pair.access_token) {
            debug!("token refreshed while request was in flight, replaying");
            let response = self.dispatch(&request, Some(&pair.access_token)).await?;
            return finish(&request, response).await;
        }

        let access = match self.gate.begin() {
            Ticket::Wait(waiter) => waiter.outcome().await?,
            Ticket::Lead(lease) => {
                let outcome = self.refresh(pair.refresh_token.expose()).await;
                if outcome.is_err() {
                    self.end_session().await;
                }
                let waiters = lease.settle(&outcome);
                debug!(waiters, "refresh settled");
                outcome?
            }
        };

        debug!("replaying request with refreshed token");
        let response = self.dispatch(&request, Some(&access)).await?;
        finish(&request, response).await
    }

    /// Call the refresh endpoint and persist the new pair on success.
    async fn refresh(&self, refresh_token: &str) -> RefreshOutcome {
        match medkit_auth::refresh_token(&self.http, &self.config.base_url, refresh_token).await {
            Ok(tokens) => {
                metrics::record_refresh(true);
                // The new token is still used for the replays even if it
                // could not be written down.
                if let Err(e) = self.store.set(tokens.credential_pair()).await {
                    warn!(error = %e, "failed to persist refreshed tokens");
                }
                info!("token refresh succeeded");
                Ok(Secret::new(tokens.access_token))
            }
            Err(e) => {
                metrics::record_refresh(false);
                warn!(error = %e, "token refresh failed");
                Err(e.into())
            }
        }
    }

    /// Clear the stored pair and tell the observer the session is over.
    async fn end_session(&self) {
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "failed to clear session tokens");
        }
        if let Some(observer) = &self.observer {
            observer.session_expired();
        }
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&Secret<String>>,
    ) -> Result<reqwest::Response> {
        let url = api_url(&self.config.base_url, &request.path);
        let mut builder = self.http.request(request.method.clone(), &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token.expose());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Http(format!("{} {}: {e}", request.method, request.path)))?;

        let status = response.status();
        metrics::record_response(status.as_u16());
        debug!(%status, authorized = token.is_some(), "response received");
        Ok(response)
    }
}

/// Buffer a successful response or turn a failed one into `Error::Api`.
async fn finish(request: &ApiRequest, response: reqwest::Response) -> Result<ApiResponse> {
    let status = response.status();
    if !status.is_success() {
        return Err(failure_from(request, response).await);
    }
    let body = response
        .bytes()
        .await
        .map_err(|e| Error::Http(format!("reading {} response body: {e}", request.path)))?;
    Ok(ApiResponse { status, body })
}

async fn failure_from(request: &ApiRequest, response: reqwest::Response) -> Error {
    let status = response.status();
    let body = response.bytes().await.unwrap_or_default();
    let details: Option<ApiErrorBody> = serde_json::from_slice(&body).ok();
    let message = details
        .as_ref()
        .and_then(|d| d.message.clone())
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| String::from("request failed"));

    Error::Api {
        status: status.as_u16(),
        path: request.path.clone(),
        message,
        details,
    }
}
