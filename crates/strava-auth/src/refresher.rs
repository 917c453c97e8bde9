//! Token refresher
//!
//! [`TokenManager`] owns the loaded credential state for one command
//! invocation. The transport calls [`TokenManager::ensure_fresh`] before
//! every attempt and reads the bearer token with
//! [`TokenManager::access_token`] right after, so a rotation in the middle
//! of a retry loop is picked up by the next attempt.

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::constants::{OAuthEndpoints, REFRESH_BUFFER_SECS, unix_now};
use crate::credentials::{ClientCredentials, CredentialStore, State, TokenPair};
use crate::error::{Error, Result};
use crate::token;

/// Whether `tokens` must be refreshed before use at time `now`.
pub fn needs_refresh(tokens: &TokenPair, now: i64) -> bool {
    !(now + REFRESH_BUFFER_SECS < tokens.expires_at)
}

pub struct TokenManager {
    http: reqwest::Client,
    endpoints: OAuthEndpoints,
    store: CredentialStore,
    state: Mutex<State>,
}

impl TokenManager {
    pub fn new(
        http: reqwest::Client,
        endpoints: OAuthEndpoints,
        store: CredentialStore,
        state: State,
    ) -> Self {
        Self {
            http,
            endpoints,
            store,
            state: Mutex::new(state),
        }
    }

    /// Refresh the access token if it is expired or about to be.
    pub async fn ensure_fresh(&self) -> Result<()> {
        self.ensure_fresh_at(unix_now()).await
    }

    /// [`Self::ensure_fresh`] against an explicit clock.
    pub async fn ensure_fresh_at(&self, now: i64) -> Result<()> {
        // Held across the exchange so two callers never refresh twice
        let mut state = self.state.lock().await;
        if !state.tokens.is_authenticated() {
            return Err(Error::NotAuthenticated);
        }
        if !needs_refresh(&state.tokens, now) {
            return Ok(());
        }

        let creds = ClientCredentials::from_state(&state).ok_or_else(|| {
            Error::MissingCredentials(
                "stored client ID or secret is empty; run: strava auth login".into(),
            )
        })?;
        debug!(expires_at = state.tokens.expires_at, now, "access token expiring, refreshing");

        let tokens = token::refresh_token(
            &self.http,
            &self.endpoints,
            &creds,
            &state.tokens.refresh_token,
        )
        .await
        .map_err(|e| {
            warn!(error = %e, "token refresh failed");
            Error::SessionRevoked(e.to_string())
        })?;

        state.tokens = tokens;
        self.store.save(&state).await?;
        info!(expires_at = state.tokens.expires_at, "access token refreshed");
        Ok(())
    }

    /// Current access token, re-read on every call.
    pub async fn access_token(&self) -> String {
        self.state.lock().await.tokens.access_token.clone()
    }

    pub async fn snapshot(&self) -> State {
        self.state.lock().await.clone()
    }
}
