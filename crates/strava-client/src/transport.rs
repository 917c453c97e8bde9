//! Resilient authenticated transport
//!
//! Every call goes through [`Transport::send`]:
//! 1. Ensure the access token is fresh
//! 2. Build the request, re-reading the bearer token and regenerating the body
//! 3. On 429 or 5xx, back off and go back to 1, up to `max_retries` times
//! 4. Any other status, or a network error, is returned immediately

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use strava_auth::TokenManager;
use tracing::{Instrument, debug, info_span, warn};

use crate::classify::{StatusClass, classify_status};
use crate::error::{Error, Result};
use crate::request::ApiRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_backoff.saturating_mul(1 << exp)
    }
}

/// A buffered response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        classify_status(self.status) == StatusClass::Success
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| Error::Decode(e.to_string()))
    }
}

#[derive(Clone)]
pub struct Transport {
    http: reqwest::Client,
    tokens: Arc<TokenManager>,
    policy: RetryPolicy,
}

impl Transport {
    pub fn new(http: reqwest::Client, tokens: Arc<TokenManager>, policy: RetryPolicy) -> Self {
        Self {
            http,
            tokens,
            policy,
        }
    }

    /// Send `request` with refresh, bearer injection and retries.
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
        let span = info_span!(
            "api_request",
            request_id = %request_id,
            method = %request.method(),
            url = %request.url()
        );
        self.send_with_retries(request).instrument(span).await
    }

    async fn send_with_retries(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut attempt = 0;
        loop {
            // Before every attempt: the token may expire during a backoff
            self.tokens.ensure_fresh().await?;
            let bearer = self.tokens.access_token().await;

            let response = request
                .build(&self.http, &bearer)
                .send()
                .await
                .map_err(|e| Error::Network(e.to_string()))?;
            let status = response.status().as_u16();
            let body = response
                .bytes()
                .await
                .map_err(|e| Error::Network(format!("read response body: {e}")))?;
            debug!(attempt, status, bytes = body.len(), "api response");

            if classify_status(status) != StatusClass::Retryable {
                return Ok(ApiResponse { status, body });
            }
            if attempt == self.policy.max_retries {
                warn!(status, retries = attempt, "retries exhausted");
                return Err(Error::RetriesExhausted {
                    status,
                    retries: attempt,
                });
            }

            attempt += 1;
            let backoff = self.policy.backoff(attempt);
            warn!(
                attempt,
                status,
                backoff_ms = backoff.as_millis() as u64,
                "retryable status, backing off"
            );
            tokio::time::sleep(backoff).await;
        }
    }
}
