//! OAuth token exchange and refresh
//!
//! Handles the two token endpoint interactions:
//! 1. Authorization code exchange (end of every login flow)
//! 2. Token refresh (before API calls once the access token is near expiry)
//!
//! Both POST a form to `OAuthEndpoints::token_url` with different grant
//! types. Strava answers with an absolute `expires_at`, so the response maps
//! directly onto a [`TokenPair`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::OAuthEndpoints;
use crate::credentials::{ClientCredentials, TokenPair};
use crate::error::{Error, Result};

/// Field-level error reported alongside a failed token request.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct FieldError {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub resource: String,
}

/// Response from the token endpoint for both exchange and refresh.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Absolute unix timestamp in seconds
    #[serde(default)]
    pub expires_at: i64,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub errors: Vec<FieldError>,
    #[serde(default)]
    pub message: String,
}

impl From<TokenResponse> for TokenPair {
    fn from(response: TokenResponse) -> Self {
        TokenPair {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: response.expires_at,
            token_type: response.token_type,
        }
    }
}

/// Exchange an authorization code for a token pair.
pub async fn exchange_code(
    client: &reqwest::Client,
    endpoints: &OAuthEndpoints,
    creds: &ClientCredentials,
    code: &str,
    redirect_uri: &str,
) -> Result<TokenPair> {
    post_token(
        client,
        endpoints,
        &[
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.expose().as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ],
    )
    .await
}

/// Mint a new token pair from a refresh token.
pub async fn refresh_token(
    client: &reqwest::Client,
    endpoints: &OAuthEndpoints,
    creds: &ClientCredentials,
    refresh: &str,
) -> Result<TokenPair> {
    post_token(
        client,
        endpoints,
        &[
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.expose().as_str()),
            ("refresh_token", refresh),
            ("grant_type", "refresh_token"),
        ],
    )
    .await
}

async fn post_token(
    client: &reqwest::Client,
    endpoints: &OAuthEndpoints,
    form: &[(&str, &str)],
) -> Result<TokenPair> {
    let grant_type = form
        .iter()
        .find(|(k, _)| *k == "grant_type")
        .map(|(_, v)| *v)
        .unwrap_or_default();
    debug!(url = %endpoints.token_url, grant_type, "posting token request");

    let response = client
        .post(&endpoints.token_url)
        .form(form)
        .send()
        .await
        .map_err(|e| Error::Http(format!("POST {}: {e}", endpoints.token_url)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::Http(format!("read token response: {e}")))?;

    if status != reqwest::StatusCode::OK {
        let message = serde_json::from_str::<TokenResponse>(&body)
            .ok()
            .map(|tr| tr.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| body.trim().to_string());
        return Err(Error::TokenExchange(format!(
            "HTTP {}: {message}",
            status.as_u16()
        )));
    }

    let token: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| Error::TokenExchange(format!("decode response: {e}")))?;
    if token.access_token.is_empty() {
        return Err(Error::TokenExchange("no access_token in response".into()));
    }
    debug!(grant_type, expires_at = token.expires_at, "token endpoint returned new pair");
    Ok(token.into())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::extract::{Form, State};
    use axum::http::StatusCode;
    use axum::routing::post;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    /// Captured form submissions from the mock token endpoint.
    pub(crate) type Calls = Arc<Mutex<Vec<HashMap<String, String>>>>;

    /// Start a mock token endpoint that records every form it receives and
    /// answers with the given status and JSON body.
    pub(crate) async fn start_token_server(
        status: StatusCode,
        body: serde_json::Value,
    ) -> (OAuthEndpoints, Calls) {
        let calls: Calls = Arc::new(Mutex::new(vec![]));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = axum::Router::new()
            .route(
                "/oauth/token",
                post(
                    move |State(calls): State<Calls>,
                          Form(form): Form<HashMap<String, String>>| {
                        let body = body.clone();
                        async move {
                            calls.lock().unwrap().push(form);
                            (status, axum::Json(body))
                        }
                    },
                ),
            )
            .with_state(calls.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let endpoints = OAuthEndpoints {
            authorize_url: format!("http://{addr}/oauth/authorize"),
            token_url: format!("http://{addr}/oauth/token"),
        };
        (endpoints, calls)
    }

    pub(crate) fn test_creds() -> ClientCredentials {
        ClientCredentials::new("12345".into(), "s3cret".into(), String::new())
    }

    fn ok_body() -> serde_json::Value {
        serde_json::json!({
            "token_type": "Bearer",
            "access_token": "at_new",
            "refresh_token": "rt_new",
            "expires_at": 1_900_000_000,
            "expires_in": 21600
        })
    }

    #[test]
    fn token_response_deserializes() {
        let json = r#"{"token_type":"Bearer","access_token":"at_abc","refresh_token":"rt_def","expires_at":1735500000}"#;
        let pair: TokenPair = serde_json::from_str::<TokenResponse>(json).unwrap().into();
        assert_eq!(pair.access_token, "at_abc");
        assert_eq!(pair.refresh_token, "rt_def");
        assert_eq!(pair.expires_at, 1_735_500_000);
        assert_eq!(pair.token_type, "Bearer");
    }

    #[tokio::test]
    async fn exchange_posts_authorization_code_grant() {
        let (endpoints, calls) = start_token_server(StatusCode::OK, ok_body()).await;
        let client = reqwest::Client::new();

        let pair = exchange_code(
            &client,
            &endpoints,
            &test_creds(),
            "code-abc",
            "http://localhost:8089/callback",
        )
        .await
        .unwrap();
        assert_eq!(pair.access_token, "at_new");

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let form = &calls[0];
        assert_eq!(form["grant_type"], "authorization_code");
        assert_eq!(form["code"], "code-abc");
        assert_eq!(form["client_id"], "12345");
        assert_eq!(form["client_secret"], "s3cret");
        assert_eq!(form["redirect_uri"], "http://localhost:8089/callback");
    }

    #[tokio::test]
    async fn refresh_posts_refresh_token_grant() {
        let (endpoints, calls) = start_token_server(StatusCode::OK, ok_body()).await;
        let client = reqwest::Client::new();

        refresh_token(&client, &endpoints, &test_creds(), "rt_old")
            .await
            .unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0]["grant_type"], "refresh_token");
        assert_eq!(calls[0]["refresh_token"], "rt_old");
        assert!(!calls[0].contains_key("code"));
    }

    #[tokio::test]
    async fn non_200_surfaces_server_message() {
        let (endpoints, _) = start_token_server(
            StatusCode::BAD_REQUEST,
            serde_json::json!({
                "message": "Bad Request",
                "errors": [{"resource": "AuthorizationCode", "field": "code", "code": "invalid"}]
            }),
        )
        .await;
        let client = reqwest::Client::new();

        let err = exchange_code(&client, &endpoints, &test_creds(), "bogus", "http://x/cb")
            .await
            .unwrap_err();
        match err {
            Error::TokenExchange(msg) => assert_eq!(msg, "HTTP 400: Bad Request"),
            other => panic!("expected TokenExchange, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_access_token_is_rejected() {
        let (endpoints, _) = start_token_server(
            StatusCode::OK,
            serde_json::json!({"refresh_token": "rt", "expires_at": 1}),
        )
        .await;
        let client = reqwest::Client::new();

        let err = refresh_token(&client, &endpoints, &test_creds(), "rt")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no access_token"), "got: {err}");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_http_error() {
        let endpoints = OAuthEndpoints {
            authorize_url: "http://127.0.0.1:1/oauth/authorize".into(),
            token_url: "http://127.0.0.1:1/oauth/token".into(),
        };
        let client = reqwest::Client::new();

        let err = refresh_token(&client, &endpoints, &test_creds(), "rt")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Http(_)), "got: {err:?}");
    }
}
