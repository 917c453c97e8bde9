//! Strava OAuth constants
//!
//! Endpoint URLs are defaults only. Every component that talks to them takes
//! an [`OAuthEndpoints`] value so tests can point at a local mock server.

use std::time::Duration;

/// Authorization endpoint the operator opens in a browser
pub const AUTHORIZE_ENDPOINT: &str = "https://www.strava.com/oauth/authorize";

/// Token endpoint for code exchange and token refresh
pub const TOKEN_ENDPOINT: &str = "https://www.strava.com/oauth/token";

/// Scopes requested on every login. `activity:write` is needed for uploads
/// and activity updates.
pub const SCOPES: &str = "activity:read_all,activity:write";

/// Host, port and path of the default loopback redirect.
pub const CALLBACK_HOST: &str = "localhost";
pub const CALLBACK_PORT: u16 = 8089;
pub const CALLBACK_PATH: &str = "/callback";

/// Default redirect URI when none is configured
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8089/callback";

/// Tokens are refreshed this long before `expires_at` to absorb request transit time.
pub const REFRESH_BUFFER_SECS: i64 = 30;

/// Hard ceiling on the local-callback login wait.
pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Lifetime of a pending two-step remote login.
pub const PENDING_LOGIN_TTL: Duration = Duration::from_secs(10 * 60);

/// OAuth endpoint URLs used by the flow engine and the token client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthEndpoints {
    pub authorize_url: String,
    pub token_url: String,
}

impl Default for OAuthEndpoints {
    fn default() -> Self {
        Self {
            authorize_url: AUTHORIZE_ENDPOINT.to_string(),
            token_url: TOKEN_ENDPOINT.to_string(),
        }
    }
}

/// Current unix time in seconds.
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_redirect_matches_callback_parts() {
        assert_eq!(
            DEFAULT_REDIRECT_URI,
            format!("http://{CALLBACK_HOST}:{CALLBACK_PORT}{CALLBACK_PATH}")
        );
    }

    #[test]
    fn default_endpoints_are_strava() {
        let endpoints = OAuthEndpoints::default();
        assert_eq!(endpoints.authorize_url, AUTHORIZE_ENDPOINT);
        assert_eq!(endpoints.token_url, TOKEN_ENDPOINT);
    }
}
