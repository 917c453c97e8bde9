//! Error types for authentication operations
//!
//! Every variant that the operator can act on carries the remediation in its
//! message; the binary prints these verbatim.

/// Errors from login, token exchange, refresh and credential storage.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("not authenticated\n  Hint: run: strava auth login")]
    NotAuthenticated,

    #[error(
        "refresh token: {0}\n  Hint: your session may have been revoked; run: strava auth login"
    )]
    SessionRevoked(String),

    #[error("missing client credentials: {0}")]
    MissingCredentials(String),

    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("start callback server on port {port}: {reason}\n  Hint: ensure port {port} is free")]
    CallbackBind { port: u16, reason: String },

    #[error("authorization timed out after {0} seconds")]
    CallbackTimeout(u64),

    #[error("callback listener failed: {0}")]
    Callback(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no pending login found\n  Hint: run 'strava auth login --remote' first")]
    NoPendingLogin,

    #[error("auth URL expired\n  Hint: run 'strava auth login --remote' again to get a fresh one")]
    PendingLoginExpired,

    #[error(
        "state mismatch: possible CSRF attack or stale URL\n  Hint: run 'strava auth login --remote' again to get a fresh URL"
    )]
    StateMismatch,

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remediation_is_part_of_the_message() {
        assert!(Error::NoPendingLogin.to_string().contains("--remote"));
        assert!(Error::StateMismatch.to_string().contains("CSRF"));
        assert!(
            Error::SessionRevoked("HTTP 401".into())
                .to_string()
                .contains("strava auth login")
        );
    }

    #[test]
    fn bind_failure_names_the_port() {
        let err = Error::CallbackBind {
            port: 8089,
            reason: "address in use".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("port 8089"), "got: {msg}");
        assert!(msg.contains("address in use"));
    }
}
