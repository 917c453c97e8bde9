//! Authorization flow engine
//!
//! Three mutually exclusive ways to obtain the initial token pair:
//!
//! - **Local callback**: browser redirects to a loopback listener we run.
//! - **Manual paste**: redirect target is some other host; the operator
//!   pastes the redirect URL (or bare code) back into the terminal.
//! - **Two-step remote**: step 1 persists a CSRF state and prints the URL,
//!   step 2 (a later invocation) validates the pasted redirect against it.
//!
//! Every flow ends in [`token::exchange_code`].

use std::io::Write;
use std::time::Duration;

use rand::RngExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};
use url::Url;

use crate::callback::CallbackListener;
use crate::constants::{LOGIN_TIMEOUT, OAuthEndpoints, PENDING_LOGIN_TTL, SCOPES};
use crate::credentials::{ClientCredentials, CredentialStore, PendingAuthorization, State, TokenPair};
use crate::error::{Error, Result};
use crate::extract::{extract_code, extract_code_and_state, is_loopback};
use crate::token;

/// Which login protocol a `strava auth login` invocation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginMode {
    LocalCallback,
    ManualPaste,
    RemoteStart,
    RemoteComplete(String),
}

impl LoginMode {
    /// A pasted `auth_url` always completes a remote login, with or without
    /// `--remote`.
    pub fn select(redirect_uri: &str, remote: bool, auth_url: Option<&str>) -> Self {
        if let Some(url) = auth_url.filter(|u| !u.is_empty()) {
            return Self::RemoteComplete(url.to_string());
        }
        if remote {
            Self::RemoteStart
        } else if is_loopback(redirect_uri) {
            Self::LocalCallback
        } else {
            Self::ManualPaste
        }
    }
}

/// Build the URL the operator opens to grant access.
pub fn authorization_url(
    endpoints: &OAuthEndpoints,
    client_id: &str,
    redirect_uri: &str,
    state: Option<&str>,
) -> Result<String> {
    let mut url = Url::parse(&endpoints.authorize_url).map_err(|e| {
        Error::InvalidInput(format!(
            "authorize URL {:?}: {e}",
            endpoints.authorize_url
        ))
    })?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("approval_prompt", "auto")
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", SCOPES);
        if let Some(state) = state {
            query.append_pair("state", state);
        }
    }
    Ok(url.into())
}

/// 16 random bytes, hex encoded.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Runs the login flows against one pair of OAuth endpoints.
#[derive(Debug, Clone)]
pub struct Authenticator {
    http: reqwest::Client,
    endpoints: OAuthEndpoints,
    login_timeout: Duration,
    pending_ttl: Duration,
}

impl Authenticator {
    pub fn new(http: reqwest::Client, endpoints: OAuthEndpoints) -> Self {
        Self {
            http,
            endpoints,
            login_timeout: LOGIN_TIMEOUT,
            pending_ttl: PENDING_LOGIN_TTL,
        }
    }

    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    /// Local-callback flow. The listener is bound before the URL is printed
    /// so a busy port fails fast.
    pub async fn login_local<W: Write>(
        &self,
        creds: &ClientCredentials,
        out: &mut W,
    ) -> Result<TokenPair> {
        let redirect_uri = creds.redirect_uri();
        let listener = CallbackListener::bind(redirect_uri).await?;
        let url = authorization_url(&self.endpoints, &creds.client_id, redirect_uri, None)?;

        print_lines(
            out,
            &[
                "Open the following URL in your browser to authorize strava-cli:",
                "",
                &format!("  {url}"),
                "",
                "Waiting for callback...",
            ],
        )?;

        let code = listener.wait(self.login_timeout).await?;
        token::exchange_code(&self.http, &self.endpoints, creds, &code, redirect_uri).await
    }

    /// Manual-paste flow: reads one line from `input`.
    pub async fn login_manual<R, W>(
        &self,
        creds: &ClientCredentials,
        input: &mut R,
        out: &mut W,
    ) -> Result<TokenPair>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let redirect_uri = creds.redirect_uri();
        let url = authorization_url(&self.endpoints, &creds.client_id, redirect_uri, None)?;

        print_lines(
            out,
            &[
                "Open the following URL in your browser to authorize strava-cli:",
                "",
                &format!("  {url}"),
                "",
                "After authorizing, Strava will redirect you to:",
                &format!("  {redirect_uri}?code=<code>&..."),
                "",
            ],
        )?;
        write!(out, "Paste the full redirect URL (or just the code): ")
            .and_then(|()| out.flush())
            .map_err(|e| Error::Io(e.to_string()))?;

        let mut line = String::new();
        input
            .read_line(&mut line)
            .await
            .map_err(|e| Error::Io(format!("reading pasted input: {e}")))?;

        let code = extract_code(line.trim());
        if code.is_empty() {
            return Err(Error::InvalidInput("no authorization code provided".into()));
        }
        token::exchange_code(&self.http, &self.endpoints, creds, &code, redirect_uri).await
    }

    /// Step 1 of the remote flow. Pure: the caller persists the returned
    /// pending authorization.
    pub fn start_remote(
        &self,
        creds: &ClientCredentials,
        now: i64,
    ) -> Result<(PendingAuthorization, String)> {
        let state = generate_state();
        let redirect_uri = creds.redirect_uri().to_string();
        let url = authorization_url(
            &self.endpoints,
            &creds.client_id,
            &redirect_uri,
            Some(&state),
        )?;
        let pending = PendingAuthorization {
            state,
            redirect_uri,
            expires_at: now + self.pending_ttl.as_secs() as i64,
        };
        info!(expires_at = pending.expires_at, "remote login started");
        Ok((pending, url))
    }

    /// Step 2 of the remote flow.
    ///
    /// The pending authorization is removed from `state` and persisted
    /// before the paste is validated, so it can never be used twice.
    /// On success the new tokens are written into `state` and saved.
    pub async fn complete_remote(
        &self,
        creds: &ClientCredentials,
        state: &mut State,
        store: &CredentialStore,
        pasted: &str,
        now: i64,
    ) -> Result<TokenPair> {
        let Some(pending) = state.pending_auth.take() else {
            return Err(Error::NoPendingLogin);
        };
        store.save(state).await?;

        if pending.is_expired(now) {
            info!("pending remote login expired, cleared");
            return Err(Error::PendingLoginExpired);
        }

        let (code, returned_state) = extract_code_and_state(pasted);
        if returned_state.is_empty() {
            return Err(Error::InvalidInput(
                "no state parameter found in URL\n  Hint: paste the full redirect URL, including '&state=...'"
                    .into(),
            ));
        }
        if returned_state != pending.state {
            warn!("remote login state mismatch, pending login discarded");
            return Err(Error::StateMismatch);
        }
        if code.is_empty() {
            return Err(Error::InvalidInput(
                "no authorization code found in URL\n  Hint: paste the full redirect URL, including '?code=...'"
                    .into(),
            ));
        }

        let tokens = token::exchange_code(
            &self.http,
            &self.endpoints,
            creds,
            &code,
            &pending.redirect_uri,
        )
        .await?;
        state.tokens = tokens.clone();
        store.save(state).await?;
        info!("remote login completed");
        Ok(tokens)
    }
}

fn print_lines<W: Write>(out: &mut W, lines: &[&str]) -> Result<()> {
    for line in lines {
        writeln!(out, "{line}").map_err(|e| Error::Io(e.to_string()))?;
    }
    Ok(())
}
