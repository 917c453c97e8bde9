//! Settings and client credential resolution
//!
//! Settings precedence: `--config` > `STRAVA_CLI_CONFIG` > `<config dir>/settings.toml`.
//! A file named explicitly must exist; the default one is optional and every
//! field has a default.
//!
//! Client credentials are separate from settings: `STRAVA_CLIENT_ID`,
//! `STRAVA_CLIENT_SECRET` and `STRAVA_REDIRECT_URI` override what is stored
//! in the credential file, and anything still missing is prompted for.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use strava_auth::{ClientCredentials, OAuthEndpoints, State};
use strava_client::{RetryPolicy, UploadPoller};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

pub const SETTINGS_PATH_ENV: &str = "STRAVA_CLI_CONFIG";
pub const SETTINGS_FILE: &str = "settings.toml";

pub const CLIENT_ID_ENV: &str = "STRAVA_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "STRAVA_CLIENT_SECRET";
pub const REDIRECT_URI_ENV: &str = "STRAVA_REDIRECT_URI";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub api: ApiSettings,
    pub retry: RetrySettings,
    pub poll: PollSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiSettings {
    pub base_url: String,
    pub authorize_url: String,
    pub token_url: String,
    /// Per-request timeout, token endpoint included
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        let endpoints = OAuthEndpoints::default();
        Self {
            base_url: strava_client::DEFAULT_BASE_URL.to_string(),
            authorize_url: endpoints.authorize_url,
            token_url: endpoints.token_url,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_retries: policy.max_retries,
            base_backoff_ms: policy.base_backoff.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollSettings {
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        let poller = UploadPoller::default();
        Self {
            interval_secs: poller.interval.as_secs(),
            timeout_secs: poller.timeout.as_secs(),
        }
    }
}

impl Settings {
    /// Resolve and load the settings file.
    pub fn load(cli_path: Option<&Path>) -> common::Result<Self> {
        let (path, explicit) = Self::resolve_path(cli_path)?;
        if !explicit && !path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }

    /// The settings path and whether it was named explicitly.
    pub fn resolve_path(cli_path: Option<&Path>) -> common::Result<(PathBuf, bool)> {
        if let Some(p) = cli_path {
            return Ok((p.to_path_buf(), true));
        }
        if let Some(p) = std::env::var_os(SETTINGS_PATH_ENV).filter(|v| !v.is_empty()) {
            return Ok((PathBuf::from(p), true));
        }
        let dir = strava_auth::config_dir().map_err(|e| common::Error::Config(e.to_string()))?;
        Ok((dir.join(SETTINGS_FILE), false))
    }

    pub fn from_file(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            common::Error::Config(format!("failed to read settings {}: {e}", path.display()))
        })?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> common::Result<Self> {
        let settings: Settings = toml::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> common::Result<()> {
        for (field, value) in [
            ("api.base_url", &self.api.base_url),
            ("api.authorize_url", &self.api.authorize_url),
            ("api.token_url", &self.api.token_url),
        ] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{field} must start with http:// or https://, got: {value}"
                )));
            }
        }
        for (field, value) in [
            ("api.timeout_secs", self.api.timeout_secs),
            ("poll.interval_secs", self.poll.interval_secs),
            ("poll.timeout_secs", self.poll.timeout_secs),
        ] {
            if value == 0 {
                return Err(common::Error::Config(format!(
                    "{field} must be greater than 0"
                )));
            }
        }
        Ok(())
    }

    pub fn endpoints(&self) -> OAuthEndpoints {
        OAuthEndpoints {
            authorize_url: self.api.authorize_url.clone(),
            token_url: self.api.token_url.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.max_retries,
            base_backoff: Duration::from_millis(self.retry.base_backoff_ms),
        }
    }

    pub fn poller(&self) -> UploadPoller {
        UploadPoller::new(
            Duration::from_secs(self.poll.interval_secs),
            Duration::from_secs(self.poll.timeout_secs),
        )
    }
}

/// Client registration values supplied through the environment.
#[derive(Debug, Clone, Default)]
pub struct CredentialOverrides {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
}

impl CredentialOverrides {
    pub fn from_env() -> Self {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Self {
            client_id: var(CLIENT_ID_ENV),
            client_secret: var(CLIENT_SECRET_ENV),
            redirect_uri: var(REDIRECT_URI_ENV),
        }
    }
}

/// Merge overrides into the stored registration, prompting for what is missing.
pub async fn resolve_credentials<R, W>(
    stored: &State,
    overrides: &CredentialOverrides,
    input: &mut R,
    prompt_out: &mut W,
) -> common::Result<ClientCredentials>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let pick = |over: &Option<String>, saved: &str| over.clone().unwrap_or_else(|| saved.to_string());
    let mut client_id = pick(&overrides.client_id, &stored.client_id);
    let mut client_secret = pick(&overrides.client_secret, &stored.client_secret);
    let redirect_uri = pick(&overrides.redirect_uri, &stored.redirect_uri);

    if client_id.is_empty() {
        client_id = prompt(input, prompt_out, "Strava Client ID: ").await?;
    }
    if client_secret.is_empty() {
        client_secret = prompt(input, prompt_out, "Strava Client Secret: ").await?;
    }
    if client_id.is_empty() || client_secret.is_empty() {
        return Err(common::Error::Config(format!(
            "client ID and secret are required\n  Hint: set {CLIENT_ID_ENV} / {CLIENT_SECRET_ENV} or use the interactive prompt\n  Create an API application at https://www.strava.com/settings/api"
        )));
    }
    Ok(ClientCredentials::new(client_id, client_secret, redirect_uri))
}

async fn prompt<R, W>(input: &mut R, out: &mut W, label: &str) -> common::Result<String>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    write!(out, "{label}")?;
    out.flush()?;
    let mut line = String::new();
    input.read_line(&mut line).await?;
    Ok(line.trim().to_string())
}
