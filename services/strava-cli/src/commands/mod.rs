//! Command handlers
//!
//! Handlers return `anyhow::Result`; `main` is the only place errors are
//! rendered for the operator.

pub mod activities;
pub mod athlete;
pub mod auth;
pub mod uploads;

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use strava_auth::{Authenticator, CredentialStore, TokenManager};
use strava_client::{StravaApi, Transport};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::info;

use crate::cli::{Command, MutationArgs};
use crate::config::Settings;

/// Everything a command needs, built once per invocation.
pub struct App {
    pub settings: Settings,
    pub json: bool,
    pub store: CredentialStore,
    http: reqwest::Client,
}

impl App {
    pub fn new(settings: Settings, json: bool, store: CredentialStore) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            settings,
            json,
            store,
            http,
        })
    }

    pub fn authenticator(&self) -> Authenticator {
        Authenticator::new(self.http.clone(), self.settings.endpoints())
    }

    /// Load stored credentials and build an authenticated API client.
    pub async fn api(&self) -> anyhow::Result<StravaApi> {
        let state = self.store.load().await.context("load credentials")?;
        let tokens = Arc::new(TokenManager::new(
            self.http.clone(),
            self.settings.endpoints(),
            self.store.clone(),
            state,
        ));
        let transport = Transport::new(self.http.clone(), tokens, self.settings.retry_policy());
        Ok(StravaApi::new(transport, self.settings.api.base_url.clone()))
    }
}

pub async fn run(app: &App, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Auth(cmd) => auth::run(app, cmd).await,
        Command::Athlete(cmd) => athlete::run(app, cmd).await,
        Command::Activities(cmd) => activities::run(app, cmd).await,
        Command::Uploads(cmd) => uploads::run(app, cmd).await,
    }
}

/// Outcome of the safety gate in front of every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Proceed,
    DryRun,
    Declined,
}

/// `--dry-run` previews, `--yes` proceeds, otherwise ask `[y/N]`.
///
/// Every write that goes ahead leaves an AUDIT line on `out`.
pub async fn confirm_mutation<R, W>(
    description: &str,
    flags: MutationArgs,
    input: &mut R,
    out: &mut W,
) -> std::io::Result<Gate>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    if flags.dry_run {
        writeln!(out, "DRY RUN: would {description}")?;
        return Ok(Gate::DryRun);
    }
    if !flags.yes {
        write!(out, "About to {description}\nProceed? [y/N] ")?;
        out.flush()?;
        let mut answer = String::new();
        input.read_line(&mut answer).await?;
        if !answer.trim().eq_ignore_ascii_case("y") {
            writeln!(out, "Aborted.")?;
            return Ok(Gate::Declined);
        }
    }
    writeln!(out, "AUDIT: {description}")?;
    info!(action = description, "mutation confirmed");
    Ok(Gate::Proceed)
}

/// [`confirm_mutation`] on the process's stdin and stderr.
pub async fn confirm_on_terminal(description: &str, flags: MutationArgs) -> anyhow::Result<Gate> {
    let mut stdin = tokio::io::BufReader::new(tokio::io::stdin());
    confirm_mutation(description, flags, &mut stdin, &mut std::io::stderr())
        .await
        .context("read confirmation")
}
