//! `strava auth login|status|logout`

use std::io::Write;

use anyhow::Context;
use serde_json::json;
use strava_auth::{ClientCredentials, LoginMode, State, unix_now};
use tokio::io::BufReader;
use tracing::info;

use crate::cli::{AuthCommand, LoginArgs, MutationArgs};
use crate::commands::{App, Gate, confirm_mutation};
use crate::config::{CredentialOverrides, resolve_credentials};
use crate::output;

pub async fn run(app: &App, command: AuthCommand) -> anyhow::Result<()> {
    match command {
        AuthCommand::Login(args) => login(app, args).await,
        AuthCommand::Status => status(app).await,
        AuthCommand::Logout { yes } => logout(app, yes).await,
    }
}

async fn login(app: &App, args: LoginArgs) -> anyhow::Result<()> {
    let mut state = app.store.load().await.context("load credentials")?;
    let overrides = CredentialOverrides::from_env();
    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    let auth = app.authenticator();

    // The redirect is never prompted for, so the mode is known up front
    let redirect_uri = overrides
        .redirect_uri
        .clone()
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| state.redirect_uri.clone());
    let redirect_uri = if redirect_uri.is_empty() {
        strava_auth::DEFAULT_REDIRECT_URI.to_string()
    } else {
        redirect_uri
    };
    let mode = LoginMode::select(&redirect_uri, args.remote, args.auth_url.as_deref());
    let mode_name = match &mode {
        LoginMode::LocalCallback => "local_callback",
        LoginMode::ManualPaste => "manual_paste",
        LoginMode::RemoteStart => "remote_start",
        LoginMode::RemoteComplete(_) => "remote_complete",
    };
    info!(mode = mode_name, "starting login");

    // Step 2 reuses the registration saved by step 1; no prompts
    if let LoginMode::RemoteComplete(pasted) = &mode {
        let creds = ClientCredentials::from_state(&state).ok_or_else(|| {
            anyhow::anyhow!(
                "no client credentials stored\n  Hint: run 'strava auth login --remote' first"
            )
        })?;
        auth.complete_remote(&creds, &mut state, &app.store, pasted, unix_now())
            .await?;
        return print_logged_in(app, &mut stdout);
    }

    let creds = resolve_credentials(&state, &overrides, &mut stdin, &mut std::io::stderr()).await?;
    creds.apply_to(&mut state);

    let tokens = match mode {
        LoginMode::LocalCallback => auth.login_local(&creds, &mut stdout).await?,
        LoginMode::ManualPaste => auth.login_manual(&creds, &mut stdin, &mut stdout).await?,
        LoginMode::RemoteStart | LoginMode::RemoteComplete(_) => {
            let (pending, url) = auth.start_remote(&creds, unix_now())?;
            let redirect_uri = pending.redirect_uri.clone();
            state.pending_auth = Some(pending);
            app.store.save(&state).await.context("save pending login")?;
            return print_remote_instructions(&mut stdout, &url, &redirect_uri);
        }
    };

    state.tokens = tokens;
    state.pending_auth = None;
    app.store.save(&state).await.context("save credentials")?;
    print_logged_in(app, &mut stdout)
}

fn print_remote_instructions<W: Write>(out: &mut W, url: &str, redirect_uri: &str) -> anyhow::Result<()> {
    writeln!(out, "Open the following URL in your local browser:")?;
    writeln!(out)?;
    writeln!(out, "  {url}")?;
    writeln!(out)?;
    writeln!(out, "Strava will redirect to:\n  {redirect_uri}?code=<code>&state=<state>")?;
    writeln!(out)?;
    writeln!(out, "Copy that URL (even if the page shows 'connection refused') and run:")?;
    writeln!(out, "  strava auth login --auth-url '<paste full URL here>'")?;
    Ok(())
}

fn print_logged_in<W: Write>(app: &App, out: &mut W) -> anyhow::Result<()> {
    writeln!(
        out,
        "Successfully authenticated! Tokens stored in {}",
        app.store.path().display()
    )?;
    Ok(())
}

async fn status(app: &App) -> anyhow::Result<()> {
    let state = app.store.load().await.context("load credentials")?;
    let mut stdout = std::io::stdout();
    if app.json {
        output::print_json(&mut stdout, &status_json(&state))?;
    } else {
        write_status(&mut stdout, &state, unix_now())?;
    }
    Ok(())
}

fn status_json(state: &State) -> serde_json::Value {
    json!({
        "authenticated": state.tokens.is_authenticated(),
        "client_id": state.client_id,
        "redirect_uri": state.redirect_uri,
        "expires_at": state.tokens.expires_at,
        "pending_login": state.pending_auth.is_some(),
    })
}

fn write_status<W: Write>(out: &mut W, state: &State, now: i64) -> std::io::Result<()> {
    if state.client_id.is_empty() {
        return writeln!(out, "Not authenticated. Run: strava auth login");
    }
    writeln!(out, "Client ID:    {}", state.client_id)?;
    if !state.redirect_uri.is_empty() {
        writeln!(out, "Redirect URI: {}", state.redirect_uri)?;
    }
    if state.pending_auth.is_some() {
        writeln!(
            out,
            "Pending:      remote login in progress (run 'strava auth login --auth-url ...' to complete)"
        )?;
    }
    if !state.tokens.is_authenticated() {
        return writeln!(out, "Token:        not set");
    }
    let expires_at = state.tokens.expires_at;
    if now < expires_at {
        writeln!(
            out,
            "Token:        valid (expires in {}, at {})",
            output::format_duration(expires_at - now),
            output::format_timestamp(expires_at)
        )
    } else {
        writeln!(
            out,
            "Token:        expired at {} (will auto-refresh on next command)",
            output::format_timestamp(expires_at)
        )
    }
}

async fn logout(app: &App, yes: bool) -> anyhow::Result<()> {
    let path = app.store.path();
    if !path.exists() {
        println!("Not authenticated.");
        return Ok(());
    }

    let description = format!("delete {} and remove local credentials", path.display());
    let mut stdin = BufReader::new(tokio::io::stdin());
    let flags = MutationArgs { dry_run: false, yes };
    let gate = confirm_mutation(&description, flags, &mut stdin, &mut std::io::stderr())
        .await
        .context("read confirmation")?;
    if gate != Gate::Proceed {
        return Ok(());
    }

    app.store.remove().await.context("remove credentials")?;
    println!("Logged out. Run 'strava auth login' to re-authenticate.");
    Ok(())
}
