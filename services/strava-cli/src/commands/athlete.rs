//! `strava athlete me`

use anyhow::Context;

use crate::cli::AthleteCommand;
use crate::commands::App;
use crate::output;

pub async fn run(app: &App, command: AthleteCommand) -> anyhow::Result<()> {
    match command {
        AthleteCommand::Me => me(app).await,
    }
}

async fn me(app: &App) -> anyhow::Result<()> {
    let api = app.api().await?;
    let body = api.get_json("athlete").await?;
    let mut stdout = std::io::stdout();
    if app.json {
        output::print_raw(&mut stdout, &body)?;
        return Ok(());
    }
    let athlete: serde_json::Value =
        serde_json::from_slice(&body).context("decode athlete response")?;
    output::print_athlete(&mut stdout, &athlete)?;
    Ok(())
}
