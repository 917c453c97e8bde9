//! `strava uploads get`

use crate::cli::UploadsCommand;
use crate::commands::App;
use crate::output;

pub async fn run(app: &App, command: UploadsCommand) -> anyhow::Result<()> {
    match command {
        UploadsCommand::Get { id } => {
            let api = app.api().await?;
            let fetched = api.upload_status(id).await?;
            let mut stdout = std::io::stdout();
            if app.json {
                output::print_raw(&mut stdout, &fetched.raw)?;
            } else {
                output::print_upload(&mut stdout, &fetched.job)?;
            }
            Ok(())
        }
    }
}
