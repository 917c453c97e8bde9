//! `strava activities list|get|update|upload`

use std::io::Write;

use anyhow::{Context, bail};
use serde_json::{Map, Value};
use strava_client::{FetchedUpload, UploadFile, infer_data_type};

use crate::cli::{ActivitiesCommand, ListArgs, UpdateArgs, UploadArgs};
use crate::commands::{App, Gate, confirm_on_terminal};
use crate::output;

pub async fn run(app: &App, command: ActivitiesCommand) -> anyhow::Result<()> {
    match command {
        ActivitiesCommand::List(args) => list(app, args).await,
        ActivitiesCommand::Get { id } => get(app, id).await,
        ActivitiesCommand::Update(args) => update(app, args).await,
        ActivitiesCommand::Upload(args) => upload(app, args).await,
    }
}

/// Path and query for `GET /athlete/activities`. Zero bounds are omitted.
fn list_path(args: &ListArgs) -> String {
    let mut path = format!(
        "athlete/activities?page={}&per_page={}",
        args.page, args.per_page
    );
    if args.before > 0 {
        path.push_str(&format!("&before={}", args.before));
    }
    if args.after > 0 {
        path.push_str(&format!("&after={}", args.after));
    }
    path
}

async fn list(app: &App, args: ListArgs) -> anyhow::Result<()> {
    let api = app.api().await?;
    let body = api.get_json(&list_path(&args)).await.context("fetch activities")?;
    let mut stdout = std::io::stdout();
    if app.json {
        output::print_raw(&mut stdout, &body)?;
        return Ok(());
    }
    let activities: Vec<Value> =
        serde_json::from_slice(&body).context("decode activities response")?;
    output::print_activities(&mut stdout, &activities)?;
    Ok(())
}

async fn get(app: &App, id: i64) -> anyhow::Result<()> {
    let api = app.api().await?;
    let body = api
        .get_json(&format!("activities/{id}?include_all_efforts=false"))
        .await
        .context("fetch activity")?;
    let mut stdout = std::io::stdout();
    if app.json {
        output::print_raw(&mut stdout, &body)?;
        return Ok(());
    }
    let activity: Value = serde_json::from_slice(&body).context("decode activity response")?;
    output::print_activity(&mut stdout, &activity)?;
    Ok(())
}

/// Body fields for `PUT /activities/{id}`.
fn update_fields(args: &UpdateArgs) -> Map<String, Value> {
    let mut fields = Map::new();
    if let Some(name) = &args.name {
        fields.insert("name".into(), name.clone().into());
    }
    if let Some(description) = &args.description {
        fields.insert("description".into(), description.clone().into());
    }
    if let Some(sport_type) = &args.sport_type {
        // Older activities still read the legacy `type` field
        fields.insert("sport_type".into(), sport_type.clone().into());
        fields.insert("type".into(), sport_type.clone().into());
    }
    if let Some(gear_id) = &args.gear_id {
        fields.insert("gear_id".into(), gear_id.clone().into());
    }
    if let Some(commute) = args.commute {
        fields.insert("commute".into(), commute.into());
    }
    if let Some(hide) = args.hide {
        fields.insert("hide_from_home".into(), hide.into());
    }
    fields
}

fn describe_update(id: i64, fields: &Map<String, Value>) -> String {
    let changes: Vec<String> = fields
        .iter()
        .filter(|(key, _)| key.as_str() != "type")
        .map(|(key, value)| match value {
            Value::String(s) => format!("{key}={s:?}"),
            other => format!("{key}={other}"),
        })
        .collect();
    format!("update activity {id} ({})", changes.join(", "))
}

async fn update(app: &App, args: UpdateArgs) -> anyhow::Result<()> {
    let fields = update_fields(&args);
    if fields.is_empty() {
        bail!(
            "no fields to update; provide at least one of: --name, --description, --type, --gear-id, --commute, --hide"
        );
    }

    let description = describe_update(args.id, &fields);
    if confirm_on_terminal(&description, args.mutation).await? != Gate::Proceed {
        return Ok(());
    }

    let api = app.api().await?;
    let body = api
        .update_activity(args.id, Value::Object(fields))
        .await
        .with_context(|| format!("update activity {}", args.id))?;

    let mut stdout = std::io::stdout();
    if app.json {
        output::print_raw(&mut stdout, &body)?;
        return Ok(());
    }
    let activity: Value = serde_json::from_slice(&body).context("decode activity response")?;
    let name = activity["name"].as_str().unwrap_or_default();
    println!("Updated activity {}: {name:?}", args.id);
    Ok(())
}

fn resolve_data_type(args: &UploadArgs) -> anyhow::Result<String> {
    if let Some(data_type) = args.data_type.as_deref().filter(|d| !d.is_empty()) {
        return Ok(data_type.to_lowercase());
    }
    match infer_data_type(&args.file) {
        Some(data_type) => Ok(data_type.to_string()),
        None => bail!(
            "cannot infer --data-type from {}; specify it explicitly (fit, fit.gz, tcx, tcx.gz, gpx, gpx.gz)",
            args.file.display()
        ),
    }
}

async fn upload(app: &App, args: UploadArgs) -> anyhow::Result<()> {
    let data_type = resolve_data_type(&args)?;
    let description = format!("upload {} as {data_type}", args.file.display());
    if confirm_on_terminal(&description, args.mutation).await? != Gate::Proceed {
        return Ok(());
    }

    let file = UploadFile {
        path: args.file.clone(),
        data_type,
        name: args.name.clone(),
        description: args.description.clone(),
        trainer: args.trainer,
        commute: args.commute,
    };
    let api = app.api().await?;
    let created = api.create_upload(&file).await?;
    let id = created.job.id;

    let mut stdout = std::io::stdout();
    if !args.wait {
        render_upload(&mut stdout, app.json, &created)?;
        eprintln!("To check status: strava uploads get {id}");
        return Ok(());
    }

    let poller = app.settings.poller();
    eprintln!(
        "Polling upload {id} every {}s (Ctrl-C to cancel, timeout {}s)...",
        poller.interval.as_secs(),
        poller.timeout.as_secs()
    );
    let outcome = poller
        .wait(&api, id, interrupted(), |job| {
            eprintln!("  still processing: {}", job.status)
        })
        .await;

    // A rejected upload is still shown before the command fails
    if let Err(strava_client::Error::UploadFailed { upload, .. }) = &outcome {
        render_upload(&mut stdout, app.json, upload)?;
    }
    let finished = outcome?;
    render_upload(&mut stdout, app.json, &finished)?;
    eprintln!("Done.");
    Ok(())
}

fn render_upload<W: Write>(out: &mut W, json: bool, upload: &FetchedUpload) -> std::io::Result<()> {
    if json {
        output::print_raw(out, &upload.raw)
    } else {
        output::print_upload(out, &upload.job)
    }
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
