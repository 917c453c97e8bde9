//! Terminal rendering
//!
//! `--json` passes response bodies through untouched; otherwise a short
//! human summary is printed.

use std::io::Write;

use chrono::{DateTime, Local};
use serde_json::Value;
use strava_client::{UploadJob, strip_html};

pub fn print_json<W: Write>(out: &mut W, value: &Value) -> std::io::Result<()> {
    writeln!(out, "{value:#}")
}

/// Write a response body verbatim.
pub fn print_raw<W: Write>(out: &mut W, body: &[u8]) -> std::io::Result<()> {
    out.write_all(body)?;
    if !body.ends_with(b"\n") {
        writeln!(out)?;
    }
    Ok(())
}

pub fn print_upload<W: Write>(out: &mut W, job: &UploadJob) -> std::io::Result<()> {
    writeln!(out, "Upload ID:   {}", job.id)?;
    writeln!(out, "Status:      {}", job.status)?;
    if let Some(activity_id) = job.activity_id {
        writeln!(out, "Activity ID: {activity_id}")?;
    }
    if let Some(error) = job.error.as_deref().filter(|e| !e.is_empty()) {
        writeln!(out, "Error:       {}", strip_html(error))?;
    }
    Ok(())
}

/// One-line athlete summary from `GET /athlete`.
pub fn print_athlete<W: Write>(out: &mut W, athlete: &Value) -> std::io::Result<()> {
    let field = |key: &str| athlete.get(key).and_then(|v| v.as_str()).unwrap_or_default();
    let name = format!("{} {}", field("firstname"), field("lastname"));
    writeln!(out, "Athlete:  {} (id {})", name.trim(), athlete["id"])?;
    if !field("username").is_empty() {
        writeln!(out, "Username: {}", field("username"))?;
    }
    let location: Vec<&str> = ["city", "state", "country"]
        .into_iter()
        .map(field)
        .filter(|s| !s.is_empty())
        .collect();
    if !location.is_empty() {
        writeln!(out, "Location: {}", location.join(", "))?;
    }
    Ok(())
}

/// Table of activities from `GET /athlete/activities`.
pub fn print_activities<W: Write>(out: &mut W, activities: &[Value]) -> std::io::Result<()> {
    if activities.is_empty() {
        return writeln!(out, "No activities found.");
    }
    writeln!(
        out,
        "{:<12} {:<30} {:<14} {:>10} {:>10} {:<10}",
        "ID", "Name", "Sport", "Distance", "Time", "Date"
    )?;
    for activity in activities {
        writeln!(
            out,
            "{:<12} {:<30} {:<14} {:>10} {:>10} {:<10}",
            activity["id"].to_string(),
            truncate(text(activity, "name"), 30),
            sport(activity),
            format_distance(number(activity, "distance")),
            format_duration(number(activity, "moving_time") as i64),
            text(activity, "start_date_local").get(..10).unwrap_or_default(),
        )?;
    }
    Ok(())
}

/// Detail view from `GET /activities/{id}`.
pub fn print_activity<W: Write>(out: &mut W, activity: &Value) -> std::io::Result<()> {
    writeln!(out, "ID:           {}", activity["id"])?;
    writeln!(out, "Name:         {}", text(activity, "name"))?;
    writeln!(out, "Sport:        {}", sport(activity))?;
    writeln!(out, "Date:         {}", text(activity, "start_date_local"))?;
    writeln!(out, "Distance:     {}", format_distance(number(activity, "distance")))?;
    writeln!(
        out,
        "Moving time:  {}",
        format_duration(number(activity, "moving_time") as i64)
    )?;
    writeln!(
        out,
        "Elapsed time: {}",
        format_duration(number(activity, "elapsed_time") as i64)
    )?;
    writeln!(out, "Elevation:    {:.0} m", number(activity, "total_elevation_gain"))?;
    // m/s to km/h
    writeln!(out, "Avg speed:    {:.1} km/h", number(activity, "average_speed") * 3.6)?;
    if let Some(watts) = activity["average_watts"].as_f64().filter(|w| *w > 0.0) {
        writeln!(out, "Avg power:    {watts:.0} W")?;
    }
    writeln!(out, "Kudos:        {}", number(activity, "kudos_count"))?;
    let description = text(activity, "description");
    if !description.is_empty() {
        writeln!(out, "Description:  {description}")?;
    }
    Ok(())
}

fn text<'a>(value: &'a Value, key: &str) -> &'a str {
    value[key].as_str().unwrap_or_default()
}

fn number(value: &Value, key: &str) -> f64 {
    value[key].as_f64().unwrap_or_default()
}

fn sport(activity: &Value) -> &str {
    match text(activity, "sport_type") {
        "" => text(activity, "type"),
        sport => sport,
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max - 3).collect();
    format!("{kept}...")
}

/// Metres as `12.34 km`, or `850 m` under a kilometre.
pub fn format_distance(metres: f64) -> String {
    if metres >= 1000.0 {
        format!("{:.2} km", metres / 1000.0)
    } else {
        format!("{metres:.0} m")
    }
}

/// `3725` → `1h2m5s`.
pub fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    let (h, m, s) = (secs / 3600, secs % 3600 / 60, secs % 60);
    match (h, m) {
        (0, 0) => format!("{s}s"),
        (0, _) => format!("{m}m{s}s"),
        _ => format!("{h}h{m}m{s}s"),
    }
}

/// Local-time rendering of a unix timestamp.
pub fn format_timestamp(secs: i64) -> String {
    match DateTime::from_timestamp(secs, 0) {
        Some(utc) => utc
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => secs.to_string(),
    }
}
