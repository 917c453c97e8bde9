//! Command-line surface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "strava", version, about = "Command-line client for the Strava API")]
pub struct Cli {
    /// Print raw JSON responses instead of summaries
    #[arg(long, global = true)]
    pub json: bool,

    /// Settings file (default: $STRAVA_CLI_CONFIG or <config dir>/settings.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage authentication
    #[command(subcommand)]
    Auth(AuthCommand),

    /// The authenticated athlete
    #[command(subcommand)]
    Athlete(AthleteCommand),

    /// Update and upload activities
    #[command(subcommand)]
    Activities(ActivitiesCommand),

    /// Upload status commands
    #[command(subcommand)]
    Uploads(UploadsCommand),
}

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Authenticate with Strava via OAuth2
    #[command(after_help = LOGIN_HELP)]
    Login(LoginArgs),

    /// Show current authentication status
    Status,

    /// Remove stored credentials and tokens
    Logout {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

const LOGIN_HELP: &str = "\
Credentials are read from the environment if set:
  STRAVA_CLIENT_ID
  STRAVA_CLIENT_SECRET
  STRAVA_REDIRECT_URI   (optional; defaults to http://localhost:8089/callback)

Remote login (two steps, no browser or open port needed on the server):
  strava auth login --remote
  strava auth login --auth-url 'http://localhost:8089/callback?code=...&state=...'";

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Two-step remote login: print the auth URL and save the CSRF state
    #[arg(long)]
    pub remote: bool,

    /// Complete a remote login with the redirect URL from the browser
    #[arg(long, value_name = "URL")]
    pub auth_url: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum AthleteCommand {
    /// Show the authenticated athlete's profile
    Me,
}

#[derive(Debug, Subcommand)]
pub enum ActivitiesCommand {
    /// List your recent activities
    List(ListArgs),

    /// Show a single activity
    Get {
        /// Activity ID
        id: i64,
    },

    /// Update an activity's metadata
    Update(UpdateArgs),

    /// Upload an activity file (FIT, TCX, GPX, optionally gzipped)
    Upload(UploadArgs),
}

#[derive(Debug, Clone, Copy, Args)]
pub struct ListArgs {
    /// Only activities before this unix timestamp
    #[arg(long, default_value_t = 0)]
    pub before: i64,

    /// Only activities after this unix timestamp
    #[arg(long, default_value_t = 0)]
    pub after: i64,

    #[arg(long, default_value_t = 1)]
    pub page: u32,

    #[arg(long, default_value_t = 30)]
    pub per_page: u32,
}

/// Shared safety flags for commands that write.
#[derive(Debug, Clone, Copy, Default, Args)]
pub struct MutationArgs {
    /// Print what would be done without calling the API
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the interactive confirmation
    #[arg(long)]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Activity ID
    pub id: i64,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Sport type, e.g. Run, Ride, Hike
    #[arg(long = "type", value_name = "TYPE")]
    pub sport_type: Option<String>,

    #[arg(long)]
    pub gear_id: Option<String>,

    #[arg(long, value_name = "BOOL")]
    pub commute: Option<bool>,

    /// Hide from the home feed
    #[arg(long, value_name = "BOOL")]
    pub hide: Option<bool>,

    #[command(flatten)]
    pub mutation: MutationArgs,
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Path to the activity file
    #[arg(long)]
    pub file: PathBuf,

    /// fit, fit.gz, tcx, tcx.gz, gpx or gpx.gz (inferred from the extension if omitted)
    #[arg(long)]
    pub data_type: Option<String>,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Mark as an indoor trainer activity
    #[arg(long)]
    pub trainer: bool,

    /// Mark as a commute
    #[arg(long)]
    pub commute: bool,

    /// Poll until Strava finishes processing
    #[arg(long)]
    pub wait: bool,

    #[command(flatten)]
    pub mutation: MutationArgs,
}

#[derive(Debug, Subcommand)]
pub enum UploadsCommand {
    /// Get the status of an upload by ID
    Get {
        /// Upload ID
        id: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn auth_url_alone_parses() {
        let cli = Cli::try_parse_from([
            "strava",
            "auth",
            "login",
            "--auth-url",
            "http://localhost:8089/callback?code=a&state=b",
        ])
        .unwrap();
        match cli.command {
            Command::Auth(AuthCommand::Login(args)) => {
                assert!(!args.remote);
                assert!(args.auth_url.unwrap().contains("state=b"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn update_flags_take_values() {
        let cli = Cli::try_parse_from([
            "strava",
            "--json",
            "activities",
            "update",
            "123",
            "--type",
            "Ride",
            "--commute",
            "false",
            "--dry-run",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Command::Activities(ActivitiesCommand::Update(args)) => {
                assert_eq!(args.id, 123);
                assert_eq!(args.sport_type.as_deref(), Some("Ride"));
                assert_eq!(args.commute, Some(false));
                assert_eq!(args.hide, None);
                assert!(args.mutation.dry_run);
                assert!(!args.mutation.yes);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn list_defaults_to_first_page() {
        let cli = Cli::try_parse_from(["strava", "activities", "list", "--after", "1735000000"]).unwrap();
        match cli.command {
            Command::Activities(ActivitiesCommand::List(args)) => {
                assert_eq!(args.page, 1);
                assert_eq!(args.per_page, 30);
                assert_eq!(args.before, 0);
                assert_eq!(args.after, 1_735_000_000);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn upload_requires_file() {
        assert!(Cli::try_parse_from(["strava", "activities", "upload", "--yes"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["strava", "uploads", "get", "42", "-v", "--config", "/tmp/s.toml"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/s.toml")));
    }
}
