//! Credential storage for the CLI
//!
//! A single JSON file holds the client registration, the current token pair
//! and at most one pending remote login. All writes go through a temp file in
//! the same directory which is fsynced and renamed over the target, so a
//! crash mid-write leaves either the previous file or the new one.

use std::path::{Path, PathBuf};

use common::Secret;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::constants::DEFAULT_REDIRECT_URI;
use crate::error::{Error, Result};

/// Directory name under the user config dir.
const DIR_NAME: &str = "strava-cli";

/// File name of the credential file.
const FILE_NAME: &str = "config.json";

/// Environment variable that replaces the config directory.
pub const CONFIG_DIR_ENV: &str = "STRAVA_CONFIG_DIR";

/// OAuth token pair. `expires_at` is an absolute unix timestamp in seconds
/// and is the only source of truth for freshness.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token_type: String,
}

impl TokenPair {
    pub fn is_authenticated(&self) -> bool {
        !self.access_token.is_empty()
    }
}

/// In-flight two-step remote login, between `--remote` and `--auth-url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub state: String,
    pub redirect_uri: String,
    pub expires_at: i64,
}

impl PendingAuthorization {
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

/// Everything persisted in `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub redirect_uri: String,
    #[serde(default)]
    pub tokens: TokenPair,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_auth: Option<PendingAuthorization>,
}

/// Client registration used for the life of one command.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub redirect_uri: String,
}

impl ClientCredentials {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret: Secret::new(client_secret),
            redirect_uri,
        }
    }

    /// Credentials stored in `state`, or None if id or secret is missing.
    pub fn from_state(state: &State) -> Option<Self> {
        if state.client_id.is_empty() || state.client_secret.is_empty() {
            return None;
        }
        Some(Self::new(
            state.client_id.clone(),
            state.client_secret.clone(),
            state.redirect_uri.clone(),
        ))
    }

    /// Configured redirect, or the loopback default.
    pub fn redirect_uri(&self) -> &str {
        if self.redirect_uri.is_empty() {
            DEFAULT_REDIRECT_URI
        } else {
            &self.redirect_uri
        }
    }

    /// Copy the registration into `state` so later commands can reuse it.
    pub fn apply_to(&self, state: &mut State) {
        state.client_id = self.client_id.clone();
        state.client_secret = self.client_secret.expose().clone();
        state.redirect_uri = self.redirect_uri.clone();
    }
}

/// File-backed credential store.
///
/// No cross-process locking: the CLI is single-user and each invocation
/// loads, mutates and saves at well-defined points.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at `<dir>/config.json`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(FILE_NAME))
    }

    /// Store at the default location: `$STRAVA_CONFIG_DIR/config.json` if
    /// set, otherwise `<user config dir>/strava-cli/config.json`.
    pub fn default_location() -> Result<Self> {
        Ok(Self::in_dir(&config_dir()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted state. A missing file is an empty state.
    pub async fn load(&self) -> Result<State> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "credential file not found, using empty state");
                return Ok(State::default());
            }
            Err(e) => return Err(Error::Io(format!("reading credential file: {e}"))),
        };
        let state: State = serde_json::from_str(&contents)
            .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
        debug!(
            path = %self.path.display(),
            authenticated = state.tokens.is_authenticated(),
            pending_login = state.pending_auth.is_some(),
            "loaded credentials"
        );
        Ok(state)
    }

    /// Persist `state`, creating the parent directory if needed.
    pub async fn save(&self, state: &State) -> Result<()> {
        write_atomic(&self.path, state).await
    }

    /// Delete the credential file. Returns false if there was nothing to delete.
    pub async fn remove(&self) -> Result<bool> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "removed credential file");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Io(format!("removing credential file: {e}"))),
        }
    }
}

/// Resolve the config directory honoring `STRAVA_CONFIG_DIR`.
pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::config_dir()
        .map(|base| base.join(DIR_NAME))
        .ok_or_else(|| Error::Io("could not locate the user config directory".into()))
}

/// Write the state atomically with owner-only permissions.
async fn write_atomic(path: &Path, state: &State) -> Result<()> {
    let json = serde_json::to_string_pretty(state)
        .map_err(|e| Error::CredentialParse(format!("serializing credentials: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("credential path has no parent directory".into()))?;
    create_private_dir(dir).await?;

    let tmp_path = dir.join(format!(".{FILE_NAME}.tmp.{}", std::process::id()));
    if let Err(e) = write_and_rename(&tmp_path, path, json.as_bytes()).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e);
    }

    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}

/// Write `contents` to `tmp_path` with mode 0600, fsync, and rename over `path`.
async fn write_and_rename(tmp_path: &Path, path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options
        .open(tmp_path)
        .await
        .map_err(|e| Error::Io(format!("creating temp credential file: {e}")))?;
    file.write_all(contents)
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;
    file.sync_all()
        .await
        .map_err(|e| Error::Io(format!("syncing temp credential file: {e}")))?;
    drop(file);

    // mode() only applies on create; a leftover temp file keeps its old mode
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))
}

async fn create_private_dir(dir: &Path) -> Result<()> {
    if tokio::fs::try_exists(dir).await.unwrap_or(false) {
        return Ok(());
    }
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder
        .create(dir)
        .await
        .map_err(|e| Error::Io(format!("creating config directory {}: {e}", dir.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticated_state() -> State {
        State {
            client_id: "12345".into(),
            client_secret: "s3cret".into(),
            redirect_uri: String::new(),
            tokens: TokenPair {
                access_token: "at_1".into(),
                refresh_token: "rt_1".into(),
                expires_at: 1_735_500_000,
                token_type: "Bearer".into(),
            },
            pending_auth: None,
        }
    }

    #[tokio::test]
    async fn roundtrip_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::in_dir(dir.path());

        store.save(&authenticated_state()).await.unwrap();

        let loaded = CredentialStore::in_dir(dir.path()).load().await.unwrap();
        assert_eq!(loaded, authenticated_state());
    }

    #[tokio::test]
    async fn missing_file_loads_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::in_dir(dir.path());

        let state = store.load().await.unwrap();
        assert_eq!(state, State::default());
        assert!(!store.path().exists(), "load must not create the file");
    }

    #[tokio::test]
    async fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::in_dir(dir.path());
        tokio::fs::write(store.path(), "{not json").await.unwrap();

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, Error::CredentialParse(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn save_creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("strava-cli");
        let store = CredentialStore::in_dir(&nested);

        store.save(&authenticated_state()).await.unwrap();
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn save_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::in_dir(dir.path());
        store.save(&authenticated_state()).await.unwrap();
        store.save(&State::default()).await.unwrap();

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut names = vec![];
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["config.json"]);
    }

    #[tokio::test]
    async fn failed_save_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::in_dir(dir.path());
        // A non-empty directory at the target path makes the rename fail
        tokio::fs::create_dir(store.path()).await.unwrap();
        tokio::fs::write(store.path().join("keep"), b"x").await.unwrap();

        let err = store.save(&authenticated_state()).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)), "got: {err:?}");

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut names = vec![];
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["config.json"]);
    }

    #[tokio::test]
    async fn file_format_omits_empty_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::in_dir(dir.path());
        store.save(&authenticated_state()).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&tokio::fs::read_to_string(store.path()).await.unwrap())
                .unwrap();
        assert_eq!(raw["client_id"], "12345");
        assert_eq!(raw["tokens"]["access_token"], "at_1");
        assert!(raw.get("pending_auth").is_none());
        assert!(raw.get("redirect_uri").is_none());
    }

    #[tokio::test]
    async fn pending_authorization_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::in_dir(dir.path());
        let mut state = authenticated_state();
        state.pending_auth = Some(PendingAuthorization {
            state: "abcd".into(),
            redirect_uri: DEFAULT_REDIRECT_URI.into(),
            expires_at: 1_700_000_600,
        });
        store.save(&state).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.pending_auth, state.pending_auth);
    }

    #[tokio::test]
    async fn remove_reports_whether_file_existed() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::in_dir(dir.path());
        assert!(!store.remove().await.unwrap());

        store.save(&authenticated_state()).await.unwrap();
        assert!(store.remove().await.unwrap());
        assert!(!store.path().exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::in_dir(dir.path());
        store.save(&authenticated_state()).await.unwrap();

        let metadata = tokio::fs::metadata(store.path()).await.unwrap();
        let mode = metadata.permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "credential file must be 0600, got {mode:o}");
    }

    #[test]
    fn pending_expiry_is_strictly_after() {
        let pending = PendingAuthorization {
            state: "s".into(),
            redirect_uri: DEFAULT_REDIRECT_URI.into(),
            expires_at: 100,
        };
        assert!(!pending.is_expired(100));
        assert!(pending.is_expired(101));
    }

    #[test]
    fn client_credentials_require_id_and_secret() {
        let mut state = authenticated_state();
        let creds = ClientCredentials::from_state(&state).unwrap();
        assert_eq!(creds.client_id, "12345");
        assert_eq!(creds.redirect_uri(), DEFAULT_REDIRECT_URI);

        state.client_secret.clear();
        assert!(ClientCredentials::from_state(&state).is_none());
    }

    #[test]
    fn apply_to_copies_registration() {
        let creds = ClientCredentials::new(
            "999".into(),
            "sec".into(),
            "https://example.com/cb".into(),
        );
        let mut state = State::default();
        creds.apply_to(&mut state);
        assert_eq!(state.client_id, "999");
        assert_eq!(state.client_secret, "sec");
        assert_eq!(state.redirect_uri, "https://example.com/cb");
    }
}
