//! Typed calls against the Strava v3 API
//!
//! Only the calls the CLI needs beyond raw JSON reads: upload creation and
//! status, and activity updates. Everything goes through [`Transport`].

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use bytes::Bytes;
use reqwest::Method;
use tracing::{debug, info};

use crate::classify::api_error;
use crate::error::{Error, Result};
use crate::request::{ApiRequest, Part, Payload};
use crate::transport::{ApiResponse, Transport};
use crate::upload::{FetchedUpload, UploadJob, UploadSource};

pub const DEFAULT_BASE_URL: &str = "https://www.strava.com/api/v3";

/// File extensions Strava accepts, longest first so `.fit.gz` beats `.gz`.
const DATA_TYPES: &[(&str, &str)] = &[
    (".fit.gz", "fit.gz"),
    (".tcx.gz", "tcx.gz"),
    (".gpx.gz", "gpx.gz"),
    (".fit", "fit"),
    (".tcx", "tcx"),
    (".gpx", "gpx"),
];

/// Strava `data_type` for `path`, inferred from its extension.
pub fn infer_data_type(path: &Path) -> Option<&'static str> {
    let name = path.file_name()?.to_string_lossy().to_lowercase();
    DATA_TYPES
        .iter()
        .find(|(suffix, _)| name.ends_with(suffix))
        .map(|(_, data_type)| *data_type)
}

/// An activity file and the metadata sent alongside it.
#[derive(Debug, Clone, Default)]
pub struct UploadFile {
    pub path: PathBuf,
    pub data_type: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub trainer: bool,
    pub commute: bool,
}

impl UploadFile {
    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string())
    }

    /// Multipart fields, in the order Strava documents them.
    fn parts(&self, contents: Bytes) -> Vec<Part> {
        let mut parts = vec![
            Part::File {
                name: "file".into(),
                file_name: self.file_name(),
                bytes: contents,
            },
            Part::text("data_type", &self.data_type),
        ];
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            parts.push(Part::text("name", name));
        }
        if let Some(description) = self.description.as_deref().filter(|d| !d.is_empty()) {
            parts.push(Part::text("description", description));
        }
        if self.trainer {
            parts.push(Part::text("trainer", "1"));
        }
        if self.commute {
            parts.push(Part::text("commute", "1"));
        }
        parts
    }
}

#[derive(Clone)]
pub struct StravaApi {
    transport: Transport,
    base_url: String,
}

impl StravaApi {
    pub fn new(transport: Transport, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET `path` and return the raw body of a 200 response.
    pub async fn get_json(&self, path: &str) -> Result<Bytes> {
        let response = self.transport.send(&ApiRequest::get(self.url(path))).await?;
        expect_status(response, &[200])
    }

    pub async fn upload_status(&self, id: i64) -> Result<FetchedUpload> {
        let raw = self.get_json(&format!("uploads/{id}")).await?;
        decode_upload(raw)
    }

    /// Read `file` from disk and POST it to `/uploads`.
    pub async fn create_upload(&self, file: &UploadFile) -> Result<FetchedUpload> {
        let contents = tokio::fs::read(&file.path)
            .await
            .map_err(|e| Error::Io(format!("read {}: {e}", file.path.display())))?;
        let contents = Bytes::from(contents);
        debug!(
            file = %file.path.display(),
            bytes = contents.len(),
            data_type = %file.data_type,
            "uploading activity file"
        );

        let upload = file.clone();
        let request = ApiRequest::with_body(Method::POST, self.url("uploads"), move || {
            Payload::Multipart(upload.parts(contents.clone()))
        });
        let response = self.transport.send(&request).await?;
        let fetched = decode_upload(expect_status(response, &[200, 201])?)?;
        info!(upload_id = fetched.job.id, "upload accepted");
        Ok(fetched)
    }

    /// PUT `fields` to `/activities/{id}` and return the updated activity.
    pub async fn update_activity(&self, id: i64, fields: serde_json::Value) -> Result<Bytes> {
        let request = ApiRequest::with_body(
            Method::PUT,
            self.url(&format!("activities/{id}")),
            move || Payload::Json(fields.clone()),
        );
        let response = self.transport.send(&request).await?;
        expect_status(response, &[200])
    }
}

impl UploadSource for StravaApi {
    fn fetch_upload<'a>(
        &'a self,
        id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<FetchedUpload>> + Send + 'a>> {
        Box::pin(self.upload_status(id))
    }
}

fn expect_status(response: ApiResponse, accepted: &[u16]) -> Result<Bytes> {
    if accepted.contains(&response.status) {
        Ok(response.body)
    } else {
        Err(api_error(response.status, &response.body))
    }
}

fn decode_upload(raw: Bytes) -> Result<FetchedUpload> {
    let job: UploadJob =
        serde_json::from_slice(&raw).map_err(|e| Error::Decode(format!("upload: {e}")))?;
    Ok(FetchedUpload { job, raw })
}
