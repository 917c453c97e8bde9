//! Upload status and the upload poller
//!
//! Strava processes uploaded files asynchronously. The poller fetches the
//! upload every `interval` until it either names an activity or reports an
//! error. Giving up (deadline or cancellation) only stops the client side
//! from watching; the server-side job keeps running.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::classify::strip_html;
use crate::error::{Error, Result};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// The Upload object returned by `POST /uploads` and `GET /uploads/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadJob {
    pub id: i64,
    #[serde(default)]
    pub id_str: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub activity_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Pending,
    Succeeded { activity_id: i64 },
    Failed { message: String },
}

impl PollState {
    /// Classify one fetched job. An error wins over an activity id.
    pub fn from_job(job: &UploadJob) -> Self {
        if let Some(error) = job.error.as_deref().filter(|e| !e.trim().is_empty()) {
            return Self::Failed {
                message: strip_html(error),
            };
        }
        match job.activity_id {
            Some(activity_id) => Self::Succeeded { activity_id },
            None => Self::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A fetched job plus the raw response body, for `--json` pass-through.
#[derive(Debug, Clone)]
pub struct FetchedUpload {
    pub job: UploadJob,
    pub raw: Bytes,
}

/// Anything that can fetch the current state of an upload.
///
/// Uses `Pin<Box<dyn Future>>` so the poller can take `&dyn UploadSource`.
pub trait UploadSource: Send + Sync {
    fn fetch_upload<'a>(
        &'a self,
        id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<FetchedUpload>> + Send + 'a>>;
}

#[derive(Debug, Clone, Copy)]
pub struct UploadPoller {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for UploadPoller {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl UploadPoller {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Poll upload `id` until it is terminal.
    ///
    /// The first fetch happens immediately. `on_pending` is called with every
    /// non-terminal job. `cancel` resolving stops polling with
    /// [`Error::Cancelled`], including while a fetch is in flight.
    pub async fn wait<S, C, F>(
        &self,
        source: &S,
        id: i64,
        cancel: C,
        mut on_pending: F,
    ) -> Result<FetchedUpload>
    where
        S: UploadSource + ?Sized,
        C: Future<Output = ()>,
        F: FnMut(&UploadJob),
    {
        let started = Instant::now();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(cancel);

        loop {
            tokio::select! {
                biased;
                () = &mut cancel => return Err(Error::Cancelled { id }),
                _ = ticker.tick() => {}
            }

            let fetched = tokio::select! {
                biased;
                () = &mut cancel => return Err(Error::Cancelled { id }),
                fetched = source.fetch_upload(id) => fetched?,
            };

            match PollState::from_job(&fetched.job) {
                PollState::Succeeded { activity_id } => {
                    info!(upload_id = id, activity_id, "upload processed");
                    return Ok(fetched);
                }
                PollState::Failed { message } => {
                    info!(upload_id = id, "upload rejected by server");
                    return Err(Error::UploadFailed {
                        id,
                        message,
                        upload: Box::new(fetched),
                    });
                }
                PollState::Pending => {
                    let waited = started.elapsed();
                    debug!(
                        upload_id = id,
                        status = %fetched.job.status,
                        waited_secs = waited.as_secs(),
                        "upload still processing"
                    );
                    if waited >= self.timeout {
                        return Err(Error::PollTimeout {
                            id,
                            waited_secs: waited.as_secs(),
                        });
                    }
                    on_pending(&fetched.job);
                }
            }
        }
    }
}
