//! Error types for API calls

use crate::upload::FetchedUpload;

/// Errors from the transport, the typed API and the upload poller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] strava_auth::Error),

    /// Connection refused, DNS failure, timeout. Never retried.
    #[error("request failed: {0}")]
    Network(String),

    #[error("request failed after {retries} retries (last status: {status})")]
    RetriesExhausted { status: u16, retries: u32 },

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("decode response: {0}")]
    Decode(String),

    /// Carries the terminal upload so the caller can still render it.
    #[error("upload {id} failed: {message}")]
    UploadFailed {
        id: i64,
        message: String,
        upload: Box<FetchedUpload>,
    },

    #[error(
        "upload {id} still processing after {waited_secs}s\n  Hint: check later with: strava uploads get {id}"
    )]
    PollTimeout { id: i64, waited_secs: u64 },

    #[error(
        "stopped waiting for upload {id}; it is still processing on the server\n  Hint: check later with: strava uploads get {id}"
    )]
    Cancelled { id: i64 },

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
