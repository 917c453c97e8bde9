//! Strava API client
//!
//! [`Transport`] wraps every outbound call with token refresh, bearer
//! injection and bounded retries on 429/5xx. [`StravaApi`] builds the typed
//! calls on top of it and [`UploadPoller`] watches asynchronous uploads.

pub mod api;
pub mod classify;
pub mod error;
pub mod request;
pub mod transport;
pub mod upload;

pub use api::{DEFAULT_BASE_URL, StravaApi, UploadFile, infer_data_type};
pub use classify::{StatusClass, api_error, classify_status, strip_html};
pub use error::{Error, Result};
pub use request::{ApiRequest, Payload};
pub use transport::{ApiResponse, RetryPolicy, Transport};
pub use upload::{FetchedUpload, PollState, UploadJob, UploadPoller, UploadSource};
