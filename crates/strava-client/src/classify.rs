//! Status classification and API error rendering
//!
//! 429 and 5xx are transient and retried by the transport. Everything else
//! outside 2xx is returned to the caller and rendered by [`api_error`] with
//! the remediation the operator needs.

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::error::Error;

/// Bodies at or above this size are not echoed into error messages.
const MAX_ECHOED_BODY: usize = 400;

static HTML_TAG: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<[^>]+>").ok());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    /// Rate limited or server error
    Retryable,
    Final,
}

pub fn classify_status(status: u16) -> StatusClass {
    match status {
        429 | 500.. => StatusClass::Retryable,
        200..=299 => StatusClass::Success,
        _ => StatusClass::Final,
    }
}

/// Render a non-success response as an operator-facing error.
pub fn api_error(status: u16, body: &[u8]) -> Error {
    let hint = match status {
        401 => " (run: strava auth login)",
        403 => " (check OAuth scopes at https://www.strava.com/settings/api)",
        404 => " (resource does not exist or is private)",
        429 => " (you've exceeded Strava's API limits; try again later)",
        _ => "",
    };
    let message = if !body.is_empty() && body.len() < MAX_ECHOED_BODY {
        format!(
            "HTTP {status}{hint}: {}",
            strip_html(&String::from_utf8_lossy(body))
        )
    } else {
        format!("HTTP {status}{hint}")
    };
    Error::Api { status, message }
}

/// Remove markup from server messages so they render cleanly in a terminal.
pub fn strip_html(s: &str) -> String {
    match HTML_TAG.as_ref() {
        Some(re) => re.replace_all(s, "").trim().to_string(),
        None => s.trim().to_string(),
    }
}
