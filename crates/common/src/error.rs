//! Settings and environment errors shared by the workspace

use thiserror::Error;

/// Errors raised while loading settings or resolving the environment
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_keeps_message() {
        let err = Error::Config("base_url must start with http:// or https://".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: base_url must start with http:// or https://"
        );
    }

    #[test]
    fn io_error_converts_with_question_mark() {
        fn open_missing() -> Result<String> {
            Ok(std::fs::read_to_string("/nonexistent/strava-cli/settings.toml")?)
        }
        let err = open_missing().unwrap_err();
        assert!(matches!(err, Error::Io(_)), "got: {err:?}");
        assert!(err.to_string().starts_with("I/O error:"));
    }

    #[test]
    fn toml_error_converts() {
        let parsed: std::result::Result<toml::Table, _> = toml::from_str("[api\nbase_url =");
        let err: Error = parsed.unwrap_err().into();
        assert!(matches!(err, Error::Toml(_)));
    }
}
