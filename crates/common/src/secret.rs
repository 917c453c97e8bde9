//! Redacting wrapper for credentials held in memory

use std::fmt;
use zeroize::Zeroize;

/// Sensitive value: redacted in Debug/Display and wiped on drop.
///
/// Holds the OAuth client secret for the lifetime of a command so it can't
/// leak through `{:?}` in tracing fields or error messages.
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Borrow the inner value. Only the token endpoint client should need this.
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Secret<String> {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Secret<String> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_secret_is_redacted_in_debug_and_display() {
        let secret = Secret::new(String::from("3f1c-client-secret"));
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
        assert_eq!(format!("{secret}"), "[REDACTED]");
    }

    #[test]
    fn redacted_inside_derived_debug() {
        #[derive(Debug)]
        #[allow(dead_code)]
        struct Creds {
            client_id: String,
            client_secret: Secret<String>,
        }
        let creds = Creds {
            client_id: "12345".into(),
            client_secret: "hunter2".to_string().into(),
        };
        let debug = format!("{creds:?}");
        assert!(debug.contains("12345"));
        assert!(!debug.contains("hunter2"), "secret leaked: {debug}");
    }

    #[test]
    fn expose_and_clone_keep_value() {
        let secret = Secret::new(String::from("abc"));
        let copy = secret.clone();
        assert_eq!(copy.expose(), "abc");
        assert!(!copy.is_empty());
        assert!(Secret::new(String::new()).is_empty());
    }
}
