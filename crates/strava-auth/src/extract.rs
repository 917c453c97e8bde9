//! Pasted-input parsing for the manual and remote login flows
//!
//! Operators paste either the whole redirect URL their browser landed on or
//! only the `code` value. Anything that looks like a URL (contains `?` or `&`)
//! is parsed for query parameters; anything else is taken as the bare code.

use url::Url;

/// Extract the authorization code from a pasted redirect URL or bare code.
///
/// Falls back to the whole input when no `code` parameter can be found.
pub fn extract_code(input: &str) -> String {
    if looks_like_url(input)
        && let Some(code) = query_param(input, "code").filter(|c| !c.is_empty())
    {
        return code;
    }
    input.to_string()
}

/// Extract `(code, state)` from a pasted redirect URL.
///
/// Shell backslash escapes (`\?`, `\&` from an unquoted paste) are removed
/// first. Bare input yields the input as the code and an empty state.
pub fn extract_code_and_state(input: &str) -> (String, String) {
    let cleaned: String = input.trim().chars().filter(|c| *c != '\\').collect();
    if looks_like_url(&cleaned)
        && let Some(url) = parse_lenient(&cleaned)
    {
        let mut code = String::new();
        let mut state = String::new();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" if code.is_empty() => code = value.into_owned(),
                "state" if state.is_empty() => state = value.into_owned(),
                _ => {}
            }
        }
        return (code, state);
    }
    (cleaned, String::new())
}

/// Whether the redirect target is this machine.
pub fn is_loopback(uri: &str) -> bool {
    let Ok(url) = Url::parse(uri) else {
        return false;
    };
    matches!(
        url.host_str(),
        Some("localhost") | Some("127.0.0.1") | Some("[::1]")
    )
}

fn looks_like_url(input: &str) -> bool {
    input.contains('?') || input.contains('&')
}

fn query_param(input: &str, name: &str) -> Option<String> {
    parse_lenient(input)?
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// Parse absolute URLs as-is and treat relative input such as
/// `/callback?code=..` or `code=..&state=..` as relative to a dummy base.
fn parse_lenient(input: &str) -> Option<Url> {
    if let Ok(url) = Url::parse(input) {
        return Some(url);
    }
    let base = Url::parse("http://paste.invalid/").ok()?;
    let relative = if input.starts_with('/') || input.starts_with('?') {
        input.to_string()
    } else {
        format!("?{input}")
    };
    base.join(&relative).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_code_is_returned_unchanged() {
        assert_eq!(extract_code("abc123xyz"), "abc123xyz");
    }

    #[test]
    fn full_url_yields_code_param() {
        let input = "https://tortugas.example.site/auth/callback?state=&code=abc123xyz&scope=read,activity:read_all";
        assert_eq!(extract_code(input), "abc123xyz");
    }

    #[test]
    fn url_without_code_falls_back_to_input() {
        let input = "https://example.com/callback?error=access_denied";
        assert_eq!(extract_code(input), input);
    }

    #[test]
    fn code_and_state_from_full_url() {
        assert_eq!(
            extract_code_and_state("http://host/cb?code=abc&state=xyz"),
            ("abc".to_string(), "xyz".to_string())
        );
    }

    #[test]
    fn bare_input_has_empty_state() {
        assert_eq!(
            extract_code_and_state("abc"),
            ("abc".to_string(), String::new())
        );
    }

    #[test]
    fn shell_escapes_are_stripped() {
        let input = r"http://localhost:8089/callback\?state=s1\&code=c1\&scope=read";
        assert_eq!(
            extract_code_and_state(input),
            ("c1".to_string(), "s1".to_string())
        );
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let (code, state) = extract_code_and_state("  http://localhost/cb?code=a&state=b \n");
        assert_eq!(code, "a");
        assert_eq!(state, "b");
    }

    #[test]
    fn url_without_code_yields_empty_code() {
        let (code, state) = extract_code_and_state("http://localhost/cb?state=only");
        assert!(code.is_empty());
        assert_eq!(state, "only");
    }

    #[test]
    fn query_fragment_without_scheme_is_parsed() {
        assert_eq!(
            extract_code_and_state("code=abc&state=xyz"),
            ("abc".to_string(), "xyz".to_string())
        );
    }

    #[test]
    fn loopback_detection() {
        let cases = [
            ("http://localhost:8089/callback", true),
            ("http://127.0.0.1:8089/callback", true),
            ("http://[::1]:8089/callback", true),
            ("https://tortugas.example.site/auth/callback", false),
            ("https://myapp.example.com/callback", false),
            ("", false),
        ];
        for (uri, want) in cases {
            assert_eq!(is_loopback(uri), want, "is_loopback({uri:?})");
        }
    }
}
