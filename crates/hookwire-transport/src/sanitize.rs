//! URL redaction for logs.
//!
//! Webhook URLs carry their secret in the final path segment (and sometimes
//! in the query), so they are never logged verbatim.

use url::Url;

/// Placeholder for a redacted segment.
pub const REDACTED: &str = "***";

/// Placeholder for a URL that could not be parsed.
pub const INVALID_URL: &str = "***invalid-url***";

/// Returns `url` with its last path segment replaced by `***` and the query
/// and fragment removed.
///
/// ```
/// use hookwire_transport::sanitize_url;
///
/// assert_eq!(
///     sanitize_url("https://hook.eu1.make.com/abc123?x=1"),
///     "https://hook.eu1.make.com/***"
/// );
/// ```
pub fn sanitize_url(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return INVALID_URL.to_string();
    };
    parsed.set_query(None);
    parsed.set_fragment(None);

    let segments: Vec<String> = parsed
        .path_segments()
        .map(|s| s.map(str::to_string).collect())
        .unwrap_or_default();
    let Some((_, head)) = segments.split_last() else {
        return parsed.to_string();
    };
    if segments.last().is_some_and(String::is_empty) {
        // Root or trailing-slash path.
        return parsed.to_string();
    }

    if let Ok(mut path) = parsed.path_segments_mut() {
        path.clear().extend(head).push(REDACTED);
    }
    parsed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_last_segment() {
        assert_eq!(
            sanitize_url("https://hook.eu1.make.com/abc123def"),
            "https://hook.eu1.make.com/***"
        );
        assert_eq!(
            sanitize_url("https://example.com/hooks/v1/s3cr3t?token=x#frag"),
            "https://example.com/hooks/v1/***"
        );
    }

    #[test]
    fn test_root_and_invalid() {
        assert_eq!(sanitize_url("https://example.com/"), "https://example.com/");
        assert_eq!(sanitize_url("https://example.com"), "https://example.com/");
        assert_eq!(sanitize_url("not a url"), INVALID_URL);
        assert_eq!(sanitize_url(""), INVALID_URL);
    }

    #[test]
    fn test_secret_never_survives() {
        let url = "http://127.0.0.1:8080/webhook/very-secret-token?key=also-secret";
        let clean = sanitize_url(url);
        assert!(!clean.contains("very-secret-token"));
        assert!(!clean.contains("also-secret"));
        assert_eq!(clean, "http://127.0.0.1:8080/webhook/***");
    }
}
