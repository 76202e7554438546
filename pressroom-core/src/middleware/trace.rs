//! Request span maker that keeps secrets out of logs.

use axum::http::{Request, Uri};
use tower_http::trace::MakeSpan;
use tracing::Span;

/// Query parameters whose values are replaced with `[REDACTED]`.
const SENSITIVE_PARAMS: &[&str] = &[
    "token",
    "csrf_token",
    "access_token",
    "refresh_token",
    "password",
    "apikey",
];

#[derive(Clone, Debug, Default)]
pub struct SanitizedMakeSpan;

impl<B> MakeSpan<B> for SanitizedMakeSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        tracing::info_span!(
            "http",
            method = %request.method(),
            uri = %redact_query(request.uri()),
            version = ?request.version(),
        )
    }
}

fn redact_pair(pair: &str) -> String {
    match pair.split_once('=') {
        Some((key, _)) if SENSITIVE_PARAMS.contains(&key.to_ascii_lowercase().as_str()) => {
            format!("{key}=[REDACTED]")
        }
        _ => pair.to_string(),
    }
}

fn redact_query(uri: &Uri) -> String {
    match uri.query() {
        None => uri.path().to_string(),
        Some(query) => {
            let pairs: Vec<String> = query.split('&').map(redact_pair).collect();
            format!("{}?{}", uri.path(), pairs.join("&"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_only() {
        let uri: Uri = "/api/articles/ipo-watch".parse().unwrap();
        assert_eq!(redact_query(&uri), "/api/articles/ipo-watch");
    }

    #[test]
    fn test_harmless_query_untouched() {
        let uri: Uri = "/api/articles?page=2&category=ipo".parse().unwrap();
        assert_eq!(redact_query(&uri), "/api/articles?page=2&category=ipo");
    }

    #[test]
    fn test_secret_values_redacted() {
        let uri: Uri = "/api/auth/callback?access_token=eyJ.x.y&refresh_token=r1&next=/admin"
            .parse()
            .unwrap();
        assert_eq!(
            redact_query(&uri),
            "/api/auth/callback?access_token=[REDACTED]&refresh_token=[REDACTED]&next=/admin"
        );
    }

    #[test]
    fn test_keys_match_case_insensitively() {
        let uri: Uri = "/x?CSRF_TOKEN=abc&flag".parse().unwrap();
        assert_eq!(redact_query(&uri), "/x?CSRF_TOKEN=[REDACTED]&flag");
    }
}
