//! Shared HTTP plumbing for the deploy, notification and release clients.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::blocking::{Client, Response};
use serde_json::json;

use crate::error::{Error, ErrorCode, Result};

const USER_AGENT: &str = concat!("liftoff/", env!("CARGO_PKG_VERSION"));

/// Blocking client. `None` means no request deadline at all.
pub fn client(timeout: Option<Duration>) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| Error::internal_unexpected(format!("HTTP client setup failed: {}", e)))
}

/// `Authorization` header value for HTTP Basic auth.
pub fn basic_auth_header(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
}

/// Transport-level failure (DNS, TLS, connection reset, deadline).
///
/// `url` is the only address reported; the one inside `e` is stripped, since
/// callers may pass a redacted label for URLs that carry credentials.
pub fn request_error(code: ErrorCode, url: &str, e: reqwest::Error) -> Error {
    let e = e.without_url();
    let mut err = Error::new(
        code,
        format!("HTTP request to {} failed: {}", url, e),
        json!({ "url": url, "error": e.to_string(), "timeout": e.is_timeout() }),
    );
    if e.is_timeout() {
        err = err.with_hint("The request hit the configured deadline; raise or unset it");
    }
    err
}

/// Status code and body text, reading the body even on error statuses.
pub fn read_response(response: Response) -> (u16, String) {
    let status = response.status().as_u16();
    let body = response
        .text()
        .unwrap_or_else(|e| format!("<unreadable body: {}>", e.without_url()));
    (status, body)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_header_encodes_credentials() {
        assert_eq!(
            basic_auth_header("$deployer", "hunter2"),
            "Basic JGRlcGxveWVyOmh1bnRlcjI="
        );
    }

    #[test]
    fn client_builds_without_timeout() {
        assert!(client(None).is_ok());
    }

    #[test]
    fn transport_error_omits_url_from_text() {
        let err = testing::client()
            .get("http://127.0.0.1:1/hooks/T000/SECRETTOKEN")
            .send()
            .unwrap_err();
        let err = request_error(ErrorCode::NotifyFailed, "<webhook>", err);
        assert!(!err.message.contains("SECRETTOKEN"));
        assert!(!err.details.to_string().contains("SECRETTOKEN"));
        assert_eq!(err.details["url"], "<webhook>");
    }

    #[test]
    fn truncated_body_is_marked_not_dropped() {
        let (base, server) = testing::serve_once(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 64\r\nConnection: close\r\n\r\ndisk"
                .to_string(),
        );
        let response = testing::client().get(&base).send().unwrap();
        let (status, body) = read_response(response);
        server.join().unwrap();

        assert_eq!(status, 500);
        assert!(body.starts_with("<unreadable body:"), "{}", body);
    }
}
