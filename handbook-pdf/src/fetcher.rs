//! Single-attempt HTTP page fetching
//!
//! Every section page is requested exactly once. Failures are returned as
//! values so the assembler can substitute a placeholder and carry on.

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use thiserror::Error;

/// A successfully fetched page body
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL the page was requested from
    pub url: String,
    /// Raw response body
    pub bytes: Vec<u8>,
    /// Charset declared in the `Content-Type` header, if any
    pub charset: Option<String>,
}

/// Why a page could not be fetched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// The request did not complete within the configured timeout
    #[error("request to {url} timed out after {secs}s")]
    Timeout {
        /// Requested URL
        url: String,
        /// Configured timeout in seconds
        secs: u64,
    },

    /// Connection, TLS, redirect or body read error
    #[error("network error fetching {url}: {message}")]
    Network {
        /// Requested URL
        url: String,
        /// Underlying error description
        message: String,
    },

    /// The server answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The HTTP client could not be constructed
    #[error("could not build HTTP client: {0}")]
    Client(String),
}

/// Source of page bodies
pub trait Fetch {
    /// Fetch one page; never retries
    fn fetch(&self, url: &str) -> Result<FetchedPage, FetchFailure>;
}

/// reqwest-based fetcher with a fixed timeout and identifying User-Agent
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Create a new fetcher
    ///
    /// # Parameters
    /// * `user_agent` - Value of the `User-Agent` header sent with every request
    /// * `timeout` - Per-request timeout
    ///
    /// # Returns
    /// * `Ok(HttpFetcher)` - Ready to fetch
    /// * `Err(FetchFailure::Client)` - The TLS backend or client could not be initialised
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchFailure> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchFailure::Client(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    fn classify(&self, url: &str, err: reqwest::Error) -> FetchFailure {
        if err.is_timeout() {
            FetchFailure::Timeout {
                url: url.to_string(),
                secs: self.timeout.as_secs(),
            }
        } else if let Some(status) = err.status() {
            FetchFailure::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchFailure::Network {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedPage, FetchFailure> {
        log::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| self.classify(url, e))?;

        let charset = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_from_content_type);

        let bytes = response.bytes().map_err(|e| self.classify(url, e))?;
        log::debug!("{}: {} bytes (charset {:?})", url, bytes.len(), charset);

        Ok(FetchedPage {
            url: url.to_string(),
            bytes: bytes.to_vec(),
            charset,
        })
    }
}

/// Extract the `charset` parameter of a `Content-Type` header value
fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("charset") {
            let value = value.trim().trim_matches('"');
            (!value.is_empty()).then(|| value.to_ascii_lowercase())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charset_from_content_type() {
        assert_eq!(
            charset_from_content_type("text/html; charset=UTF-8"),
            Some("utf-8".to_string())
        );
        assert_eq!(
            charset_from_content_type("text/html;Charset=\"windows-1252\""),
            Some("windows-1252".to_string())
        );
        assert_eq!(charset_from_content_type("text/html"), None);
        assert_eq!(charset_from_content_type("text/html; charset="), None);
    }

    #[test]
    fn test_failure_messages_name_the_url() {
        let failure = FetchFailure::Status {
            url: "https://example.org/a/".to_string(),
            status: 404,
        };
        assert_eq!(failure.to_string(), "https://example.org/a/ returned HTTP 404");

        let failure = FetchFailure::Timeout {
            url: "https://example.org/b/".to_string(),
            secs: 30,
        };
        assert!(failure.to_string().contains("timed out after 30s"));
    }

    #[test]
    fn test_unreachable_host_is_a_value_not_a_panic() {
        let fetcher = HttpFetcher::new("handbook-pdf tests", Duration::from_secs(2)).unwrap();
        // Port 9 on localhost (discard) is closed on test machines.
        let result = fetcher.fetch("http://127.0.0.1:9/");
        assert!(matches!(
            result,
            Err(FetchFailure::Network { .. }) | Err(FetchFailure::Timeout { .. })
        ));
    }
}
