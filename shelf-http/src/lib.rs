//! Minimal HTML fetch client with safe logging, bounded timeouts, and checks.
//!
//! - Per-client options: total timeout, connect timeout, retries, body cap, user agent
//! - Rejects non-2xx responses, non-HTML content types, and oversized bodies
//! - Retries network errors, 429 and 5xx (off by default) with exponential
//!   backoff and `Retry-After` support
//! - Optional *raw* request/response logging via `SHELF_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), shelf_http::FetchError> {
//! let client = shelf_http::HttpClient::new(shelf_http::FetchOptions::default())?;
//! let url = url::Url::parse("https://example.com").unwrap();
//! let page = client.get_html(&url).await?;
//! assert!(page.status.is_success());
//! # Ok(()) }
//! ```
//!
//! Observability: structured `tracing` events are emitted for request start,
//! response headers, body snippets (truncated), retries, final errors, and
//! (optionally) raw request/response lines (target `http.raw`). Values of
//! secret-looking query parameters are redacted.

use reqwest::header::{
    ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER,
};
use reqwest::{Client, Method, StatusCode, redirect};
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use url::Url;

// ==============================
// Raw logging toggles
// ==============================

const RAW_ENV: &str = "SHELF_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;
const MAX_REDIRECTS: usize = 10;
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml;q=0.9,*/*;q=0.5";

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

/// Render a best-effort curl command for repro/debug, with secrets redacted.
fn make_curl(method: &Method, url: &Url, headers: &HeaderMap) -> String {
    let mut parts = vec!["curl".to_string(), format!("-X{}", method)];
    for (name, val) in redact_headers(headers) {
        parts.push(format!("-H '{}: {}'", name, val.replace('\'', r"'\''")));
    }
    let (host_path, query) = redact_query(url);
    let mut shown = format!("{}://{}", url.scheme(), host_path);
    if !query.is_empty() {
        let pairs: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
        shown.push('?');
        shown.push_str(&pairs.join("&"));
    }
    parts.push(format!("'{}'", shown));
    parts.join(" ")
}

/// Redact sensitive headers for logging
fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let mut val = v.to_str().unwrap_or("").to_string();
            if key.eq_ignore_ascii_case("authorization")
                || key.eq_ignore_ascii_case("cookie")
                || key.eq_ignore_ascii_case("set-cookie")
            {
                val = "<redacted>".into();
            }
            (key, val)
        })
        .collect()
}

// ==============================
// Errors
// ==============================

/// Why a page could not be fetched. Raised before any extraction runs.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("client build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("server returned {status} for {url}")]
    Status { status: StatusCode, url: String },
    #[error("unsupported content type: {0}")]
    ContentType(String),
    #[error("response body exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

impl FetchError {
    fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(timeout)
        } else if err.is_builder() {
            FetchError::Build(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }

    /// Whether another attempt could plausibly succeed.
    fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_) | FetchError::Timeout(_) => true,
            FetchError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }
}

// ==============================
// Options
// ==============================

/// Client-wide tuning knobs.
///
/// ```
/// use shelf_http::FetchOptions;
/// use std::time::Duration;
///
/// let opts = FetchOptions {
///     timeout: Duration::from_secs(3),
///     ..Default::default()
/// };
/// assert_eq!(opts.max_retries, 0);
/// assert_eq!(opts.max_body_bytes, 5 * 1024 * 1024);
/// ```
#[derive(Clone, Debug)]
pub struct FetchOptions {
    /// Upper bound for the whole exchange, body included.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_retries: usize,
    pub max_body_bytes: usize,
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            max_retries: 0,
            max_body_bytes: 5 * 1024 * 1024,
            user_agent: concat!("shelf/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

/// A successfully fetched HTML document.
#[derive(Clone, Debug)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: Url,
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: String,
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
    pub opts: FetchOptions,
}

impl HttpClient {
    /// Construct a client with the given options.
    ///
    /// ```no_run
    /// use shelf_http::{FetchError, FetchOptions, HttpClient};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new(FetchOptions::default())?;
    /// assert_eq!(client.opts.timeout, Duration::from_secs(10));
    /// # Ok::<(), FetchError>(())
    /// ```
    pub fn new(opts: FetchOptions) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        let inner = Client::builder()
            .connect_timeout(opts.connect_timeout)
            .user_agent(opts.user_agent.clone())
            .default_headers(headers)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| FetchError::Build(e.to_string()))?;
        Ok(Self { inner, opts })
    }

    /// Override the total timeout.
    ///
    /// ```no_run
    /// use shelf_http::{FetchError, FetchOptions, HttpClient};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new(FetchOptions::default())?
    ///     .with_timeout(Duration::from_secs(2));
    /// assert_eq!(client.opts.timeout, Duration::from_secs(2));
    /// # Ok::<(), FetchError>(())
    /// ```
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.opts.timeout = dur;
        self
    }

    /// Override the retry budget.
    pub fn with_retries(mut self, n: usize) -> Self {
        self.opts.max_retries = n;
        self
    }

    /// GET an HTML page.
    ///
    /// Fails on non-http(s) URLs, network errors, timeouts, non-2xx statuses,
    /// non-HTML content types, and bodies above `max_body_bytes`. A response
    /// without a `Content-Type` header is accepted. The body is decoded as
    /// UTF-8, replacing invalid sequences.
    pub async fn get_html(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::Url(format!(
                "unsupported scheme `{}` in {}",
                url.scheme(),
                url
            )));
        }

        let max_retries = self.opts.max_retries;
        let mut attempt = 0usize;
        loop {
            match self.attempt(url, attempt, max_retries).await {
                Ok(page) => return Ok(page),
                Err((err, retry_after)) => {
                    if err.is_transient() && attempt < max_retries {
                        attempt += 1;
                        let delay = retry_delay(retry_after, attempt, self.opts.timeout);
                        tracing::warn!(
                            host_path=%redact_query(url).0,
                            attempt,
                            max_retries,
                            backoff_ms=delay.as_millis() as u64,
                            error=%err,
                            "http.retrying"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(
                        host_path=%redact_query(url).0,
                        attempt = attempt + 1,
                        error=%err,
                        "http.error"
                    );
                    return Err(err);
                }
            }
        }
    }

    // ==============================
    // Core request implementation
    // ==============================

    /// One GET exchange. On failure also returns a server-requested retry delay.
    async fn attempt(
        &self,
        url: &Url,
        attempt: usize,
        max_retries: usize,
    ) -> Result<FetchedPage, (FetchError, Option<Duration>)> {
        let timeout = self.opts.timeout;
        let (host_path, redacted_q) = redact_query(url);

        tracing::debug!(
            attempt = attempt + 1,
            max_retries,
            method = %Method::GET,
            host_path = %host_path,
            query = ?redacted_q,
            timeout_ms = timeout.as_millis() as u64,
            "http.request.start"
        );
        if raw_enabled() {
            let curl = make_curl(&Method::GET, url, &HeaderMap::new());
            tracing::debug!(target: "http.raw", %curl, "request");
        }

        let t0 = Instant::now();
        let mut resp = self
            .inner
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| (FetchError::from_reqwest(e, timeout), None))?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let final_url = resp.url().clone();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        tracing::debug!(
            %status,
            final_url = %redact_query(&final_url).0,
            content_type = ?content_type,
            content_length = ?declared_len(&headers),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "http.response.headers"
        );

        if !status.is_success() {
            let err = FetchError::Status {
                status,
                url: final_url.to_string(),
            };
            return Err((err, retry_after_delay(&headers)));
        }

        if let Some(ct) = &content_type {
            if !is_html_content_type(ct) {
                return Err((FetchError::ContentType(ct.clone()), None));
            }
        }

        let limit = self.opts.max_body_bytes;
        if declared_len(&headers).is_some_and(|len| len > limit) {
            return Err((FetchError::TooLarge { limit }, None));
        }

        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| (FetchError::from_reqwest(e, timeout), None))?
        {
            if bytes.len() + chunk.len() > limit {
                return Err((FetchError::TooLarge { limit }, None));
            }
            bytes.extend_from_slice(&chunk);
        }

        if raw_enabled() {
            let hdrs = redact_headers(&headers);
            let shown = &bytes[..bytes.len().min(RAW_MAX_BODY)];
            tracing::info!(
                target: "http.raw",
                %status,
                headers = ?hdrs,
                body = %String::from_utf8_lossy(shown),
                truncated = bytes.len() > RAW_MAX_BODY,
            );
        }
        tracing::trace!(
            body_len = bytes.len(),
            body_snippet = %snip_body(&bytes),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "http.response.body_snippet"
        );

        Ok(FetchedPage {
            url: final_url,
            status,
            content_type,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

// ==============================
// Helpers
// ==============================

fn backoff(attempt: usize) -> Duration {
    let shift = attempt.saturating_sub(1).min(16) as u32;
    Duration::from_millis(200u64.saturating_mul(1u64 << shift))
}

/// Wait before the next attempt. Never longer than one request timeout, so a
/// remote `Retry-After` cannot stall the caller beyond its own budget.
fn retry_delay(retry_after: Option<Duration>, attempt: usize, cap: Duration) -> Duration {
    retry_after.unwrap_or_else(|| backoff(attempt)).min(cap)
}

/// True for `text/html` and `application/xhtml+xml`, parameters ignored.
pub fn is_html_content_type(value: &str) -> bool {
    let essence = value
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    matches!(essence.as_str(), "text/html" | "application/xhtml+xml")
}

fn retry_after_delay(h: &HeaderMap) -> Option<Duration> {
    h.get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .trim()
        .parse()
        .ok()
        .map(Duration::from_secs)
}

fn declared_len(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<usize>().ok())
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(&body[..body.len().min(500)]).into_owned();
    if body.len() > 500 {
        snip.push_str("...");
    }
    snip
}

/// "host + path" plus the query with secret-looking values redacted.
fn redact_query(url: &Url) -> (String, Vec<(String, String)>) {
    let host_path = format!("{}{}", url.host_str().unwrap_or("-"), url.path());
    let redacted = url
        .query_pairs()
        .map(|(k, v)| {
            let k = k.to_string();
            let v = v.to_string();
            let is_secret = matches!(
                k.to_ascii_lowercase().as_str(),
                "access_token"
                    | "authorization"
                    | "auth"
                    | "key"
                    | "api_key"
                    | "apikey"
                    | "token"
                    | "secret"
                    | "client_secret"
                    | "password"
            );
            (k, if is_secret { "<redacted>".into() } else { v })
        })
        .collect::<Vec<_>>();
    (host_path, redacted)
}
