//! HTTP helpers for upstream geo-data services.
//!
//! Every adapter request goes through [`fetch_body`], which classifies the
//! outcome into a [`SourceError`] and retries exactly once on HTTP 429.
//! Nothing else is retried: a failed candidate is abandoned and the
//! strategy loop moves on.
//!
//! # Usage
//!
//! ```ignore
//! let client = http::client(http::timeout_from_env());
//! let body = http::fetch_body(&client, &url, &query).await?;
//! ```

use std::time::Duration;

use crate::SourceError;

/// Environment variable overriding the per-call timeout in seconds.
pub const TIMEOUT_ENV: &str = "LAND_VALUE_HTTP_TIMEOUT_SECS";

/// Per-call upstream timeout when [`TIMEOUT_ENV`] is unset.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

/// Timeout for health probes.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Retries granted to a rate-limited (HTTP 429) request.
const RATE_LIMIT_RETRIES: u32 = 1;

/// Backoff used when a 429 response carries no `Retry-After`.
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Upper bound for an honoured `Retry-After`.
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Maximum length of the response body preview included in logs.
const BODY_PREVIEW_LEN: usize = 200;

const USER_AGENT: &str = concat!("land-value/", env!("CARGO_PKG_VERSION"));

/// Reads the per-call timeout from [`TIMEOUT_ENV`].
#[must_use]
pub fn timeout_from_env() -> Duration {
    std::env::var(TIMEOUT_ENV)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|&secs| secs > 0)
        .map_or(DEFAULT_TIMEOUT, Duration::from_secs)
}

/// Shared connection pool plus the per-call timeout applied to each
/// request sent through [`fetch_body`].
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    timeout: Duration,
}

/// Builds a client whose every request is bounded by `timeout`.
#[must_use]
pub fn client(timeout: Duration) -> HttpClient {
    let inner = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|e| {
            log::warn!("Failed to build configured HTTP client ({e}), using defaults");
            reqwest::Client::new()
        });
    HttpClient { inner, timeout }
}

/// Sends a GET request and returns the body of a successful response.
///
/// # Errors
///
/// * [`SourceError::NetworkTimeout`] if the call exceeds the client timeout
/// * [`SourceError::Upstream`] for non-success statuses, including a 429
///   that persists after one retry
/// * [`SourceError::Http`] for other transport failures
pub async fn fetch_body(
    client: &HttpClient,
    url: &str,
    query: &[(String, String)],
) -> Result<Vec<u8>, SourceError> {
    for attempt in 0..=RATE_LIMIT_RETRIES {
        let response = client
            .inner
            .get(url)
            .query(query)
            .timeout(client.timeout)
            .send()
            .await
            .map_err(|e| classify(e, url))?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS && attempt < RATE_LIMIT_RETRIES {
            let delay = retry_after(&response).map_or(DEFAULT_BACKOFF, |d| d.min(MAX_BACKOFF));
            log::debug!("  HTTP 429 from {url}, retrying in {delay:?}");
            tokio::time::sleep(delay).await;
            continue;
        }

        if !status.is_success() {
            return Err(SourceError::Upstream {
                message: format!("HTTP {status}"),
            });
        }

        let body = response.bytes().await.map_err(|e| classify(e, url))?;
        log::trace!(
            "  {} bytes from {url}: {}",
            body.len(),
            preview(&body)
        );
        return Ok(body.to_vec());
    }

    Err(SourceError::Upstream {
        message: format!("HTTP 429 after {RATE_LIMIT_RETRIES} retry"),
    })
}

/// Returns `true` if `url` answers within [`HEALTH_TIMEOUT`] with a
/// success status and a body accepted by `looks_valid`.
pub async fn probe(
    client: &HttpClient,
    url: &str,
    query: &[(String, String)],
    looks_valid: impl Fn(&str) -> bool + Send,
) -> bool {
    let response = match client
        .inner
        .get(url)
        .query(query)
        .timeout(HEALTH_TIMEOUT)
        .send()
        .await
    {
        Ok(r) if r.status().is_success() => r,
        Ok(r) => {
            log::debug!("Health probe {url}: HTTP {}", r.status());
            return false;
        }
        Err(e) => {
            log::debug!("Health probe {url}: {e}");
            return false;
        }
    };

    response.text().await.is_ok_and(|body| looks_valid(&body))
}

/// Maps a transport error to the taxonomy.
fn classify(e: reqwest::Error, url: &str) -> SourceError {
    if e.is_timeout() {
        SourceError::NetworkTimeout {
            url: url.to_string(),
        }
    } else {
        SourceError::Http(e)
    }
}

/// Parses a `Retry-After` header given in seconds.
fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn preview(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    text.chars().take(BODY_PREVIEW_LEN).collect()
}
