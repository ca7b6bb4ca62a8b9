//! Page retrieval with bounded retries and soft-block detection.
//!
//! A [`Fetcher`] owns one `reqwest::Client` for the whole batch so that
//! connections are reused between sequential requests. How a response is
//! judged (which statuses mean "blocked", which phrases mark a login wall
//! or maintenance page, how long to wait between attempts) comes from the
//! site's [`FetchProfile`].
//!
//! Anything that implements [`PageSource`] can stand in for the network:
//! [`SavedPage`] serves a file from disk, which is how pages are replayed
//! offline.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use url::Url;

use crate::encoding::decode_body;
use crate::{ChumonError, FetchFailure, Result};

/// Desktop Chrome on Windows, matching the headers the shops expect.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// HTTP client configuration shared by every request in a batch.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Total attempts per URL, including the first.
    pub max_attempts: u32,
    /// User-Agent string.
    pub user_agent: String,
    /// Extra headers sent with every request.
    pub headers: Vec<(String, String)>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout: 20, max_attempts: 3, user_agent: DEFAULT_USER_AGENT.to_string(), headers: Vec::new() }
    }
}

/// Wait between two attempts at the same URL. Never shrinks.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDelay {
    /// Same pause every time.
    Fixed(Duration),
    /// `base + step × attempt`
    Linear { base: Duration, step: Duration },
    /// `base × 2^attempt` plus a random jitter drawn from `jitter_min..jitter_max`.
    Exponential { base: Duration, jitter_min: Duration, jitter_max: Duration },
}

impl RetryDelay {
    /// Pause after the failed attempt with zero-based index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            RetryDelay::Fixed(delay) => *delay,
            RetryDelay::Linear { base, step } => *base + step.saturating_mul(attempt),
            RetryDelay::Exponential { base, jitter_min, jitter_max } => {
                let backoff = base.saturating_mul(1u32 << attempt.min(16));
                let jitter = if jitter_max > jitter_min {
                    rand::rng().random_range(*jitter_min..*jitter_max)
                } else {
                    *jitter_min
                };
                backoff.saturating_add(jitter)
            }
        }
    }
}

/// Pause inserted before a fetch that follows another fetch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PoliteDelay {
    Fixed(Duration),
    /// Uniformly drawn from `min..max` for every fetch.
    Random { min: Duration, max: Duration },
}

impl PoliteDelay {
    pub fn sample(&self) -> Duration {
        match self {
            PoliteDelay::Fixed(delay) => *delay,
            PoliteDelay::Random { min, max } if max > min => rand::rng().random_range(*min..*max),
            PoliteDelay::Random { min, .. } => *min,
        }
    }
}

/// How one site's responses are judged.
#[derive(Debug, Clone)]
pub struct FetchProfile {
    /// Statuses that mean "bot protection kicked in" rather than a real error.
    pub block_statuses: Vec<u16>,
    /// Phrases (matched case-insensitively) that mark a challenge, login
    /// wall or maintenance page served with a success status.
    pub soft_block_markers: Vec<String>,
    /// Sent as `Referer` when present.
    pub referer: Option<String>,
    pub retry_delay: RetryDelay,
}

impl Default for FetchProfile {
    fn default() -> Self {
        Self {
            block_statuses: vec![403],
            soft_block_markers: Vec::new(),
            referer: None,
            retry_delay: RetryDelay::Fixed(Duration::from_secs(2)),
        }
    }
}

impl FetchProfile {
    /// The first soft-block marker present in `body`.
    pub fn soft_block_in(&self, body: &str) -> Option<&str> {
        let lowered = body.to_lowercase();
        self.soft_block_markers
            .iter()
            .find(|marker| lowered.contains(&marker.to_lowercase()))
            .map(String::as_str)
    }
}

/// Something that can produce a page's markup for a URL.
#[allow(async_fn_in_trait)]
pub trait PageSource {
    async fn fetch_page(&self, url: &str, profile: &FetchProfile) -> std::result::Result<String, FetchFailure>;
}

enum Attempt {
    Page(String),
    Retry(FetchFailure),
    Fail(FetchFailure),
}

/// HTTP page fetcher.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    /// Builds the shared client with browser-like default headers.
    ///
    /// # Errors
    ///
    /// Returns [`ChumonError::ConfigError`] for header names or values that
    /// are not valid HTTP, and [`ChumonError::HttpError`] if the client
    /// cannot be constructed.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"),
        );
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("ja-JP,ja;q=0.9,en;q=0.8"));
        headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ChumonError::ConfigError(format!("Invalid header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ChumonError::ConfigError(format!("Invalid value for header {name}: {e}")))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    /// Fetches `url`, retrying block responses, timeouts, network errors and
    /// server errors up to the configured number of attempts.
    ///
    /// Other non-success statuses fail immediately with
    /// [`FetchFailure::HttpError`].
    pub async fn fetch(&self, url: &str, profile: &FetchProfile) -> std::result::Result<String, FetchFailure> {
        let parsed = Url::parse(url).map_err(|e| FetchFailure::NetworkError(format!("invalid URL: {e}")))?;
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            let failure = match self.attempt(parsed.clone(), profile).await {
                Attempt::Page(markup) => return Ok(markup),
                Attempt::Fail(failure) => return Err(failure),
                Attempt::Retry(failure) => failure,
            };

            attempt += 1;
            if attempt >= max_attempts {
                tracing::warn!(url, attempts = attempt, error = %failure, "giving up after retries");
                return Err(failure);
            }

            let delay = profile.retry_delay.delay_for(attempt - 1);
            tracing::warn!(
                url,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "retrying page fetch"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt(&self, url: Url, profile: &FetchProfile) -> Attempt {
        let mut request = self.client.get(url);
        if let Some(referer) = &profile.referer {
            request = request.header(header::REFERER, referer);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Attempt::Retry(transport_failure(&e)),
        };

        let status = response.status();
        if profile.block_statuses.contains(&status.as_u16()) {
            return Attempt::Retry(FetchFailure::BotBlocked);
        }
        if status.is_server_error() {
            return Attempt::Retry(FetchFailure::HttpError(status.as_u16()));
        }
        if !status.is_success() {
            return Attempt::Fail(FetchFailure::HttpError(status.as_u16()));
        }

        let content_type = content_type(&response);
        if let Some(ct) = &content_type
            && !ct.to_ascii_lowercase().contains("html")
        {
            tracing::debug!(content_type = %ct, "response is not HTML");
            return Attempt::Retry(FetchFailure::NoContent);
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return Attempt::Retry(transport_failure(&e)),
        };
        let markup = decode_body(&bytes, content_type.as_deref());

        if markup.trim().is_empty() {
            return Attempt::Retry(FetchFailure::NoContent);
        }
        if let Some(marker) = profile.soft_block_in(&markup) {
            tracing::warn!(marker, "soft-block marker in response");
            return Attempt::Retry(FetchFailure::BotBlocked);
        }

        Attempt::Page(markup)
    }
}

impl PageSource for Fetcher {
    async fn fetch_page(&self, url: &str, profile: &FetchProfile) -> std::result::Result<String, FetchFailure> {
        self.fetch(url, profile).await
    }
}

fn content_type(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

fn transport_failure(err: &reqwest::Error) -> FetchFailure {
    if err.is_timeout() { FetchFailure::Timeout } else { FetchFailure::NetworkError(err.to_string()) }
}

/// A page saved to disk, served for every URL.
#[derive(Debug, Clone)]
pub struct SavedPage {
    markup: String,
}

impl SavedPage {
    pub fn new(markup: impl Into<String>) -> Self {
        Self { markup: markup.into() }
    }

    /// Loads a saved page, detecting its encoding like a live response.
    pub fn from_file(path: &str) -> Result<Self> {
        fetch_file(path).map(Self::new)
    }
}

impl PageSource for SavedPage {
    async fn fetch_page(&self, _url: &str, _profile: &FetchProfile) -> std::result::Result<String, FetchFailure> {
        if self.markup.trim().is_empty() { Err(FetchFailure::NoContent) } else { Ok(self.markup.clone()) }
    }
}

/// Reads HTML content from a local file.
///
/// The bytes go through the same charset detection as network responses.
pub fn fetch_file(path: &str) -> Result<String> {
    let path_buf = PathBuf::from(path);

    if !path_buf.exists() {
        Err(ChumonError::FileNotFound(path_buf))
    } else {
        let bytes = fs::read(&path_buf)?;
        Ok(decode_body(&bytes, None))
    }
}
