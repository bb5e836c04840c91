//! Shared HTTP transport with retry and backoff.
//!
//! Every outbound call (Drive, OAuth, device lookups, rank feed) goes
//! through one [`HttpPolicy`]:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - Network errors → retry
//! - Any other status → returned to the caller immediately
//!
//! Delays grow exponentially from the configured base: 1s, 2s, 4s, 8s, …
//! capped at 32× the base.

use std::time::Duration;

use anyhow::Result;
use reqwest::redirect::Policy;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::debug;

use crate::config::HttpConfig;

#[derive(Debug, Clone)]
pub struct HttpPolicy {
    client: Client,
    max_retries: u32,
    backoff_base: Duration,
}

impl HttpPolicy {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("folio/", env!("CARGO_PKG_VERSION")))
            .redirect(redirect_policy())
            .build()?;
        Ok(Self {
            client,
            max_retries: config.max_retries,
            backoff_base: Duration::from_secs(1),
        })
    }

    /// Replace the first retry delay. Tests use milliseconds.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Send the request built by `build`, rebuilding it for each attempt.
    ///
    /// Returns the first response that is not retryable, or the last
    /// retryable response once retries run out. Errors only when every
    /// attempt failed at the network level.
    pub async fn send_with_retry<F>(&self, build: F) -> reqwest::Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        self.send_with_replay(Replay::Always, build).await
    }

    /// Like [`send_with_retry`](Self::send_with_retry), with `replay` deciding
    /// which failures are safe to send again.
    pub async fn send_with_replay<F>(&self, replay: Replay, build: F) -> reqwest::Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let delay = self.backoff_base * (1u32 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }
            let last_attempt = attempt >= self.max_retries;
            attempt += 1;

            match build(&self.client).send().await {
                Ok(response) => {
                    let status = response.status();
                    if replay.retries_status(status) && !last_attempt {
                        debug!(%status, attempt, "retryable response");
                        continue;
                    }
                    return Ok(response);
                }
                Err(err) if replay.retries_error(&err) && !last_attempt => {
                    debug!(error = %err, attempt, "request failed, retrying");
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Which failures a request may be sent again after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replay {
    /// Idempotent requests: 429, 5xx and network errors.
    Always,
    /// Requests that create something: only 429 and failed connects, where
    /// the server cannot have acted on the body.
    BeforeDelivery,
}

impl Replay {
    fn retries_status(self, status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS
            || (self == Replay::Always && status.is_server_error())
    }

    fn retries_error(self, err: &reqwest::Error) -> bool {
        self == Replay::Always || err.is_connect()
    }
}

/// Follow ordinary redirects but hand 308 back to the caller: Drive uses it
/// to acknowledge a partial resumable upload.
fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.status() == StatusCode::PERMANENT_REDIRECT {
            attempt.stop()
        } else if attempt.previous().len() >= 10 {
            attempt.error("too many redirects")
        } else {
            attempt.follow()
        }
    })
}

/// Whether `source` names a remote resource rather than a local path.
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}
