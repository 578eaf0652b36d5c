use std::{future::Future, time::Duration};

use http::StatusCode;
use rand::Rng;

use crate::{error::ErrorKind, status::Status};

/// Default number of retries before an outcome is reported as-is, 0.
/// Link checks report a single failed attempt immediately to keep scan
/// latency bounded; callers opt into retries explicitly.
pub const DEFAULT_MAX_RETRIES: u64 = 0;
/// Default wait time in seconds before the first retry attempt, 1.
pub const DEFAULT_RETRY_WAIT_TIME: u64 = 1;

const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(60);
const JITTER: f64 = 0.2;

/// Bounded exponential backoff policy shared by every retried operation
/// in this crate.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u64,
    wait: Duration,
    max_wait: Duration,
    jitter: bool,
}

impl RetryPolicy {
    /// Create a policy with the given retry budget and initial wait time
    #[must_use]
    pub const fn new(max_retries: u64, wait: Duration) -> Self {
        Self {
            max_retries,
            wait,
            max_wait: DEFAULT_MAX_WAIT,
            jitter: true,
        }
    }

    /// Maximum number of retry attempts
    #[must_use]
    pub const fn max_retries(&self) -> u64 {
        self.max_retries
    }

    fn backoff(&self, wait: Duration) -> Duration {
        if !self.jitter {
            return wait;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(-JITTER..=JITTER);
        wait.mul_f64(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_RETRIES,
            Duration::from_secs(DEFAULT_RETRY_WAIT_TIME),
        )
    }
}

/// Retry a fallible async operation with bounded exponential backoff and
/// jitter.
///
/// `should_retry` classifies outcomes into transient and permanent ones;
/// permanent outcomes are returned immediately. The wait time doubles
/// after every attempt, capped by the policy.
pub async fn retry_with_backoff<T, F, Fut, P>(policy: &RetryPolicy, mut op: F, should_retry: P) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = T>,
    P: Fn(&T) -> bool,
{
    let mut outcome = op().await;
    let mut retries: u64 = 0;
    let mut wait = policy.wait;

    while retries < policy.max_retries && should_retry(&outcome) {
        tokio::time::sleep(policy.backoff(wait)).await;
        retries += 1;
        wait = wait.saturating_mul(2).min(policy.max_wait);
        outcome = op().await;
    }
    outcome
}

/// An extension trait to help determine if a given outcome is transient
/// and worth another attempt.
pub(crate) trait RetryExt {
    fn should_retry(&self) -> bool;
}

impl RetryExt for StatusCode {
    fn should_retry(&self) -> bool {
        self.is_server_error()
            || *self == StatusCode::REQUEST_TIMEOUT
            || *self == StatusCode::TOO_MANY_REQUESTS
    }
}

impl RetryExt for reqwest::Error {
    fn should_retry(&self) -> bool {
        if self.is_timeout() {
            true
        } else if self.is_connect()
            || self.is_body()
            || self.is_decode()
            || self.is_builder()
            || self.is_redirect()
        {
            false
        } else if let Some(status) = self.status() {
            status.should_retry()
        } else {
            false
        }
    }
}

impl RetryExt for ErrorKind {
    fn should_retry(&self) -> bool {
        match self {
            ErrorKind::NetworkRequest(e) | ErrorKind::BuildRequestClient(e) => e.should_retry(),
            ErrorKind::RejectedStatusCode(_, code) => code.should_retry(),
            _ => false,
        }
    }
}

impl RetryExt for Status {
    fn should_retry(&self) -> bool {
        match self {
            Status::Broken(code) => code.should_retry(),
            Status::Timeout(_) => true,
            Status::Ok(_) | Status::Redirected(_) | Status::Error(_) | Status::Excluded => false,
        }
    }
}

impl<T, E> RetryExt for Result<T, E>
where
    E: RetryExt,
{
    fn should_retry(&self) -> bool {
        match self {
            Ok(_) => false,
            Err(e) => e.should_retry(),
        }
    }
}
