//! Transport retry with full-jitter exponential backoff.
//!
//! Attempt `i` sleeps a uniform draw from `[0, ceiling_i]`, where the ceiling
//! grows as `scale * exp_base^i` (optionally jittered) and is clamped to
//! `[max(0, min_sleep), max_sleep]`.

use std::time::Duration;

use crate::http_client::{HttpClient, HttpError, HttpRequest, HttpResponse};

/// Random wait inside an exponentially widening window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomExponentialSleep {
    /// Initial window, in seconds.
    pub scale: f64,
    /// Upper bound of the window, in seconds.
    pub max_sleep: f64,
    /// Lower bound of the window, in seconds.
    pub min_sleep: f64,
    pub exp_base: f64,
    /// Half-width of the uniform noise added to the ceiling, in seconds.
    pub jitter: f64,
}

impl Default for RandomExponentialSleep {
    fn default() -> Self {
        Self {
            scale: 1.0,
            max_sleep: 10.0,
            min_sleep: 1.0,
            exp_base: 2.0,
            jitter: 1.0,
        }
    }
}

impl RandomExponentialSleep {
    /// Upper bound of the sleep window for `attempt` (0-based), in seconds.
    pub fn ceiling_with(&self, rng: &mut fastrand::Rng, attempt: u32) -> f64 {
        let raw = i32::try_from(attempt)
            .ok()
            .map(|exponent| self.scale * self.exp_base.powi(exponent))
            .filter(|value| value.is_finite());
        let Some(raw) = raw else {
            return self.max_sleep;
        };

        let jittered = if self.jitter == 0.0 {
            raw
        } else {
            raw + uniform(rng, -self.jitter, self.jitter)
        };
        jittered.min(self.max_sleep).max(self.min_sleep.max(0.0))
    }

    /// Sleep length for `attempt`, in seconds.
    pub fn sample_with(&self, rng: &mut fastrand::Rng, attempt: u32) -> f64 {
        let ceiling = self.ceiling_with(rng, attempt);
        uniform(rng, 0.0, ceiling)
    }

    pub fn sample(&self, attempt: u32) -> Duration {
        let mut rng = fastrand::Rng::new();
        seconds(self.sample_with(&mut rng, attempt))
    }
}

fn uniform(rng: &mut fastrand::Rng, low: f64, high: f64) -> f64 {
    low + (high - low) * rng.f64()
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// Backoff strategy between retries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed { delay: Duration },
    FullJitter(RandomExponentialSleep),
}

impl Default for Backoff {
    fn default() -> Self {
        Self::FullJitter(RandomExponentialSleep::default())
    }
}

impl Backoff {
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::FullJitter(sleep) => sleep.sample(attempt),
        }
    }
}

/// Configuration for transport-level retries.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub enabled: bool,
    /// Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
    pub retry_on_status: Vec<u16>,
    /// Retry transport failures flagged retryable (timeouts, refused connections).
    pub retry_on_transport_error: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 4,
            backoff: Backoff::default(),
            retry_on_status: vec![408, 429, 500, 502, 503, 504],
            retry_on_transport_error: true,
        }
    }
}

impl RetryConfig {
    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed { delay },
            ..Self::default()
        }
    }

    pub fn no_retry() -> Self {
        Self {
            enabled: false,
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_on_status.contains(&status)
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

/// Execute `request`, retrying transient failures per `config`.
///
/// The last response or error is returned once retries are exhausted, so
/// callers still see the upstream status.
pub async fn send_with_retry(
    client: &dyn HttpClient,
    request: HttpRequest,
    config: &RetryConfig,
) -> Result<HttpResponse, HttpError> {
    let mut attempt = 0;
    loop {
        tracing::debug!(url = %request.url, attempt, "sending upstream request");
        let outcome = client.execute(request.clone()).await;

        let transient = match &outcome {
            Ok(response) => config.should_retry_status(response.status),
            Err(error) => config.retry_on_transport_error && error.retryable(),
        };
        if !transient || !config.enabled || attempt >= config.max_retries {
            return outcome;
        }

        let delay = config.delay_for_attempt(attempt);
        match &outcome {
            Ok(response) => tracing::warn!(
                url = %request.url,
                status = response.status,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "retrying upstream request"
            ),
            Err(error) => tracing::warn!(
                url = %request.url,
                error = %error,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "retrying upstream request"
            ),
        }
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
