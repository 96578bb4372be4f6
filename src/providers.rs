//! Summarizer backends and the fallback chain that drives them.
//!
//! Summarization providers are interchangeable: each takes a title and an
//! article body and returns a summary or fails. They are tried in the
//! configured order until one gives an acceptable answer.
//!
//! # Architecture
//!
//! - [`Summarizer`]: core trait for one backend
//! - [`Backoff`]: decorator that retries a single backend with exponential
//!   backoff and jitter
//! - [`FallbackChain`]: ordered list of backends, itself a [`Summarizer`]
//!
//! Provider HTTP clients live with the caller; anything implementing
//! [`Summarizer`] can be chained.

use crate::content::{clamp_summary, looks_like_refusal};
use crate::error::{Error, Result};
use crate::utils::truncate_for_log;
use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// A summarization backend.
pub trait Summarizer {
    /// Short provider name used in logs.
    fn name(&self) -> &str;

    /// Summarize an article body.
    async fn summarize(&self, title: &str, content: &str) -> Result<String>;
}

/// Retries the wrapped [`Summarizer`] on error.
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..=max_jitter)
/// ```
pub struct Backoff<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
    max_jitter: StdDuration,
}

impl<T> Backoff<T>
where
    T: Summarizer,
{
    /// Wraps `inner` with a 30s delay cap and up to 250ms of jitter.
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
            max_jitter: StdDuration::from_millis(250),
        }
    }

    pub fn with_max_delay(mut self, max_delay: StdDuration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_max_jitter(mut self, max_jitter: StdDuration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    fn delay_for(&self, attempt: usize) -> StdDuration {
        let shift = (attempt.saturating_sub(1)).min(31) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rng().random_range(0..=jitter_ms)
        };
        delay + StdDuration::from_millis(jitter)
    }
}

impl<T> fmt::Debug for Backoff<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backoff")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("max_jitter", &self.max_jitter)
            .finish()
    }
}

impl<T> Summarizer for Backoff<T>
where
    T: Summarizer,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    #[instrument(level = "info", skip_all, fields(provider = %self.inner.name()))]
    async fn summarize(&self, title: &str, content: &str) -> Result<String> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.summarize(title, content).await {
                Ok(summary) => return Ok(summary),
                Err(e) => {
                    attempt += 1;
                    let elapsed_ms_attempt = attempt_t0.elapsed().as_millis();
                    let elapsed_ms_total = total_t0.elapsed().as_millis();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt,
                            elapsed_ms_total,
                            error = %e,
                            "summarize() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt,
                        elapsed_ms_total,
                        ?delay,
                        error = %e,
                        "summarize() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Tries each backend in order until one returns a usable summary.
///
/// An error or a refusal-looking answer moves on to the next backend. The
/// accepted summary is clamped with [`clamp_summary`].
#[derive(Debug)]
pub struct FallbackChain<S> {
    backends: Vec<S>,
}

impl<S> FallbackChain<S>
where
    S: Summarizer,
{
    pub fn new(backends: Vec<S>) -> Self {
        Self { backends }
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl<S> Summarizer for FallbackChain<S>
where
    S: Summarizer,
{
    fn name(&self) -> &str {
        "fallback-chain"
    }

    #[instrument(level = "info", skip_all, fields(backends = self.backends.len()))]
    async fn summarize(&self, title: &str, content: &str) -> Result<String> {
        for backend in &self.backends {
            let t0 = Instant::now();
            match backend.summarize(title, content).await {
                Ok(summary) if looks_like_refusal(&summary) => {
                    warn!(
                        provider = backend.name(),
                        preview = %truncate_for_log(&summary, 120),
                        "Provider returned a refusal; trying next provider"
                    );
                }
                Ok(summary) => {
                    let summary = clamp_summary(&summary);
                    info!(
                        provider = backend.name(),
                        words = summary.split_whitespace().count(),
                        elapsed_ms = t0.elapsed().as_millis(),
                        "Summary generated"
                    );
                    return Ok(summary);
                }
                Err(e) => {
                    warn!(provider = backend.name(), error = %e, "Provider failed; trying next provider");
                }
            }
        }
        Err(Error::ProvidersExhausted {
            tried: self.backends.len(),
        })
    }
}
