//! Backoff for idempotent reads (allowance, owner, nonce lookups).
//!
//! Never wrap estimation or submission in this: a retried submission can
//! double-send, and estimation has a one-round-trip budget.

use anyhow::{Context, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms: base_delay_ms * 20,
            ..Default::default()
        }
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    fn delay(&self, attempt: u32) -> Duration {
        let delay_ms = self.base_delay_ms as f64 * self.exponential_base.powi(attempt as i32);
        let delay_ms = delay_ms.min(self.max_delay_ms as f64);

        let delay_ms = if self.jitter {
            delay_ms * rand::thread_rng().gen_range(0.5..=1.5)
        } else {
            delay_ms
        };

        Duration::from_millis(delay_ms as u64)
    }
}

/// Runs `operation`, retrying only errors that look transient.
pub async fn with_retry<T, F, Fut>(config: RetryConfig, operation_name: &str, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("{} succeeded on attempt {}", operation_name, attempt + 1);
                }
                return Ok(result);
            }
            Err(e) if attempt < config.max_retries && is_transient_error(&e) => {
                let delay = config.delay(attempt);
                debug!(
                    "{} failed (attempt {}/{}). Retrying in {:?}: {}",
                    operation_name,
                    attempt + 1,
                    config.max_retries + 1,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(e).context(format!(
                    "{} failed after {} attempt(s)",
                    operation_name,
                    attempt + 1
                ));
            }
        }
    }
}

pub fn is_transient_error(error: &anyhow::Error) -> bool {
    let error_msg = format!("{:?}", error).to_lowercase();

    let transient_patterns = [
        "timeout",
        "timed out",
        "connection refused",
        "connection reset",
        "network error",
        "temporary failure",
        "service unavailable",
        "bad gateway",
        "rate limited",
        "too many requests",
        "429",
        "502",
        "503",
    ];

    transient_patterns
        .iter()
        .any(|pattern| error_msg.contains(pattern))
}
