//! Retry configuration, delay calculation, and the retry scheduler.
//!
//! The dispatch interceptor hands a failed first attempt to
//! [`RetryScheduler::run`], which re-issues the operation tagged as a retry
//! with exponential backoff: `base_delay * 2^attempt` for attempts `1..=3`
//! (2s, 4s, 8s with the default 1s base). The scheduler never
//! notifies; it reports a [`RetryOutcome`] and the interceptor decides what
//! the user sees.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::telemetry;
use crate::{HermodError, Result};

/// Configuration for retry behaviour on transient errors.
///
/// ```rust
/// # use hermod::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_retries(2)
///     .base_delay(Duration::from_millis(200));
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt. Default: 3.
    pub max_retries: u32,
    /// Base of the exponential backoff. Default: 1s.
    pub base_delay: Duration,
    /// Maximum delay between retries (caps exponential growth). Default: 30s.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Set the maximum number of retries (not counting the initial attempt).
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Set the backoff base.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay before retry number `attempt` (1-indexed).
    ///
    /// `base_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }
}

/// How a retry sequence ended.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    /// A retry succeeded.
    Recovered { value: T, attempts: u32 },
    /// Every retry failed with a transient error.
    Exhausted { last: HermodError, attempts: u32 },
    /// A retry failed with a non-transient error; no further attempts.
    Aborted { error: HermodError, attempts: u32 },
}

/// Re-issues a failed operation with bounded exponential backoff.
#[derive(Debug, Clone, Default)]
pub struct RetryScheduler {
    config: RetryConfig,
}

impl RetryScheduler {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run up to `max_retries` retries of `f`.
    ///
    /// `f` receives the 1-indexed retry number. The initial attempt has
    /// already happened and is not repeated here.
    pub async fn run<F, Fut, T>(&self, operation: &str, mut f: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last = None;
        for attempt in 1..=self.config.max_retries {
            let delay = self.config.delay_for_attempt(attempt);
            warn!(
                operation,
                attempt,
                max_retries = self.config.max_retries,
                delay_ms = delay.as_millis() as u64,
                "retrying after transient error"
            );
            tokio::time::sleep(delay).await;
            metrics::counter!(telemetry::RETRIES_TOTAL, "operation" => operation.to_owned())
                .increment(1);

            match f(attempt).await {
                Ok(value) => {
                    debug!(operation, attempt, "retry succeeded");
                    return RetryOutcome::Recovered {
                        value,
                        attempts: attempt,
                    };
                }
                Err(e) if e.is_transient() => last = Some(e),
                Err(error) => {
                    return RetryOutcome::Aborted {
                        error,
                        attempts: attempt,
                    };
                }
            }
        }
        RetryOutcome::Exhausted {
            last: last.unwrap_or(HermodError::Cancelled),
            attempts: self.config.max_retries,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tokio::time::Instant;

    use super::*;
    use crate::ErrorKind;

    fn server_fault() -> HermodError {
        HermodError::request(ErrorKind::ServerFault, Some(503), "unavailable")
    }

    #[test]
    fn delays_double_from_base() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(8));
    }

    #[test]
    fn delay_is_capped() {
        let config = RetryConfig::new().max_delay(Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(40), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_three_retries_with_backoff() {
        let scheduler = RetryScheduler::default();
        let start = Instant::now();
        let seen = Mutex::new(Vec::new());

        let outcome: RetryOutcome<()> = scheduler
            .run("op", |attempt| {
                seen.lock().unwrap().push((attempt, start.elapsed()));
                async { Err(server_fault()) }
            })
            .await;

        assert!(matches!(outcome, RetryOutcome::Exhausted { attempts: 3, .. }));
        let seen = seen.into_inner().unwrap();
        let at: Vec<u64> = seen.iter().map(|(_, t)| t.as_secs()).collect();
        assert_eq!(at, vec![2, 6, 14]);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_first_success() {
        let scheduler = RetryScheduler::default();
        let outcome = scheduler
            .run("op", |attempt| async move {
                if attempt < 2 { Err(server_fault()) } else { Ok(attempt) }
            })
            .await;
        assert!(matches!(
            outcome,
            RetryOutcome::Recovered { value: 2, attempts: 2 }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn aborts_on_permanent_error() {
        let scheduler = RetryScheduler::default();
        let outcome: RetryOutcome<()> = scheduler
            .run("op", |_| async {
                Err(HermodError::request(ErrorKind::Forbidden, Some(403), "no"))
            })
            .await;
        match outcome {
            RetryOutcome::Aborted { error, attempts } => {
                assert_eq!(error.kind(), ErrorKind::Forbidden);
                assert_eq!(attempts, 1);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn disabled_config_never_calls() {
        let scheduler = RetryScheduler::new(RetryConfig::disabled());
        let mut calls = 0;
        let outcome: RetryOutcome<()> = scheduler
            .run("op", |_| {
                calls += 1;
                async { Err(server_fault()) }
            })
            .await;
        assert!(matches!(outcome, RetryOutcome::Exhausted { attempts: 0, .. }));
        assert_eq!(calls, 0);
    }
}
