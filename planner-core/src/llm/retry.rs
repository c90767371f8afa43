//! Retry policy: per-class max attempts, jittered exponential backoff
//! (spec §4.4, §7, §8 property 6 "Retry determinism (modulo jitter)").
//!
//! Classification and delay computation are pure functions so tests can pin
//! the clock/RNG and assert exact delays; [`RetryManager::run`] is the only
//! place that actually sleeps.

use std::time::Duration;

use crate::error::{AgentError, ErrorKind};

/// Per-class retry budget and backoff base (spec §4.4 table).
#[derive(Clone, Copy, Debug)]
pub struct ClassPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

fn policy_for(kind: ErrorKind) -> ClassPolicy {
    match kind {
        ErrorKind::RateLimit => ClassPolicy {
            max_retries: 5,
            base_delay: Duration::from_secs(5),
        },
        ErrorKind::Timeout => ClassPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
        },
        ErrorKind::Network => ClassPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        },
        ErrorKind::ServerError => ClassPolicy {
            max_retries: 2,
            base_delay: Duration::from_secs(3),
        },
        _ => ClassPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
        },
    }
}

/// Computes `min(max_delay, base_delay * 2^attempt)` before jitter, per spec
/// §4.4. `attempt` is zero-based (the delay before the first retry, i.e.
/// after the first failure, uses `attempt == 0`).
pub fn backoff_delay(kind: ErrorKind, attempt: u32, max_delay: Duration) -> Duration {
    let policy = policy_for(kind);
    let factor = 2u64.saturating_pow(attempt);
    let scaled = policy.base_delay.saturating_mul(factor as u32).min(max_delay);
    scaled
}

/// Applies jitter in `[1 - jitter_range, 1 + jitter_range]` to a base delay,
/// using a caller-supplied uniform-[0,1) sample so tests can pin it exactly.
pub fn apply_jitter(delay: Duration, jitter_range: f64, uniform_sample: f64) -> Duration {
    let factor = 1.0 - jitter_range + uniform_sample * (2.0 * jitter_range);
    Duration::from_secs_f64((delay.as_secs_f64() * factor).max(0.0))
}

/// Maximum number of retries allowed for this error's class.
pub fn max_retries_for(err: &AgentError) -> u32 {
    policy_for(err.kind()).max_retries
}

/// Retry manager: classification + jittered backoff, with injected clock
/// (sleep function) and RNG for deterministic tests.
pub struct RetryManager {
    pub max_delay: Duration,
    pub jitter_range: f64,
    rng: Box<dyn FnMut() -> f64 + Send>,
    sleep: Box<dyn Fn(Duration) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> + Send + Sync>,
}

impl RetryManager {
    pub fn new() -> Self {
        Self::with_rng_and_sleep(
            Box::new(|| rand::random::<f64>()),
            std::sync::Arc::new(|d: Duration| {
                Box::pin(tokio::time::sleep(d)) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
            }),
        )
    }

    pub fn with_rng_and_sleep(
        rng: Box<dyn FnMut() -> f64 + Send>,
        sleep: std::sync::Arc<
            dyn Fn(Duration) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> + Send + Sync,
        >,
    ) -> Self {
        Self {
            max_delay: Duration::from_secs(60),
            jitter_range: 0.25,
            rng,
            sleep: Box::new(move |d| sleep(d)),
        }
    }

    /// Runs `op` up to its error class's retry budget. On the first success,
    /// returns it; on final failure, returns the last error (spec §4.4 "on
    /// final failure the wrapper raises a typed error carrying the original
    /// cause, the error class, and a user-friendly message" — the message and
    /// class are available via `AgentError::kind`/`ErrorKind::user_message`).
    pub async fn run<F, Fut, T>(&mut self, mut op: F) -> Result<T, AgentError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, AgentError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(err) => {
                    let kind = err.kind();
                    if !kind.is_retryable() {
                        return Err(err);
                    }
                    let budget = policy_for(kind).max_retries;
                    if attempt >= budget {
                        return Err(err);
                    }
                    let delay = backoff_delay(kind, attempt, self.max_delay);
                    let sample = (self.rng)();
                    let jittered = apply_jitter(delay, self.jitter_range, sample);
                    (self.sleep)(jittered).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn backoff_delay_doubles_per_attempt_until_capped() {
        let max = Duration::from_secs(1000);
        assert_eq!(backoff_delay(ErrorKind::RateLimit, 0, max), Duration::from_secs(5));
        assert_eq!(backoff_delay(ErrorKind::RateLimit, 1, max), Duration::from_secs(10));
        assert_eq!(backoff_delay(ErrorKind::RateLimit, 2, max), Duration::from_secs(20));
    }

    #[test]
    fn backoff_delay_respects_max_delay_cap() {
        let max = Duration::from_secs(8);
        assert_eq!(backoff_delay(ErrorKind::RateLimit, 5, max), max);
    }

    #[test]
    fn jitter_at_sample_zero_and_one_hits_the_range_bounds() {
        let base = Duration::from_secs(10);
        let low = apply_jitter(base, 0.25, 0.0);
        let high = apply_jitter(base, 0.25, 1.0);
        assert_eq!(low, Duration::from_secs_f64(7.5));
        assert_eq!(high, Duration::from_secs_f64(12.5));
    }

    #[tokio::test]
    async fn retries_rate_limit_then_succeeds_with_fixed_delays() {
        let calls = Arc::new(AtomicU32::new(0));
        let recorded: Arc<std::sync::Mutex<Vec<Duration>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorded_clone = recorded.clone();

        let mut mgr = RetryManager::with_rng_and_sleep(
            Box::new(|| 0.5), // midpoint sample -> no net jitter
            Arc::new(move |d: Duration| {
                recorded_clone.lock().unwrap().push(d);
                Box::pin(async {})
            }),
        );

        let calls_clone = calls.clone();
        let result: Result<&str, AgentError> = mgr
            .run(|| {
                let calls = calls_clone.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(AgentError::Llm {
                            kind: ErrorKind::RateLimit,
                            message: "slow down".into(),
                            retry_after: None,
                        })
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let delays = recorded.lock().unwrap();
        assert_eq!(delays.len(), 2);
        assert_eq!(delays[0], Duration::from_secs(5));
        assert_eq!(delays[1], Duration::from_secs(10));
    }

    #[tokio::test]
    async fn non_retryable_error_returns_immediately() {
        let mut mgr = RetryManager::with_rng_and_sleep(
            Box::new(|| 0.5),
            Arc::new(|_d| Box::pin(async {})),
        );
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let result: Result<(), AgentError> = mgr
            .run(|| {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(AgentError::Validation("bad arg".into()))
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_budget_and_returns_last_error() {
        let mut mgr = RetryManager::with_rng_and_sleep(Box::new(|| 0.5), Arc::new(|_d| Box::pin(async {})));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let result: Result<(), AgentError> = mgr
            .run(|| {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(AgentError::Llm {
                        kind: ErrorKind::ServerError,
                        message: "boom".into(),
                        retry_after: None,
                    })
                }
            })
            .await;
        assert!(result.is_err());
        // server_error budget is 2 retries -> 3 total attempts
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
