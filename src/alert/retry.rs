//! Exponential backoff retry for alert delivery.
//!
//! Only transient sink errors are retried. Permanent errors are returned
//! immediately; the dispatcher logs and drops the alert either way once
//! this module gives up.

use std::time::Duration;

use tracing::warn;

use super::sink::{DeliverySink, SinkError, SinkErrorKind};
use crate::types::RecipientId;

/// Backoff schedule for redelivery attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Retry attempts after the initial send.
    pub max_retries: u32,

    /// Delay before the first retry; doubles (or whatever the multiplier
    /// says) from there.
    pub initial_delay: Duration,

    /// Ceiling on any single delay.
    pub max_delay: Duration,

    /// Growth factor between consecutive delays.
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Three retries at 2s, 4s, 8s: an alert is either out within ~14
    /// seconds or dropped. Alerts are time-sensitive, so there is no point
    /// retrying for minutes.
    pub const DEFAULT: Self = Self {
        max_retries: 3,
        initial_delay: Duration::from_secs(2),
        max_delay: Duration::from_secs(16),
        backoff_multiplier: 2.0,
    };

    /// The delay before retry number `attempt` (0-indexed), capped at
    /// `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let mut delay = self.initial_delay;
        for _ in 0..attempt {
            delay = delay.mul_f64(self.backoff_multiplier);
            if delay >= self.max_delay {
                return self.max_delay;
            }
        }
        delay.min(self.max_delay)
    }

    /// The full delay schedule, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries).map(|attempt| self.delay_for_attempt(attempt))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Sends one message body through the sink, retrying transient failures.
///
/// Returns `Ok(())` on the first successful send. Permanent errors are
/// returned immediately without retrying; transient errors are retried with
/// exponential backoff until `config.max_retries` is exhausted, after which
/// the last error is returned.
pub async fn deliver_with_retry<S: DeliverySink>(
    sink: &S,
    recipient: &RecipientId,
    body: &str,
    config: &RetryConfig,
) -> Result<(), SinkError> {
    let mut attempt = 0u32;
    loop {
        match sink.send(recipient, body).await {
            Ok(()) => return Ok(()),
            Err(e) if e.kind == SinkErrorKind::Permanent => return Err(e),
            Err(e) => {
                if attempt >= config.max_retries {
                    return Err(e);
                }
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    %recipient,
                    error = %e,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "delivery failed, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Clone)]
    struct ScriptedSink {
        calls: Arc<AtomicU32>,
        failures_before_success: u32,
        kind: SinkErrorKind,
    }

    impl DeliverySink for ScriptedSink {
        async fn send(&self, _recipient: &RecipientId, _body: &str) -> Result<(), SinkError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                match self.kind {
                    SinkErrorKind::Transient => Err(SinkError::transient("scripted failure")),
                    SinkErrorKind::Permanent => Err(SinkError::permanent("scripted failure")),
                }
            } else {
                Ok(())
            }
        }
    }

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn default_delays_are_2_4_8() {
        let delays: Vec<_> = RetryConfig::DEFAULT.delays().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8)
            ]
        );
    }

    #[tokio::test]
    async fn succeeds_on_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let sink = ScriptedSink {
            calls: calls.clone(),
            failures_before_success: 0,
            kind: SinkErrorKind::Transient,
        };

        let result =
            deliver_with_retry(&sink, &RecipientId::new("r"), "body", &fast_config()).await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_failure_then_success_delivers_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let sink = ScriptedSink {
            calls: calls.clone(),
            failures_before_success: 1,
            kind: SinkErrorKind::Transient,
        };

        let result =
            deliver_with_retry(&sink, &RecipientId::new("r"), "body", &fast_config()).await;
        assert!(result.is_ok());
        // One failure, one successful delivery: the recipient saw it once.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_error_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let sink = ScriptedSink {
            calls: calls.clone(),
            failures_before_success: u32::MAX,
            kind: SinkErrorKind::Permanent,
        };

        let result =
            deliver_with_retry(&sink, &RecipientId::new("r"), "body", &fast_config()).await;
        assert!(matches!(
            result,
            Err(SinkError {
                kind: SinkErrorKind::Permanent,
                ..
            })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_errors_exhaust_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let sink = ScriptedSink {
            calls: calls.clone(),
            failures_before_success: u32::MAX,
            kind: SinkErrorKind::Transient,
        };

        let result =
            deliver_with_retry(&sink, &RecipientId::new("r"), "body", &fast_config()).await;
        assert!(result.is_err());
        // Initial attempt + 3 retries
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    proptest! {
        #[test]
        fn delay_never_exceeds_cap(
            initial_ms in 1u64..1000,
            max_ms in 1000u64..60000,
            multiplier in 1.5f64..3.0,
            attempt in 0u32..10,
        ) {
            let config = RetryConfig {
                max_retries: 10,
                initial_delay: Duration::from_millis(initial_ms),
                max_delay: Duration::from_millis(max_ms),
                backoff_multiplier: multiplier,
            };
            prop_assert!(config.delay_for_attempt(attempt) <= Duration::from_millis(max_ms));
        }

        #[test]
        fn delay_sequence_is_monotonic(
            initial_ms in 1u64..1000,
            max_ms in 1000u64..60000,
            multiplier in 1.5f64..3.0,
            max_retries in 1u32..15,
        ) {
            let config = RetryConfig {
                max_retries,
                initial_delay: Duration::from_millis(initial_ms),
                max_delay: Duration::from_millis(max_ms),
                backoff_multiplier: multiplier,
            };
            let delays: Vec<_> = config.delays().collect();
            for window in delays.windows(2) {
                prop_assert!(window[1] >= window[0]);
            }
        }

        #[test]
        fn first_delay_equals_initial_delay(
            initial_ms in 1u64..10000,
            max_ms in 10000u64..100000,
            multiplier in 1.0f64..3.0,
        ) {
            let config = RetryConfig {
                max_retries: 5,
                initial_delay: Duration::from_millis(initial_ms),
                max_delay: Duration::from_millis(max_ms),
                backoff_multiplier: multiplier,
            };
            prop_assert_eq!(config.delay_for_attempt(0), Duration::from_millis(initial_ms));
        }
    }
}
