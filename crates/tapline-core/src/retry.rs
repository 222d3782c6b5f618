//! Retry with exponential backoff for throttled requests

use std::time::Duration;

use crate::clock::Clock;
use crate::error::TapError;
use crate::events::{Event, Observer};

/// Default attempt budget for throttled requests
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default backoff base (2s, 4s, 8s, ...)
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff: `base * 2^attempt`, attempt counted from 0
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Linear backoff: `base * attempt_number`, attempt counted from 1
pub fn linear_backoff(base: Duration, attempt_number: u32) -> Duration {
    base * attempt_number
}

/// Retry a throttled operation with exponential backoff.
///
/// Only [`TapError::is_retryable`] errors are retried; anything else is
/// returned untouched. Exhausting the budget yields
/// [`TapError::MaxRetriesExceeded`] for `endpoint`.
pub fn retry_with_backoff<T>(
    endpoint: &str,
    policy: &RetryPolicy,
    clock: &dyn Clock,
    observer: &dyn Observer,
    mut attempt_fn: impl FnMut(u32) -> Result<T, TapError>,
) -> Result<T, TapError> {
    let mut attempt = 0u32;
    loop {
        match attempt_fn(attempt) {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() => {
                if attempt + 1 >= policy.max_attempts {
                    log::error!("{endpoint}: giving up after {} attempts", attempt + 1);
                    return Err(TapError::MaxRetriesExceeded {
                        endpoint: endpoint.to_string(),
                        attempts: attempt + 1,
                    });
                }
                let delay = policy.backoff(attempt);
                observer.observe(&Event::RetryScheduled {
                    endpoint: endpoint.to_string(),
                    attempt: attempt + 1,
                    delay,
                });
                clock.sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ManualClock, RecordingObserver};

    fn throttled() -> TapError {
        TapError::Throttled {
            endpoint: "GET u".into(),
            attempt: 0,
        }
    }

    #[test]
    fn backoff_exponential() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(2));
        assert_eq!(policy.backoff(1), Duration::from_secs(4));
        assert_eq!(policy.backoff(2), Duration::from_secs(8));
    }

    #[test]
    fn backoff_linear() {
        let base = Duration::from_secs(3);
        assert_eq!(linear_backoff(base, 1), Duration::from_secs(3));
        assert_eq!(linear_backoff(base, 2), Duration::from_secs(6));
        assert_eq!(linear_backoff(base, 3), Duration::from_secs(9));
    }

    #[test]
    fn first_success_never_sleeps() {
        let clock = ManualClock::new();
        let observer = RecordingObserver::new();
        let out = retry_with_backoff("GET u", &RetryPolicy::default(), &clock, &observer, |_| {
            Ok::<_, TapError>(7)
        });
        assert_eq!(out.unwrap(), 7);
        assert!(clock.sleeps().is_empty());
        assert!(observer.events().is_empty());
    }

    #[test]
    fn exhaustion_reports_endpoint_and_attempts() {
        let clock = ManualClock::new();
        let observer = RecordingObserver::new();
        let mut calls = 0;
        let err = retry_with_backoff(
            "GET https://x",
            &RetryPolicy::default(),
            &clock,
            &observer,
            |_| -> Result<(), TapError> {
                calls += 1;
                Err(throttled())
            },
        )
        .unwrap_err();

        assert_eq!(calls, 5);
        // no sleep after the final attempt
        assert_eq!(clock.sleeps().len(), 4);
        match err {
            TapError::MaxRetriesExceeded { endpoint, attempts } => {
                assert_eq!(endpoint, "GET https://x");
                assert_eq!(attempts, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_retryable_error_returned_immediately() {
        let clock = ManualClock::new();
        let observer = RecordingObserver::new();
        let err = retry_with_backoff(
            "GET u",
            &RetryPolicy::default(),
            &clock,
            &observer,
            |_| -> Result<(), TapError> {
                Err(TapError::Http {
                    endpoint: "GET u".into(),
                    status: Some(500),
                    message: "boom".into(),
                })
            },
        )
        .unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(clock.sleeps().is_empty());
    }
}
