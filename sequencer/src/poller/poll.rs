// (c) Cartesi and individual authors (see AUTHORS)
// SPDX-License-Identifier: Apache-2.0 (see LICENSE)

use std::fmt;
use std::future::Future;

use tokio::time::{Instant, sleep, sleep_until, timeout_at};
use tracing::{debug, warn};

use super::{PollError, PollOptions};

// Consecutive probe failures between two warnings; single failures only log at debug.
const PROBE_FAILURE_WARN_EVERY: u64 = 10;

/// Evaluates `action` until `predicate` accepts its result.
///
/// A failing `action` counts as "not yet": the error is logged and the loop retries after
/// `options.interval`. With `options.timeout` set, the whole loop (including an attempt
/// still in flight) is bounded by that deadline and fails with
/// [`PollError::TimeoutExceeded`]; without it the loop only ends on success or stop.
pub async fn poll<T, E, A, Fut, P>(
    mut action: A,
    mut predicate: P,
    options: &PollOptions,
) -> Result<T, PollError>
where
    A: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    P: FnMut(&T) -> bool,
{
    let started = Instant::now();
    let deadline = options.timeout.map(|timeout| started + timeout);
    let mut tally = AttemptTally::default();

    loop {
        if options.is_stop_requested() {
            return Err(PollError::Cancelled {
                label: options.label.clone(),
                attempts: tally.attempts,
            });
        }

        tally.attempts = tally.attempts.saturating_add(1);
        let outcome = match deadline {
            Some(deadline) => match timeout_at(deadline, action()).await {
                Ok(outcome) => outcome,
                Err(_) => return Err(tally.timed_out(options, started)),
            },
            None => action().await,
        };

        match outcome {
            Ok(value) => {
                if predicate(&value) {
                    return Ok(value);
                }
                tally.consecutive_failures = 0;
            }
            Err(err) => tally.on_probe_failure(options, &err),
        }

        match deadline {
            Some(deadline) => {
                let wake_at = (Instant::now() + options.interval).min(deadline);
                sleep_until(wake_at).await;
                if Instant::now() >= deadline {
                    return Err(tally.timed_out(options, started));
                }
            }
            None => sleep(options.interval).await,
        }
    }
}

#[derive(Debug, Default)]
struct AttemptTally {
    attempts: u64,
    failed_attempts: u64,
    consecutive_failures: u64,
    last_error: Option<String>,
}

impl AttemptTally {
    fn on_probe_failure(&mut self, options: &PollOptions, err: &impl fmt::Display) {
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let message = err.to_string();

        debug!(
            label = %options.label,
            attempt = self.attempts,
            error = %message,
            "poll probe failed, will retry"
        );
        if self.consecutive_failures % PROBE_FAILURE_WARN_EVERY == 0 {
            warn!(
                label = %options.label,
                consecutive_failures = self.consecutive_failures,
                error = %message,
                "poll probe keeps failing"
            );
        }

        self.last_error = Some(message);
    }

    fn timed_out(&mut self, options: &PollOptions, started: Instant) -> PollError {
        let elapsed = started.elapsed();
        warn!(
            label = %options.label,
            attempts = self.attempts,
            failed_attempts = self.failed_attempts,
            elapsed_ms = elapsed.as_millis() as u64,
            "poll deadline exceeded"
        );
        PollError::TimeoutExceeded {
            label: options.label.clone(),
            attempts: self.attempts,
            failed_attempts: self.failed_attempts,
            elapsed,
            last_error: self.last_error.take(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::poll;
    use crate::poller::{PollError, PollOptions, PollStop};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    fn options(interval_ms: u64) -> PollOptions {
        PollOptions::new("test-wait", Duration::from_millis(interval_ms))
    }

    #[tokio::test(start_paused = true)]
    async fn never_satisfied_poll_times_out_after_deadline() {
        let mut calls = 0_u64;
        let started = tokio::time::Instant::now();

        let result = poll(
            || {
                calls += 1;
                async { Ok::<_, String>(false) }
            },
            |ready| *ready,
            &options(10).with_timeout(Duration::from_millis(50)),
        )
        .await;
        let elapsed = started.elapsed();

        let err = result.expect_err("predicate never holds");
        assert!(err.is_timeout());
        assert_eq!(err.attempts(), 5);
        assert_eq!(calls, 5);
        assert_eq!(err.label(), "test-wait");
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(60));
    }

    #[tokio::test(start_paused = true)]
    async fn returns_first_satisfying_result_after_probe_failures() {
        let mut calls = 0_u64;

        let value = poll(
            || {
                calls += 1;
                let attempt = calls;
                async move {
                    if attempt <= 3 {
                        Err(format!("probe {attempt} unavailable"))
                    } else {
                        Ok(attempt)
                    }
                }
            },
            |attempt| *attempt >= 5,
            &options(10).with_timeout(Duration::from_secs(1)),
        )
        .await
        .expect("condition reached before deadline");

        assert_eq!(value, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_poll_keeps_retrying_until_satisfied() {
        let mut calls = 0_u64;

        let value = poll(
            || {
                calls += 1;
                let attempt = calls;
                async move { Ok::<_, String>(attempt) }
            },
            |attempt| *attempt == 1_000,
            &options(1_000),
        )
        .await
        .expect("unbounded poll only ends on success");

        assert_eq!(value, 1_000);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_reports_last_probe_error() {
        let err = poll(
            || async { Err::<(), _>("index lagging") },
            |_| true,
            &options(5)
                .with_timeout(Duration::from_millis(20))
                .with_label("index-propagation"),
        )
        .await
        .expect_err("every probe fails");

        match err {
            PollError::TimeoutExceeded {
                label,
                attempts,
                failed_attempts,
                last_error,
                ..
            } => {
                assert_eq!(label, "index-propagation");
                assert_eq!(attempts, failed_attempts);
                assert_eq!(last_error.as_deref(), Some("index lagging"));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hung_attempt_is_bounded_by_deadline() {
        let started = tokio::time::Instant::now();

        let err = poll(
            std::future::pending::<Result<u32, String>>,
            |_| true,
            &options(10).with_timeout(Duration::from_millis(30)),
        )
        .await
        .expect_err("attempt never completes");

        assert!(err.is_timeout());
        assert_eq!(err.attempts(), 1);
        assert!(started.elapsed() < Duration::from_millis(40));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_request_ends_loop_at_next_suspension_point() {
        let stop = PollStop::default();
        let stop_from_probe = stop.clone();
        let mut calls = 0_u64;

        let err = poll(
            || {
                calls += 1;
                if calls == 3 {
                    stop_from_probe.request_stop();
                }
                async { Ok::<_, String>(()) }
            },
            |_| false,
            &options(10).with_stop(stop),
        )
        .await
        .expect_err("stopped loops fail");

        assert_eq!(
            err,
            PollError::Cancelled {
                label: "test-wait".to_string(),
                attempts: 3,
            }
        );
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_poll_makes_no_further_attempts() {
        let calls = AtomicU64::new(0);

        let abandoned = tokio::time::timeout(
            Duration::from_millis(25),
            poll(
                || {
                    calls.fetch_add(1, Ordering::Relaxed);
                    async { Ok::<_, String>(false) }
                },
                |ready| *ready,
                &options(10),
            ),
        )
        .await;
        assert!(abandoned.is_err(), "caller gave up first");
        assert_eq!(calls.load(Ordering::Relaxed), 3);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_still_makes_one_attempt() {
        let value = poll(
            || async { Ok::<_, String>(7_u32) },
            |value| *value == 7,
            &options(10).with_timeout(Duration::ZERO),
        )
        .await
        .expect("ready attempt wins over elapsed deadline");

        assert_eq!(value, 7);
    }
}
