//! Deadline guard for external calls.
//!
//! Every call to the model goes through [`guard`]. The operation runs on its
//! own task and races a timer:
//!
//! ```text
//! guard(operation, deadline, fallback)
//!     │
//!     ├─ operation resolves first → its value
//!     ├─ operation fails first    → fallback (error logged, not returned)
//!     └─ timer fires first        → fallback; operation keeps running
//!                                   detached and its result is dropped
//! ```
//!
//! The caller observes exactly one value. Because a timed-out operation is
//! abandoned rather than cancelled, it must not hold anything that writes
//! back into session state; it only ever produces a value for a channel
//! that nobody reads any more.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

/// Which side of the race produced the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// The operation resolved before the deadline.
    Resolved,
    /// The deadline passed first.
    TimedOut,
    /// The operation failed (or panicked) before the deadline.
    Failed,
}

impl GuardOutcome {
    /// Whether the fallback value was used.
    pub fn is_fallback(&self) -> bool {
        !matches!(self, Self::Resolved)
    }
}

/// A guarded value plus how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Guarded<T> {
    pub value: T,
    pub outcome: GuardOutcome,
    pub elapsed: Duration,
}

/// Run `operation` with a deadline, returning `fallback` on timeout or failure.
pub async fn guard<F, T, E>(operation: F, deadline: Duration, fallback: T) -> T
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
{
    guard_with_outcome(operation, deadline, fallback).await.value
}

/// Like [`guard`], but also reports which branch won.
pub async fn guard_with_outcome<F, T, E>(operation: F, deadline: Duration, fallback: T) -> Guarded<T>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
{
    let started = Instant::now();
    let mut handle = tokio::spawn(operation);

    let (value, outcome) = tokio::select! {
        biased;

        joined = &mut handle => match joined {
            Ok(Ok(value)) => (value, GuardOutcome::Resolved),
            Ok(Err(e)) => {
                warn!(error = %e, "guarded call failed, using fallback");
                (fallback, GuardOutcome::Failed)
            }
            Err(e) => {
                warn!(error = %e, "guarded call aborted, using fallback");
                (fallback, GuardOutcome::Failed)
            }
        },
        _ = tokio::time::sleep(deadline) => {
            warn!(
                deadline_ms = deadline.as_millis() as u64,
                "guarded call exceeded deadline, using fallback"
            );
            // Dropping the handle detaches the task; its result is discarded.
            drop(handle);
            (fallback, GuardOutcome::TimedOut)
        }
    };

    let elapsed = started.elapsed();
    debug!(?outcome, elapsed_ms = elapsed.as_millis() as u64, "guarded call settled");

    Guarded {
        value,
        outcome,
        elapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test(start_paused = true)]
    async fn returns_value_when_operation_is_fast() {
        let guarded = guard_with_outcome(
            async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok::<_, String>(7)
            },
            Duration::from_secs(1),
            0,
        )
        .await;

        assert_eq!(guarded.value, 7);
        assert_eq!(guarded.outcome, GuardOutcome::Resolved);
        assert!(!guarded.outcome.is_fallback());
    }

    #[tokio::test(start_paused = true)]
    async fn returns_fallback_when_operation_is_slow() {
        let guarded = guard_with_outcome(
            async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, String>("late")
            },
            Duration::from_millis(1500),
            "fallback",
        )
        .await;

        assert_eq!(guarded.value, "fallback");
        assert_eq!(guarded.outcome, GuardOutcome::TimedOut);
        assert!(guarded.elapsed >= Duration::from_millis(1500));
        assert!(guarded.elapsed < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn returns_fallback_when_operation_fails() {
        let value = guard(
            async { Err::<u8, _>("boom") },
            Duration::from_secs(1),
            5,
        )
        .await;
        assert_eq!(value, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn returns_fallback_when_operation_panics() {
        let guarded = guard_with_outcome(
            async {
                if true {
                    panic!("provider bug");
                }
                Ok::<u8, String>(1)
            },
            Duration::from_secs(1),
            9,
        )
        .await;
        assert_eq!(guarded.value, 9);
        assert_eq!(guarded.outcome, GuardOutcome::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn late_resolution_does_not_change_returned_fallback() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);

        let value = guard(
            async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                flag.store(true, Ordering::SeqCst);
                Ok::<_, String>(String::from("real answer"))
            },
            Duration::from_secs(4),
            String::from("generic prompt"),
        )
        .await;

        assert_eq!(value, "generic prompt");
        assert!(!finished.load(Ordering::SeqCst));

        // The abandoned operation still runs to completion.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(finished.load(Ordering::SeqCst));
        assert_eq!(value, "generic prompt");
    }

    #[tokio::test(start_paused = true)]
    async fn failure_after_deadline_still_yields_timeout() {
        let guarded = guard_with_outcome(
            async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Err::<u8, _>("too late to matter")
            },
            Duration::from_secs(1),
            0,
        )
        .await;
        assert_eq!(guarded.outcome, GuardOutcome::TimedOut);
    }
}
