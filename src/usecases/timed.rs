//! Timed Execution - Elapsed-time Logging and Timeout Bounds
//!
//! Wraps any fallible future with a deadline and records how long it
//! took. Source calls are bounded by the request timeout, or by the
//! time left before their pipeline's deadline when that is shorter.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::ReportError;

/// Outcome of a bounded call plus its wall-clock duration.
#[derive(Debug)]
pub struct Timed<T> {
    /// Result of the call, or `SourceUnavailable` on timeout.
    pub result: Result<T, ReportError>,
    /// Time spent, including the timeout itself.
    pub elapsed: Duration,
}

/// Run `fut` under `bound`, logging the elapsed time under `label`.
///
/// A timeout is reported as `SourceUnavailable` naming `label`.
pub async fn timed<T, F>(label: &str, bound: Duration, fut: F) -> Timed<T>
where
    F: Future<Output = Result<T, ReportError>>,
{
    let started = Instant::now();
    let result = match tokio::time::timeout(bound, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(label, bound_ms = bound.as_millis() as u64, "Call timed out");
            Err(ReportError::unavailable(
                label,
                format!("timed out after {}ms", bound.as_millis()),
            ))
        }
    };
    let elapsed = started.elapsed();

    debug!(
        label,
        elapsed_ms = elapsed.as_millis() as u64,
        ok = result.is_ok(),
        "Timed call finished"
    );

    Timed { result, elapsed }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_call_passes_through() {
        let out = tokio_test::block_on(timed("fast", Duration::from_secs(1), async {
            Ok::<_, ReportError>(42)
        }));
        let value = tokio_test::assert_ok!(out.result);
        assert_eq!(value, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out() {
        let out = timed("slow", Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, ReportError>(1)
        })
        .await;
        match out.result {
            Err(ReportError::SourceUnavailable { source_name, reason }) => {
                assert_eq!(source_name, "slow");
                assert!(reason.contains("timed out"));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_preserved() {
        let out = timed::<i32, _>("bad", Duration::from_secs(1), async {
            Err(ReportError::parse("bad", "no field"))
        })
        .await;
        assert!(matches!(out.result, Err(ReportError::ParseFailure { .. })));
    }
}
