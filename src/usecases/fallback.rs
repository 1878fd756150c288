//! Fallback Resolver - Priority-ordered Source Chain per Metric
//!
//! Tries each configured source strictly in priority order, bounding
//! every call with the request timeout and rejecting values outside
//! the metric's sanity range. The first valid value wins and no later
//! source is contacted. When the chain is exhausted the metric's
//! default policy applies:
//! - metrics with a safe default return it (origin `default`)
//! - all others report failure, rendered later as the sentinel

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::domain::{EntryOrigin, IndexQuote, Measured, MetricKind, MetricSpec, WeatherSnapshot};
use crate::error::ReportError;
use crate::ports::MetricSource;
use crate::usecases::timed::{timed, Timed};

/// Values that may be synthesized from a configured numeric default.
pub trait FromDefault: Sized {
    /// Build the substitute value, or `None` when this kind of value
    /// must never be fabricated.
    fn from_default(value: f64) -> Option<Self>;
}

impl FromDefault for f64 {
    fn from_default(value: f64) -> Option<Self> {
        Some(value)
    }
}

impl FromDefault for IndexQuote {
    fn from_default(value: f64) -> Option<Self> {
        Some(Self::new(value, None))
    }
}

impl FromDefault for WeatherSnapshot {
    fn from_default(_value: f64) -> Option<Self> {
        None
    }
}

/// A source with its explicit priority (lower = tried first).
pub struct RankedSource<T> {
    /// Priority rank.
    pub rank: usize,
    /// The adapter.
    pub source: Arc<dyn MetricSource<T>>,
}

/// Record of one source call.
#[derive(Debug, Clone)]
pub struct SourceAttempt {
    /// Source name.
    pub source: String,
    /// Wall-clock time spent.
    pub elapsed: Duration,
    /// Why it was rejected, `None` on success.
    pub error: Option<ReportError>,
}

impl SourceAttempt {
    /// `"ok"` or the error kind, for telemetry labels.
    pub fn outcome(&self) -> &'static str {
        self.error.as_ref().map_or("ok", ReportError::kind)
    }
}

/// What a chain produced, with its provenance and attempt log.
#[derive(Debug, Clone)]
pub struct Resolution<T> {
    /// Metric resolved.
    pub metric: MetricKind,
    /// Final value, or the reason there is none.
    pub value: Result<T, ReportError>,
    /// `Source(name)`, `Default`, or `Sentinel` when `value` is an error.
    pub origin: EntryOrigin,
    /// Every source call made, in order.
    pub attempts: Vec<SourceAttempt>,
}

impl<T> Resolution<T> {
    /// The value, if any.
    pub fn ok(&self) -> Option<&T> {
        self.value.as_ref().ok()
    }

    /// Map the value (display formatting) keeping provenance.
    pub fn map<U, F: FnOnce(&T) -> U>(&self, f: F) -> Option<U> {
        self.value.as_ref().ok().map(f)
    }
}

/// Priority-ordered source chain for one metric.
pub struct FallbackResolver<T> {
    /// Metric spec (range + default).
    spec: MetricSpec,
    /// Sources sorted by rank.
    sources: Vec<RankedSource<T>>,
    /// Per-call timeout.
    request_timeout: Duration,
    /// Substitute when every source fails.
    default: Option<T>,
}

impl<T> FallbackResolver<T>
where
    T: Measured + FromDefault + Clone + Send + Sync + 'static,
{
    /// Create an empty chain; the default policy is derived from `spec`.
    pub fn new(spec: MetricSpec, request_timeout: Duration) -> Self {
        let default = spec.default.and_then(T::from_default);
        Self {
            spec,
            sources: Vec::new(),
            request_timeout,
            default,
        }
    }

    /// Append a source at the next rank.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn MetricSource<T>>) -> Self {
        let rank = self.sources.len();
        self.push_ranked(rank, source);
        self
    }

    /// Insert a source at an explicit rank (stable among equal ranks).
    pub fn push_ranked(&mut self, rank: usize, source: Arc<dyn MetricSource<T>>) {
        self.sources.push(RankedSource { rank, source });
        self.sources.sort_by_key(|s| s.rank);
    }

    /// Metric this chain resolves.
    pub fn kind(&self) -> MetricKind {
        self.spec.kind
    }

    /// Source names in the order they will be tried.
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.source.name()).collect()
    }

    /// Whether exhaustion yields a default rather than a failure.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Walk the chain and return the first valid value.
    pub async fn resolve(&self) -> Resolution<T> {
        self.run(None).await
    }

    /// Walk the chain, but make no call past `deadline`.
    ///
    /// Each call is bounded by the request timeout or the time left,
    /// whichever is shorter. Once the deadline passes the default
    /// policy applies to the attempts made so far.
    pub async fn resolve_before(&self, deadline: Instant) -> Resolution<T> {
        self.run(Some(deadline)).await
    }

    #[instrument(skip(self), fields(metric = %self.spec.kind))]
    async fn run(&self, deadline: Option<Instant>) -> Resolution<T> {
        let mut attempts = Vec::with_capacity(self.sources.len());
        let mut cut_short = false;

        for ranked in &self.sources {
            let bound = match deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        cut_short = true;
                        break;
                    }
                    left.min(self.request_timeout)
                }
                None => self.request_timeout,
            };
            let name = ranked.source.name().to_string();
            let Timed { result, elapsed } = timed(&name, bound, ranked.source.fetch()).await;
            let checked = result.and_then(|value| self.spec.validate(&value).map(|()| value));

            match checked {
                Ok(value) => {
                    info!(
                        source = %name,
                        value = value.measure(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Metric resolved"
                    );
                    attempts.push(SourceAttempt {
                        source: name.clone(),
                        elapsed,
                        error: None,
                    });
                    return Resolution {
                        metric: self.spec.kind,
                        value: Ok(value),
                        origin: EntryOrigin::Source(name),
                        attempts,
                    };
                }
                Err(e) => {
                    warn!(source = %name, error = %e, "Source rejected, trying next");
                    attempts.push(SourceAttempt {
                        source: name,
                        elapsed,
                        error: Some(e),
                    });
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        cut_short = true;
                        break;
                    }
                }
            }
        }

        let cause = if cut_short {
            warn!(metric = %self.spec.kind, attempts = attempts.len(), "Deadline reached");
            ReportError::unavailable(
                self.spec.kind.name(),
                format!("deadline reached after {} attempts", attempts.len()),
            )
        } else {
            ReportError::Exhausted {
                metric: self.spec.kind.name().to_string(),
                attempts: attempts.len(),
            }
        };
        self.exhausted(attempts, cause)
    }

    /// Apply the default policy with no further source calls.
    ///
    /// Used when the enclosing pipeline task is lost.
    pub fn exhausted(&self, attempts: Vec<SourceAttempt>, cause: ReportError) -> Resolution<T> {
        match &self.default {
            Some(default) => {
                warn!(
                    metric = %self.spec.kind,
                    default = default.measure(),
                    cause = %cause,
                    "All sources failed, using default"
                );
                Resolution {
                    metric: self.spec.kind,
                    value: Ok(default.clone()),
                    origin: EntryOrigin::Default,
                    attempts,
                }
            }
            None => {
                warn!(metric = %self.spec.kind, cause = %cause, "All sources failed, no default");
                Resolution {
                    metric: self.spec.kind,
                    value: Err(cause),
                    origin: EntryOrigin::Sentinel,
                    attempts,
                }
            }
        }
    }
}
