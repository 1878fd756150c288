//! Report Collector - Concurrent Fan-out and Report Assembly
//!
//! Launches the six independent acquisition pipelines on the runtime,
//! bounded by a worker semaphore sized for full parallelism, and
//! joins them. Each pipeline is isolated:
//! - a pipeline reaching its coarse bound stops calling sources; only
//!   its unfinished metrics fall back to default/sentinel outputs
//! - a panicking pipeline is caught at the join and replaced wholesale
//! - no pipeline failure affects another
//!
//! The risk premium runs after the join, from the PE value and the
//! bond display string the report will carry.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::config::PipelineTimeouts;
use crate::domain::quote::{format_fx, format_usd, format_yield};
use crate::domain::{
    format_risk_premium, EntryOrigin, IndexQuote, MetricKind, Report, ReportEntry, ReportField,
    WeatherSnapshot, CALCULATION_FAILED,
};
use crate::error::ReportError;
use crate::usecases::fallback::{FallbackResolver, Resolution, SourceAttempt};

/// Slack past a pipeline's bound before its task is abandoned.
const BACKSTOP_GRACE: Duration = Duration::from_secs(1);

/// Every resolver chain the report needs.
pub struct PipelineSet {
    /// Weather for the configured city.
    pub weather: FallbackResolver<WeatherSnapshot>,
    /// Shanghai Composite.
    pub sh_index: FallbackResolver<IndexQuote>,
    /// CSI 300 level.
    pub hs300: FallbackResolver<IndexQuote>,
    /// CSI 300 PE.
    pub pe_ratio: FallbackResolver<f64>,
    /// CN 10-year yield.
    pub bond_yield: FallbackResolver<f64>,
    /// Dow Jones.
    pub dji: FallbackResolver<IndexQuote>,
    /// Nasdaq Composite.
    pub nasdaq: FallbackResolver<IndexQuote>,
    /// S&P 500.
    pub sp500: FallbackResolver<IndexQuote>,
    /// USD/CNY.
    pub usd_cny: FallbackResolver<f64>,
    /// BTC in USD.
    pub bitcoin: FallbackResolver<f64>,
    /// ETH in USD.
    pub ethereum: FallbackResolver<f64>,
}

/// Independent units of concurrent work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pipeline {
    /// Weather.
    Weather,
    /// Chinese indices + CSI 300 PE.
    ChinaEquity,
    /// Bond yield.
    Bond,
    /// US indices.
    UsEquity,
    /// USD/CNY.
    Fx,
    /// BTC + ETH.
    Crypto,
}

impl Pipeline {
    /// All pipelines, in launch order.
    pub const ALL: [Self; 6] = [
        Self::Weather,
        Self::ChinaEquity,
        Self::Bond,
        Self::UsEquity,
        Self::Fx,
        Self::Crypto,
    ];

    /// Label for logs and telemetry.
    pub fn name(self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::ChinaEquity => "china_equity",
            Self::Bond => "bond",
            Self::UsEquity => "us_equity",
            Self::Fx => "fx",
            Self::Crypto => "crypto",
        }
    }

    /// Coarse bound from configuration.
    pub fn bound(self, timeouts: &PipelineTimeouts) -> Duration {
        let secs = match self {
            Self::Weather => timeouts.weather_secs,
            Self::ChinaEquity => timeouts.china_equity_secs,
            Self::Bond => timeouts.bond_secs,
            Self::UsEquity => timeouts.us_equity_secs,
            Self::Fx => timeouts.fx_secs,
            Self::Crypto => timeouts.crypto_secs,
        };
        Duration::from_secs(secs)
    }
}

/// Typed result of one pipeline.
#[derive(Debug)]
pub enum PipelineOutput {
    /// Weather resolution.
    Weather(Resolution<WeatherSnapshot>),
    /// Chinese indices + PE.
    ChinaEquity {
        /// Shanghai Composite.
        sh: Resolution<IndexQuote>,
        /// CSI 300.
        hs300: Resolution<IndexQuote>,
        /// CSI 300 PE.
        pe: Resolution<f64>,
    },
    /// Bond yield.
    Bond(Resolution<f64>),
    /// US indices.
    UsEquity {
        /// Dow Jones.
        dji: Resolution<IndexQuote>,
        /// Nasdaq.
        nasdaq: Resolution<IndexQuote>,
        /// S&P 500.
        sp500: Resolution<IndexQuote>,
    },
    /// USD/CNY.
    Fx(Resolution<f64>),
    /// Crypto.
    Crypto {
        /// BTC.
        bitcoin: Resolution<f64>,
        /// ETH.
        ethereum: Resolution<f64>,
    },
}

/// Why a pipeline's output was substituted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// Exceeded its coarse bound.
    Timeout,
    /// The task panicked or was aborted.
    Panic,
}

impl FallbackReason {
    /// Label for logs and telemetry.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Panic => "panic",
        }
    }
}

/// Everything a run produced.
#[derive(Debug)]
pub struct Collection {
    /// The assembled report.
    pub report: Report,
    /// Every source call, tagged with its metric.
    pub attempts: Vec<(MetricKind, SourceAttempt)>,
    /// Pipelines whose output was substituted.
    pub fallbacks: Vec<(Pipeline, FallbackReason)>,
    /// Wall-clock time of the fan-out.
    pub elapsed: Duration,
}

/// Run one pipeline, making no source call past `deadline`.
///
/// Metrics resolved before the deadline keep their values; the rest
/// take their default or sentinel with the attempts already made.
pub async fn run_pipeline(
    set: &PipelineSet,
    pipeline: Pipeline,
    deadline: Instant,
) -> PipelineOutput {
    match pipeline {
        Pipeline::Weather => PipelineOutput::Weather(set.weather.resolve_before(deadline).await),
        Pipeline::ChinaEquity => {
            let (sh, hs300, pe) = tokio::join!(
                set.sh_index.resolve_before(deadline),
                set.hs300.resolve_before(deadline),
                set.pe_ratio.resolve_before(deadline)
            );
            PipelineOutput::ChinaEquity { sh, hs300, pe }
        }
        Pipeline::Bond => PipelineOutput::Bond(set.bond_yield.resolve_before(deadline).await),
        Pipeline::UsEquity => {
            let (dji, nasdaq, sp500) = tokio::join!(
                set.dji.resolve_before(deadline),
                set.nasdaq.resolve_before(deadline),
                set.sp500.resolve_before(deadline)
            );
            PipelineOutput::UsEquity { dji, nasdaq, sp500 }
        }
        Pipeline::Fx => PipelineOutput::Fx(set.usd_cny.resolve_before(deadline).await),
        Pipeline::Crypto => {
            let (bitcoin, ethereum) = tokio::join!(
                set.bitcoin.resolve_before(deadline),
                set.ethereum.resolve_before(deadline)
            );
            PipelineOutput::Crypto { bitcoin, ethereum }
        }
    }
}

/// Default/sentinel outputs for a pipeline whose task was lost.
pub fn fallback_output(
    set: &PipelineSet,
    pipeline: Pipeline,
    cause: &ReportError,
) -> PipelineOutput {
    match pipeline {
        Pipeline::Weather => {
            PipelineOutput::Weather(set.weather.exhausted(Vec::new(), cause.clone()))
        }
        Pipeline::ChinaEquity => PipelineOutput::ChinaEquity {
            sh: set.sh_index.exhausted(Vec::new(), cause.clone()),
            hs300: set.hs300.exhausted(Vec::new(), cause.clone()),
            pe: set.pe_ratio.exhausted(Vec::new(), cause.clone()),
        },
        Pipeline::Bond => PipelineOutput::Bond(set.bond_yield.exhausted(Vec::new(), cause.clone())),
        Pipeline::UsEquity => PipelineOutput::UsEquity {
            dji: set.dji.exhausted(Vec::new(), cause.clone()),
            nasdaq: set.nasdaq.exhausted(Vec::new(), cause.clone()),
            sp500: set.sp500.exhausted(Vec::new(), cause.clone()),
        },
        Pipeline::Fx => PipelineOutput::Fx(set.usd_cny.exhausted(Vec::new(), cause.clone())),
        Pipeline::Crypto => PipelineOutput::Crypto {
            bitcoin: set.bitcoin.exhausted(Vec::new(), cause.clone()),
            ethereum: set.ethereum.exhausted(Vec::new(), cause.clone()),
        },
    }
}

/// Fan-out coordinator.
pub struct ReportCollector {
    /// Resolver chains, shared with the spawned tasks.
    set: Arc<PipelineSet>,
    /// Coarse per-pipeline bounds.
    timeouts: PipelineTimeouts,
    /// Worker permits.
    workers: usize,
    /// Report date override (local today when `None`).
    date: Option<NaiveDate>,
}

impl ReportCollector {
    /// Create a collector.
    pub fn new(set: PipelineSet, timeouts: PipelineTimeouts, workers: usize) -> Self {
        Self {
            set: Arc::new(set),
            timeouts,
            workers,
            date: None,
        }
    }

    /// Fix the report date.
    #[must_use]
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Run every pipeline concurrently and assemble the report.
    #[instrument(skip(self), fields(workers = self.workers))]
    pub async fn collect(&self) -> Collection {
        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.workers));

        let handles: Vec<_> = Pipeline::ALL
            .into_iter()
            .map(|pipeline| {
                let set = Arc::clone(&self.set);
                let permits = Arc::clone(&semaphore);
                let bound = pipeline.bound(&self.timeouts);
                let handle = tokio::spawn(async move {
                    let _permit = permits.acquire_owned().await;
                    let deadline = Instant::now() + bound;
                    let backstop = bound + BACKSTOP_GRACE;
                    let output =
                        tokio::time::timeout(backstop, run_pipeline(&set, pipeline, deadline))
                            .await;
                    (output, Instant::now() >= deadline)
                });
                (pipeline, bound, handle)
            })
            .collect();

        let mut outputs = Vec::with_capacity(handles.len());
        let mut fallbacks = Vec::new();

        for (pipeline, bound, handle) in handles {
            let output = match handle.await {
                Ok((Ok(output), reached_bound)) => {
                    if reached_bound {
                        warn!(
                            pipeline = pipeline.name(),
                            bound_secs = bound.as_secs(),
                            "Pipeline reached its bound, unfinished metrics use defaults"
                        );
                        fallbacks.push((pipeline, FallbackReason::Timeout));
                    }
                    output
                }
                Ok((Err(_elapsed), _)) => {
                    warn!(
                        pipeline = pipeline.name(),
                        bound_secs = bound.as_secs(),
                        "Pipeline ignored its bound, substituting defaults"
                    );
                    fallbacks.push((pipeline, FallbackReason::Timeout));
                    let cause = ReportError::unavailable(
                        pipeline.name(),
                        format!("pipeline timed out after {}s", bound.as_secs()),
                    );
                    fallback_output(&self.set, pipeline, &cause)
                }
                Err(join_error) => {
                    error!(pipeline = pipeline.name(), error = %join_error, "Pipeline task failed");
                    fallbacks.push((pipeline, FallbackReason::Panic));
                    let cause = ReportError::unavailable(pipeline.name(), join_error.to_string());
                    fallback_output(&self.set, pipeline, &cause)
                }
            };
            outputs.push(output);
        }

        let date = self.date.unwrap_or_else(|| Local::now().date_naive());
        let (report, attempts) = assemble(date, outputs);
        let elapsed = started.elapsed();

        log_summary(&report, elapsed);

        Collection {
            report,
            attempts,
            fallbacks,
            elapsed,
        }
    }
}

/// Report date display string: `2025年01月06日`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y年%m月%d日").to_string()
}

fn entry<T>(resolution: &Resolution<T>, render: impl FnOnce(&T) -> String) -> ReportEntry {
    match resolution.map(render) {
        Some(value) => ReportEntry {
            value,
            origin: resolution.origin.clone(),
        },
        None => ReportEntry::sentinel(),
    }
}

fn take_attempts<T>(
    into: &mut Vec<(MetricKind, SourceAttempt)>,
    resolution: &Resolution<T>,
) {
    into.extend(resolution.attempts.iter().cloned().map(|a| (resolution.metric, a)));
}

/// Build the report from pipeline outputs.
///
/// Fields no output covers keep the fetch-failed sentinel. The risk
/// premium is derived last from the PE value and the bond entry.
pub fn assemble(
    date: NaiveDate,
    outputs: Vec<PipelineOutput>,
) -> (Report, Vec<(MetricKind, SourceAttempt)>) {
    let mut builder = Report::builder();
    let mut attempts = Vec::new();
    let mut pe: Option<f64> = None;

    builder.set(
        ReportField::Date,
        ReportEntry {
            value: format_date(date),
            origin: EntryOrigin::Derived,
        },
    );

    for output in outputs {
        match output {
            PipelineOutput::Weather(w) => {
                take_attempts(&mut attempts, &w);
                builder.set(ReportField::Weather, entry(&w, WeatherSnapshot::summary));
            }
            PipelineOutput::ChinaEquity { sh, hs300, pe: pe_res } => {
                take_attempts(&mut attempts, &sh);
                take_attempts(&mut attempts, &hs300);
                take_attempts(&mut attempts, &pe_res);
                builder.set(ReportField::ShIndex, entry(&sh, IndexQuote::summary));
                builder.set(ReportField::Hs300, entry(&hs300, IndexQuote::summary));
                pe = pe_res.ok().copied();
            }
            PipelineOutput::Bond(b) => {
                take_attempts(&mut attempts, &b);
                builder.set(ReportField::Bond10y, entry(&b, |y| format_yield(*y)));
            }
            PipelineOutput::UsEquity { dji, nasdaq, sp500 } => {
                for (field, res) in [
                    (ReportField::Dji, &dji),
                    (ReportField::Nasdaq, &nasdaq),
                    (ReportField::Sp500, &sp500),
                ] {
                    take_attempts(&mut attempts, res);
                    builder.set(field, entry(res, IndexQuote::summary));
                }
            }
            PipelineOutput::Fx(fx) => {
                take_attempts(&mut attempts, &fx);
                builder.set(ReportField::UsdCny, entry(&fx, |r| format_fx(*r)));
            }
            PipelineOutput::Crypto { bitcoin, ethereum } => {
                for (field, res) in [
                    (ReportField::Bitcoin, &bitcoin),
                    (ReportField::Ethereum, &ethereum),
                ] {
                    take_attempts(&mut attempts, res);
                    builder.set(field, entry(res, |p| format_usd(*p)));
                }
            }
        }
    }

    let bond_text = builder
        .peek(ReportField::Bond10y)
        .unwrap_or_default()
        .to_string();
    let premium = format_risk_premium(pe, &bond_text);
    let origin = if premium == CALCULATION_FAILED {
        EntryOrigin::Sentinel
    } else {
        EntryOrigin::Derived
    };
    builder.set(
        ReportField::RiskPremium,
        ReportEntry {
            value: premium,
            origin,
        },
    );

    (builder.build(), attempts)
}

fn log_summary(report: &Report, elapsed: Duration) {
    for (field, entry) in report.entries() {
        info!(field = field.key(), value = %entry.value, origin = %entry.origin, "Report field");
    }
    info!(
        sentinels = report.sentinel_count(),
        elapsed_ms = elapsed.as_millis() as u64,
        "Report assembled"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FETCH_FAILED;

    fn ok<T>(metric: MetricKind, value: T, source: &str) -> Resolution<T> {
        Resolution {
            metric,
            value: Ok(value),
            origin: EntryOrigin::Source(source.to_string()),
            attempts: Vec::new(),
        }
    }

    fn failed<T>(metric: MetricKind) -> Resolution<T> {
        Resolution {
            metric,
            value: Err(ReportError::Exhausted {
                metric: metric.name().to_string(),
                attempts: 1,
            }),
            origin: EntryOrigin::Sentinel,
            attempts: Vec::new(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(date()), "2025年01月06日");
    }

    #[test]
    fn test_assemble_with_no_outputs_is_all_sentinels() {
        let (report, attempts) = assemble(date(), Vec::new());
        assert!(attempts.is_empty());
        assert_eq!(report.value(ReportField::Date), "2025年01月06日");
        assert_eq!(report.value(ReportField::Dji), FETCH_FAILED);
        assert_eq!(report.value(ReportField::RiskPremium), CALCULATION_FAILED);
    }

    #[test]
    fn test_risk_premium_after_join() {
        let outputs = vec![
            PipelineOutput::Bond(ok(MetricKind::BondYield, 2.65, "eastmoney")),
            PipelineOutput::ChinaEquity {
                sh: failed(MetricKind::IndexLevel),
                hs300: failed(MetricKind::IndexLevel),
                pe: ok(MetricKind::PeRatio, 13.5, "csindex"),
            },
        ];
        let (report, _) = assemble(date(), outputs);
        assert_eq!(report.value(ReportField::Bond10y), "2.650%");
        assert_eq!(report.value(ReportField::RiskPremium), "4.757%");
        assert_eq!(
            report.entry(ReportField::RiskPremium).unwrap().origin,
            EntryOrigin::Derived
        );
        assert_eq!(report.value(ReportField::ShIndex), FETCH_FAILED);
    }

    #[test]
    fn test_sentinel_bond_gives_calculation_failed() {
        let outputs = vec![
            PipelineOutput::Bond(failed(MetricKind::BondYield)),
            PipelineOutput::ChinaEquity {
                sh: failed(MetricKind::IndexLevel),
                hs300: failed(MetricKind::IndexLevel),
                pe: ok(MetricKind::PeRatio, 13.5, "csindex"),
            },
        ];
        let (report, _) = assemble(date(), outputs);
        assert_eq!(report.value(ReportField::Bond10y), FETCH_FAILED);
        assert_eq!(report.value(ReportField::RiskPremium), CALCULATION_FAILED);
    }

    #[test]
    fn test_formats_flow_into_report() {
        let outputs = vec![
            PipelineOutput::Crypto {
                bitcoin: ok(MetricKind::CryptoPrice, 67_123.4, "yahoo_realtime"),
                ethereum: failed(MetricKind::CryptoPrice),
            },
            PipelineOutput::Fx(ok(MetricKind::FxRate, 7.1234, "yahoo")),
        ];
        let (report, _) = assemble(date(), outputs);
        assert_eq!(report.value(ReportField::Bitcoin), "$67,123");
        assert_eq!(report.value(ReportField::Ethereum), FETCH_FAILED);
        assert_eq!(report.value(ReportField::UsdCny), "7.1234");
    }

    #[test]
    fn test_pipeline_bounds_from_config() {
        let t = PipelineTimeouts::default();
        assert_eq!(Pipeline::UsEquity.bound(&t), Duration::from_secs(30));
        assert_eq!(Pipeline::Weather.bound(&t), Duration::from_secs(15));
    }
}
