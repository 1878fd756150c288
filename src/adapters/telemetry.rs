//! Prometheus Metrics Registry - Report Run Observability
//!
//! Registers run metrics and renders them in the text exposition
//! format. A run is a one-shot batch job, so instead of serving HTTP
//! the exposition is written to a textfile for the node-exporter
//! textfile collector.

use std::path::Path;

use anyhow::Context;
use prometheus::{
    Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use tracing::{info, instrument};

use crate::domain::MetricKind;
use crate::usecases::collector::Collection;
use crate::usecases::fallback::SourceAttempt;

/// Centralized Prometheus metrics for a report run.
///
/// All metrics follow the naming convention `daily_report_*`.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Source calls by metric, source and outcome.
    pub source_attempts: IntCounterVec,
    /// Source call latency (seconds).
    pub source_latency: HistogramVec,
    /// Pipelines replaced by defaults, by reason.
    pub pipeline_fallbacks: IntCounterVec,
    /// Report fields by origin kind.
    pub report_fields: IntCounterVec,
    /// Dispatch outcomes.
    pub dispatches: IntCounterVec,
    /// Duration of the last run (seconds).
    pub run_duration: Gauge,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    ///
    /// # Errors
    /// Registration conflicts (never expected with a fresh registry).
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let source_attempts = IntCounterVec::new(
            Opts::new(
                "daily_report_source_attempts_total",
                "Source adapter calls by outcome",
            ),
            &["metric", "source", "outcome"],
        )?;

        let source_latency = HistogramVec::new(
            HistogramOpts::new(
                "daily_report_source_latency_seconds",
                "Source adapter call latency in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["source"],
        )?;

        let pipeline_fallbacks = IntCounterVec::new(
            Opts::new(
                "daily_report_pipeline_fallbacks_total",
                "Pipelines whose output was substituted",
            ),
            &["pipeline", "reason"],
        )?;

        let report_fields = IntCounterVec::new(
            Opts::new(
                "daily_report_fields_total",
                "Report fields by value origin",
            ),
            &["origin"],
        )?;

        let dispatches = IntCounterVec::new(
            Opts::new("daily_report_dispatch_total", "Push dispatch outcomes"),
            &["outcome"],
        )?;

        let run_duration = Gauge::new(
            "daily_report_run_duration_seconds",
            "Wall-clock duration of the acquisition fan-out",
        )?;

        registry.register(Box::new(source_attempts.clone()))?;
        registry.register(Box::new(source_latency.clone()))?;
        registry.register(Box::new(pipeline_fallbacks.clone()))?;
        registry.register(Box::new(report_fields.clone()))?;
        registry.register(Box::new(dispatches.clone()))?;
        registry.register(Box::new(run_duration.clone()))?;

        Ok(Self {
            registry,
            source_attempts,
            source_latency,
            pipeline_fallbacks,
            report_fields,
            dispatches,
            run_duration,
        })
    }

    /// Record one source call.
    pub fn record_attempt(&self, metric: MetricKind, attempt: &SourceAttempt) {
        self.source_attempts
            .with_label_values(&[metric.name(), attempt.source.as_str(), attempt.outcome()])
            .inc();
        self.source_latency
            .with_label_values(&[attempt.source.as_str()])
            .observe(attempt.elapsed.as_secs_f64());
    }

    /// Record everything a collection produced.
    pub fn record_collection(&self, collection: &Collection) {
        for (metric, attempt) in &collection.attempts {
            self.record_attempt(*metric, attempt);
        }
        for (pipeline, reason) in &collection.fallbacks {
            self.pipeline_fallbacks
                .with_label_values(&[pipeline.name(), reason.as_str()])
                .inc();
        }
        for (_, entry) in collection.report.entries() {
            let origin = entry.origin.to_string();
            let kind = origin.split(':').next().unwrap_or("source");
            self.report_fields.with_label_values(&[kind]).inc();
        }
        self.run_duration.set(collection.elapsed.as_secs_f64());
    }

    /// Record a dispatch outcome (`ok` or an error kind).
    pub fn record_dispatch(&self, outcome: &str) {
        self.dispatches.with_label_values(&[outcome]).inc();
    }

    /// Render the text exposition format.
    ///
    /// # Errors
    /// Encoding failures.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .context("Failed to encode metrics")?;
        String::from_utf8(buffer).context("Metrics were not UTF-8")
    }

    /// Write the exposition to `path` atomically (temp file + rename).
    ///
    /// # Errors
    /// I/O failures.
    #[instrument(skip(self))]
    pub fn write_textfile(&self, path: &str) -> anyhow::Result<()> {
        let target = Path::new(path);
        let tmp = target.with_extension("prom.tmp");
        std::fs::write(&tmp, self.render()?)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, target)
            .with_context(|| format!("Failed to move metrics into {}", target.display()))?;
        info!(path, "Metrics textfile written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::ReportError;

    #[test]
    fn test_attempts_rendered() {
        let registry = MetricsRegistry::new().unwrap();
        registry.record_attempt(
            MetricKind::PeRatio,
            &SourceAttempt {
                source: "xueqiu".into(),
                elapsed: Duration::from_millis(120),
                error: Some(ReportError::parse("xueqiu", "no pe")),
            },
        );
        registry.record_dispatch("ok");

        let text = registry.render().unwrap();
        assert!(text.contains(
            r#"daily_report_source_attempts_total{metric="pe_ratio",outcome="parse",source="xueqiu"} 1"#
        ));
        assert!(text.contains(r#"daily_report_dispatch_total{outcome="ok"} 1"#));
    }
}
