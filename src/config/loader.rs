//! Configuration Loader - TOML Parsing and Source-chain Validation
//!
//! Reads `config.toml` (or falls back to built-in defaults), then
//! rejects chains naming unknown providers, inverted ranges, defaults
//! outside their range and zero timeouts before any request is made.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::{known_sources, AppConfig};
use crate::domain::MetricKind;

/// Minimum worker pool: one worker per pipeline.
pub const MIN_WORKERS: usize = 6;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Fails when the file is unreadable, is not valid TOML, or breaks a
/// validation rule.
pub fn load_config(path: &str) -> Result<AppConfig> {
    let path = Path::new(path);

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content)?;

    info!(
        name = %config.report.name,
        workers = config.report.worker_pool_size,
        request_timeout_secs = config.report.request_timeout_secs,
        "Configuration loaded successfully"
    );

    Ok(config)
}

/// Load `path` when it exists, otherwise fall back to built-in defaults.
///
/// # Errors
/// A present-but-invalid file is still an error.
pub fn load_or_default(path: &str) -> Result<AppConfig> {
    if Path::new(path).exists() {
        load_config(path)
    } else {
        warn!(path, "Config file not found, using built-in defaults");
        let config = AppConfig::default();
        validate_config(&config)?;
        Ok(config)
    }
}

/// Parse and validate TOML text.
///
/// # Errors
/// Parse errors and validation failures.
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(content)
        .with_context(|| "Failed to parse config.toml")?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - A worker pool large enough to run every pipeline at once
/// - Positive timeouts
/// - Coherent metric ranges and defaults
/// - Source names the adapter catalog knows
fn validate_config(config: &AppConfig) -> Result<()> {
    anyhow::ensure!(
        config.report.worker_pool_size >= MIN_WORKERS,
        "worker_pool_size must be at least {MIN_WORKERS}, got {}",
        config.report.worker_pool_size
    );
    anyhow::ensure!(
        config.report.request_timeout_secs > 0,
        "request_timeout_secs must be positive"
    );
    anyhow::ensure!(
        config.push.timeout_secs > 0,
        "push.timeout_secs must be positive"
    );

    for (name, secs) in config.pipelines.named() {
        anyhow::ensure!(secs > 0, "pipeline {name} timeout must be positive");
    }

    for kind in MetricKind::ALL {
        let metric = config.metrics.get(kind);
        anyhow::ensure!(
            metric.min.is_finite() && metric.max.is_finite() && metric.min < metric.max,
            "metric {kind}: min ({}) must be below max ({})",
            metric.min,
            metric.max
        );
        if let Some(default) = metric.default {
            anyhow::ensure!(
                default >= metric.min && default <= metric.max,
                "metric {kind}: default {default} outside [{}, {}]",
                metric.min,
                metric.max
            );
        }
        anyhow::ensure!(
            !metric.sources.is_empty(),
            "metric {kind} has no sources configured"
        );
        let known = known_sources(kind);
        for source in &metric.sources {
            anyhow::ensure!(
                known.contains(&source.as_str()),
                "metric {kind}: unknown source '{source}' (known: {})",
                known.join(", ")
            );
        }
    }

    anyhow::ensure!(
        !config.push.api_base.is_empty(),
        "push.api_base must not be empty"
    );

    Ok(())
}
