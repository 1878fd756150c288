//! Daily Market Report - Entry Point
//!
//! One-shot batch job: acquire every metric concurrently, assemble
//! the report and push it as a template message. Sub-commands run
//! isolated paths for manual testing.
//!
//! Wiring sequence (`run`):
//! 1. Load .env + config.toml, validate
//! 2. Init tracing (JSON or pretty) inside a per-run span
//! 3. Read credentials from the environment
//! 4. Build provider adapters and resolver chains from the catalog
//! 5. Fan out the six pipelines, join, assemble the report
//! 6. Dispatch (skipped on --dry-run)
//! 7. Write the Prometheus textfile, exit 0/1

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use daily_market_report::adapters::push::WeChatGateway;
use daily_market_report::adapters::sources::SourceCatalog;
use daily_market_report::adapters::telemetry::MetricsRegistry;
use daily_market_report::config::credentials::Credentials;
use daily_market_report::config::{loader, AppConfig, LogFormat};
use daily_market_report::domain::Measured;
use daily_market_report::ports::PushGateway;
use daily_market_report::usecases::collector::ReportCollector;
use daily_market_report::usecases::dispatcher::NotificationDispatcher;
use daily_market_report::usecases::fallback::{FallbackResolver, FromDefault, Resolution};

/// Daily market/weather report with template-message push.
#[derive(Debug, Parser)]
#[command(name = "daily-market-report", version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Full run: fan-out, report, dispatch.
    Run {
        /// Assemble and log the report without sending it.
        #[arg(long)]
        dry_run: bool,
    },
    /// Resolve the weather chain only.
    Weather,
    /// Resolve the CSI 300 PE chain only.
    Pe,
    /// Resolve the 10-year bond yield chain only.
    Bond,
    /// Token exchange only.
    Push,
    /// List credential variables (masked).
    CheckEnv,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // ── 1. Environment + configuration ──────────────────────
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    let config = loader::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;

    // ── 2. Structured logging ───────────────────────────────
    init_tracing(&config);
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded .env");
    }

    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("report_run", %run_id);

    info!(
        parent: &span,
        name = %config.report.name,
        version = env!("CARGO_PKG_VERSION"),
        command = ?cli.command,
        "Starting daily market report"
    );

    // ── 3. Credentials ──────────────────────────────────────
    let credentials = Credentials::from_env();

    let command = cli.command.unwrap_or(Command::Run { dry_run: false });
    let code = match command {
        Command::Run { dry_run } => {
            run_report(&config, &credentials, dry_run || config.report.dry_run)
                .instrument(span)
                .await?
        }
        Command::Weather => {
            let catalog = SourceCatalog::new(&config, &credentials)?;
            let chain = catalog.weather_chain()?;
            print_resolution(&resolve_one(chain).instrument(span).await, |w| w.summary())
        }
        Command::Pe => {
            let catalog = SourceCatalog::new(&config, &credentials)?;
            let chain = catalog.pe_chain()?;
            print_resolution(&resolve_one(chain).instrument(span).await, |pe| format!("{pe:.2}"))
        }
        Command::Bond => {
            let catalog = SourceCatalog::new(&config, &credentials)?;
            let chain = catalog.bond_chain()?;
            print_resolution(&resolve_one(chain).instrument(span).await, |y| {
                daily_market_report::domain::quote::format_yield(*y)
            })
        }
        Command::Push => push_only(&config, &credentials).instrument(span).await?,
        Command::CheckEnv => check_env(&credentials),
    };

    Ok(code)
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.report.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.report.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

/// Full run.
async fn run_report(
    config: &AppConfig,
    credentials: &Credentials,
    dry_run: bool,
) -> Result<ExitCode> {
    let telemetry = MetricsRegistry::new().context("Failed to create metrics registry")?;

    // ── 4. Adapters + resolver chains ───────────────────────
    let catalog = SourceCatalog::new(config, credentials)?;
    let pipelines = catalog.pipelines().context("Invalid source configuration")?;

    // ── 5. Fan-out + join ───────────────────────────────────
    let collector = ReportCollector::new(
        pipelines,
        config.pipelines.clone(),
        config.report.worker_pool_size,
    );
    let collection = collector.collect().await;
    telemetry.record_collection(&collection);

    // ── 6. Dispatch ─────────────────────────────────────────
    let code = if dry_run {
        warn!("Dry-run mode, report assembled but NOT dispatched");
        ExitCode::SUCCESS
    } else {
        match credentials.push() {
            Err(e) => {
                error!(error = %e, "Push credentials missing, report not sent");
                telemetry.record_dispatch(e.kind());
                ExitCode::FAILURE
            }
            Ok(push) => {
                let gateway = WeChatGateway::new(
                    &config.push.api_base,
                    Duration::from_secs(config.push.timeout_secs),
                )?;
                let dispatcher = NotificationDispatcher::new(gateway, config.push.link_url.clone());
                match dispatcher.dispatch(&collection.report, &push).await {
                    Ok(delivery) => {
                        info!(msgid = ?delivery.msgid, "Daily report sent");
                        telemetry.record_dispatch("ok");
                        ExitCode::SUCCESS
                    }
                    Err(e) => {
                        error!(error = %e, "Daily report dispatch failed");
                        telemetry.record_dispatch(e.kind());
                        ExitCode::FAILURE
                    }
                }
            }
        }
    };

    // ── 7. Telemetry ────────────────────────────────────────
    if let Some(path) = &config.telemetry.textfile_path {
        if let Err(e) = telemetry.write_textfile(path) {
            warn!(error = %e, "Failed to write metrics textfile");
        }
    }

    info!(elapsed_ms = collection.elapsed.as_millis() as u64, "Run complete");
    Ok(code)
}

async fn resolve_one<T>(chain: FallbackResolver<T>) -> Resolution<T>
where
    T: Measured + FromDefault + Clone + Send + Sync + 'static,
{
    info!(metric = %chain.kind(), sources = ?chain.source_names(), "Resolving single chain");
    chain.resolve().await
}

/// Print a resolution with its attempts; non-zero when nothing usable came back.
fn print_resolution<T>(resolution: &Resolution<T>, render: impl FnOnce(&T) -> String) -> ExitCode {
    for attempt in &resolution.attempts {
        let outcome = attempt
            .error
            .as_ref()
            .map_or_else(|| "ok".to_string(), ToString::to_string);
        println!(
            "  {:<16} {:>6}ms  {}",
            attempt.source,
            attempt.elapsed.as_millis(),
            outcome
        );
    }
    match resolution.map(render) {
        Some(value) => {
            println!("{}: {} ({})", resolution.metric, value, resolution.origin);
            ExitCode::SUCCESS
        }
        None => {
            println!("{}: {}", resolution.metric, daily_market_report::domain::FETCH_FAILED);
            ExitCode::FAILURE
        }
    }
}

/// Token exchange only.
async fn push_only(config: &AppConfig, credentials: &Credentials) -> Result<ExitCode> {
    let push = match credentials.push() {
        Ok(push) => push,
        Err(e) => {
            error!(error = %e, "Push credentials missing");
            return Ok(ExitCode::FAILURE);
        }
    };
    let gateway = WeChatGateway::new(
        &config.push.api_base,
        Duration::from_secs(config.push.timeout_secs),
    )?;
    match gateway.access_token(&push.app_id, &push.app_secret).await {
        Ok(token) => {
            println!("access token: {} (expires in {}s)", token.masked(), token.expires_in);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(error = %e, "Token exchange failed");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Masked credential listing.
fn check_env(credentials: &Credentials) -> ExitCode {
    for (name, value) in credentials.summary() {
        println!("{name:<14} {value}");
    }
    let missing = credentials.missing_required();
    if !missing.is_empty() {
        println!("missing: {}", missing.join(", "));
    }
    if credentials.push().is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
