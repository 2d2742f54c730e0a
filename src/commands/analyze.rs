use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::engine::{Engine, EngineReport};
use crate::gateway::{BillingGateway, SnapshotGateway};
use crate::output::{AnomalyListing, OptimizationListing, OutputFormat};

/// Which slice of the report to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Full,
    Anomalies,
    Optimization,
}

/// Flags shared by every report command.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_path: Option<PathBuf>,
    pub profiles: Vec<String>,
    pub as_of: Option<String>,
    pub sensitivity: Option<f64>,
    pub cpu_threshold: Option<f64>,
    pub json: bool,
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

/// CLI overrides take precedence over the config file.
pub fn apply_overrides(config: &mut Config, options: &RunOptions) {
    if let Some(sensitivity) = options.sensitivity {
        config.anomaly.sensitivity = sensitivity;
    }
    if let Some(threshold) = options.cpu_threshold {
        config.rightsizing.cpu_threshold = threshold;
    }
}

pub fn parse_as_of(value: Option<&str>) -> Result<NaiveDate> {
    match value {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("Invalid --as-of date '{}', expected YYYY-MM-DD", s)),
        None => Ok(Utc::now().date_naive()),
    }
}

/// Load, validate and run the engine against a snapshot file.
pub async fn build_report(
    config: Config,
    snapshot: &Path,
    options: &RunOptions,
) -> Result<EngineReport> {
    // Validation happens before the snapshot is even read.
    let engine = Engine::new(config)?;
    let as_of = parse_as_of(options.as_of.as_deref())?;

    let gateway = SnapshotGateway::from_path(snapshot)
        .with_context(|| format!("Failed to load snapshot: {}", snapshot.display()))?;
    let profiles = if options.profiles.is_empty() {
        gateway.profile_names()
    } else {
        options.profiles.clone()
    };

    info!(snapshot = %snapshot.display(), %as_of, "Starting analysis");
    let gateway: Arc<dyn BillingGateway> = Arc::new(gateway);
    let report = engine.run(gateway, &profiles, as_of).await?;
    Ok(report)
}

pub async fn handle_report_command(
    kind: ReportKind,
    snapshot: &Path,
    options: &RunOptions,
) -> Result<()> {
    let mut config = load_config(options.config_path.as_deref())?;
    apply_overrides(&mut config, options);

    let report = build_report(config, snapshot, options).await?;

    let rendered = match kind {
        ReportKind::Full => render(&report, options.json)?,
        ReportKind::Anomalies => render(&AnomalyListing::from_report(&report), options.json)?,
        ReportKind::Optimization => {
            render(&OptimizationListing::from_report(&report), options.json)?
        }
    };
    println!("{}", rendered);

    if report.warning_count() > 0 {
        info!(warnings = report.warning_count(), "Analysis finished with warnings");
    }
    Ok(())
}

fn render(output: &impl OutputFormat, json: bool) -> Result<String> {
    if json {
        output.to_json().context("Failed to serialize report")
    } else {
        Ok(output.to_table())
    }
}
