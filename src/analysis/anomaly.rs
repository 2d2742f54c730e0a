//! Per-service cost anomaly detection.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::isolation_forest::{ForestParams, IsolationForest};
use crate::config::AnomalyConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{CostRecord, DateWindow};

/// A day whose spend the model isolated as unusual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub service: String,
    pub date: NaiveDate,
    pub amount: f64,
    pub baseline: f64,
    pub deviation_multiplier: f64,
    /// Offset-adjusted model score; more negative is more anomalous.
    pub outlier_score: f64,
    /// Days before the last day of the series.
    pub days_ago: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalySummary {
    pub total_anomalies: usize,
    pub services_analyzed: usize,
    pub services_with_anomalies: usize,
    pub highest_deviation: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub anomalies: Vec<AnomalyRecord>,
    pub summary: AnomalySummary,
}

/// `amount / baseline`, or 0 when there is no positive baseline.
pub fn deviation_multiplier(amount: f64, baseline: f64) -> f64 {
    if baseline <= 0.0 {
        return 0.0;
    }
    amount / baseline
}

/// Build one gap-free daily series per service.
///
/// Records outside `window` are ignored. Every series spans the first to the
/// last date seen across all services, with missing days filled with zero.
pub fn daily_series(
    costs: &[CostRecord],
    window: DateWindow,
) -> BTreeMap<String, Vec<(NaiveDate, f64)>> {
    let in_window: Vec<&CostRecord> = costs.iter().filter(|c| window.contains(c.date)).collect();

    let (Some(first), Some(last)) = (
        in_window.iter().map(|c| c.date).min(),
        in_window.iter().map(|c| c.date).max(),
    ) else {
        return BTreeMap::new();
    };
    let span = DateWindow::new(first, last);

    let mut by_service: BTreeMap<String, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
    for record in in_window {
        *by_service
            .entry(record.service.clone())
            .or_default()
            .entry(record.date)
            .or_insert(0.0) += record.amount;
    }

    by_service
        .into_iter()
        .map(|(service, days)| {
            let series = span
                .dates()
                .map(|d| (d, days.get(&d).copied().unwrap_or(0.0)))
                .collect();
            (service, series)
        })
        .collect()
}

/// (cost, trailing mean, trailing sample std) per day.
///
/// Days before the first full window reuse the first full window's statistics.
pub fn rolling_features(values: &[f64], window: usize) -> Vec<Vec<f64>> {
    let window = window.clamp(1, values.len().max(1));

    let stats_at = |end: usize| -> (f64, f64) {
        let slice = &values[end + 1 - window..=end];
        let mean = slice.iter().sum::<f64>() / window as f64;
        let std = if window > 1 {
            let var = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (window - 1) as f64;
            var.sqrt()
        } else {
            0.0
        };
        (mean, std)
    };

    if values.is_empty() {
        return Vec::new();
    }

    let first_full = stats_at(window - 1);
    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let (mean, std) = if i + 1 < window { first_full } else { stats_at(i) };
            vec![value, mean, std]
        })
        .collect()
}

/// Flags unusual days in per-service daily cost series
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    config: AnomalyConfig,
}

impl AnomalyDetector {
    pub fn new(config: AnomalyConfig) -> EngineResult<Self> {
        if !(0.01..=0.5).contains(&config.sensitivity) {
            return Err(EngineError::invalid_config(format!(
                "anomaly sensitivity must be between 0.01 and 0.5, got {}",
                config.sensitivity
            )));
        }
        if config.rolling_window < 2 {
            return Err(EngineError::invalid_config(
                "anomaly rolling window must be at least 2 days",
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnomalyConfig {
        &self.config
    }

    pub fn detect(&self, series: &BTreeMap<String, Vec<(NaiveDate, f64)>>) -> AnomalyReport {
        let mut report = AnomalyReport::default();

        for (service, points) in series {
            let Some(records) = self.detect_service(service, points) else {
                continue;
            };
            report.summary.services_analyzed += 1;
            if !records.is_empty() {
                report.summary.services_with_anomalies += 1;
            }
            report.anomalies.extend(records);
        }

        report.summary.total_anomalies = report.anomalies.len();
        report.summary.highest_deviation = report
            .anomalies
            .iter()
            .map(|a| a.deviation_multiplier)
            .fold(0.0, f64::max);
        report
    }

    /// Anomalies for one service; `None` when the history is too short to analyse.
    pub fn detect_service(
        &self,
        service: &str,
        points: &[(NaiveDate, f64)],
    ) -> Option<Vec<AnomalyRecord>> {
        let min_history = self.config.min_history_days.max(self.config.rolling_window);
        if points.len() < min_history {
            debug!(service, days = points.len(), "Skipping service with short history");
            return None;
        }

        let values: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
        let features = rolling_features(&values, self.config.rolling_window);
        let params = ForestParams {
            trees: self.config.trees,
            max_samples: self.config.max_samples,
            contamination: self.config.sensitivity,
            seed: self.config.seed,
        };
        let Some(forest) = IsolationForest::fit(&features, &params) else {
            return Some(Vec::new());
        };

        let flagged: Vec<bool> = features.iter().map(|row| forest.is_outlier(row)).collect();
        let normal: Vec<f64> = values
            .iter()
            .zip(&flagged)
            .filter(|(_, is_outlier)| !**is_outlier)
            .map(|(v, _)| *v)
            .collect();
        let reference = if normal.is_empty() { &values } else { &normal };
        let baseline = reference.iter().sum::<f64>() / reference.len() as f64;

        if baseline <= 0.0 {
            return Some(Vec::new());
        }

        let last = values.len() - 1;
        let records: Vec<AnomalyRecord> = flagged
            .iter()
            .enumerate()
            .filter(|(_, is_outlier)| **is_outlier)
            .filter_map(|(i, _)| {
                let (date, amount) = points[i];
                let multiplier = deviation_multiplier(amount, baseline);
                if (multiplier - 1.0).abs() < self.config.min_deviation_ratio {
                    return None;
                }
                Some(AnomalyRecord {
                    service: service.to_string(),
                    date,
                    amount,
                    baseline,
                    deviation_multiplier: multiplier,
                    outlier_score: forest.decision_function(&features[i]),
                    days_ago: (last - i) as i64,
                })
            })
            .collect();

        debug!(
            service,
            days = values.len(),
            baseline,
            anomalies = records.len(),
            "Analysed service"
        );
        Some(records)
    }
}
