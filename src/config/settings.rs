use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub anomaly: AnomalyConfig,
    #[serde(default)]
    pub rightsizing: RightSizingConfig,
    #[serde(default)]
    pub commitment: CommitmentConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub lookback_days: u32,            // CPU and unused-resource window
    pub commitment_lookback_days: u32, // usage window for reservations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range_days: Option<u32>,  // None = month-to-date vs last month
    pub regions: Vec<String>,          // empty = every region the gateway reports
    pub tag_filter: Vec<String>,       // "Key=Value" pairs forwarded to the gateway
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub sensitivity: f64,   // contamination, 0.01 - 0.5
    pub lookback_days: u32, // daily cost history fed to the model
    pub min_history_days: usize,
    pub rolling_window: usize,
    pub min_deviation_ratio: f64,
    pub trees: usize,
    pub max_samples: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RightSizingConfig {
    pub cpu_threshold: f64,      // average CPU % below which a downsize is considered
    pub max_cpu_guard: f64,      // peak CPU % that vetoes a downsize
    pub idle_cpu_threshold: f64, // average CPU % that marks a running instance as waste
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitmentConfig {
    pub min_consistency: f64,
    pub min_history_days: usize,
    pub high_confidence_consistency: f64,
    pub high_confidence_cv: f64,
    pub medium_confidence_consistency: f64,
    pub medium_confidence_cv: f64,
    pub high_stability_cv: f64,
    pub medium_stability_cv: f64,
    pub compute_discount: f64,
    pub database_discount: f64,
    pub savings_plan_commitment_ratio: f64,
    pub savings_plan_savings_ratio: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            lookback_days: 14,
            commitment_lookback_days: 30,
            time_range_days: None,
            regions: Vec::new(),
            tag_filter: Vec::new(),
        }
    }
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            sensitivity: 0.05,
            lookback_days: 90,
            min_history_days: 14,
            rolling_window: 7,
            min_deviation_ratio: 0.5,
            trees: 100,
            max_samples: 256,
            seed: 42,
        }
    }
}

impl Default for RightSizingConfig {
    fn default() -> Self {
        Self {
            cpu_threshold: 40.0,
            max_cpu_guard: 80.0,
            idle_cpu_threshold: 5.0,
        }
    }
}

impl Default for CommitmentConfig {
    fn default() -> Self {
        Self {
            min_consistency: 0.70,
            min_history_days: 14,
            high_confidence_consistency: 0.90,
            high_confidence_cv: 0.10,
            medium_confidence_consistency: 0.80,
            medium_confidence_cv: 0.20,
            high_stability_cv: 0.10,
            medium_stability_cv: 0.30,
            compute_discount: 0.40,
            database_discount: 0.45,
            savings_plan_commitment_ratio: 0.70,
            savings_plan_savings_ratio: 0.25,
        }
    }
}

fn check_range(name: &str, value: f64, min: f64, max: f64) -> EngineResult<()> {
    if value.is_nan() || value < min || value > max {
        return Err(EngineError::invalid_config(format!(
            "{} must be between {} and {}, got {}",
            name, min, max, value
        )));
    }
    Ok(())
}

impl Config {
    /// Load from the default location, writing defaults on first use
    pub fn load() -> Result<Self> {
        let config_path = Self::default_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_commented_toml()?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn to_commented_toml(&self) -> Result<String> {
        let body = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        let mut output = String::new();
        output.push_str("# cloudspend configuration\n");
        output.push_str("#\n");
        output.push_str("# [analysis]    lookback windows, comparison period, region and tag filters\n");
        output.push_str("# [anomaly]     outlier model; sensitivity must stay within 0.01 - 0.5\n");
        output.push_str("# [rightsizing] CPU thresholds in percent\n");
        output.push_str("# [commitment]  consistency / variation cut points and discount ratios\n");
        output.push('\n');
        output.push_str(&body);
        Ok(output)
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join("cloudspend").join("config.toml"))
    }

    /// Check every documented range before any analysis runs
    pub fn validate(&self) -> EngineResult<()> {
        let analysis = &self.analysis;
        if analysis.lookback_days == 0 {
            return Err(EngineError::invalid_config("analysis.lookback_days must be at least 1"));
        }
        if analysis.commitment_lookback_days == 0 {
            return Err(EngineError::invalid_config(
                "analysis.commitment_lookback_days must be at least 1",
            ));
        }
        if analysis.time_range_days == Some(0) {
            return Err(EngineError::invalid_config("analysis.time_range_days must be at least 1"));
        }
        let tag_pattern = Regex::new(r"^[^=\s]+=[^=]*$")
            .map_err(|e| EngineError::invalid_config(e.to_string()))?;
        for tag in &analysis.tag_filter {
            if !tag_pattern.is_match(tag) {
                return Err(EngineError::invalid_config(format!(
                    "tag filter '{}' must look like Key=Value",
                    tag
                )));
            }
        }

        let anomaly = &self.anomaly;
        check_range("anomaly.sensitivity", anomaly.sensitivity, 0.01, 0.5)?;
        check_range("anomaly.min_deviation_ratio", anomaly.min_deviation_ratio, 0.0, f64::MAX)?;
        if (anomaly.lookback_days as usize) < anomaly.min_history_days {
            return Err(EngineError::invalid_config(
                "anomaly.lookback_days must cover anomaly.min_history_days",
            ));
        }
        if anomaly.rolling_window < 2 {
            return Err(EngineError::invalid_config("anomaly.rolling_window must be at least 2"));
        }
        if anomaly.min_history_days < anomaly.rolling_window {
            return Err(EngineError::invalid_config(
                "anomaly.min_history_days must cover at least one rolling window",
            ));
        }
        if anomaly.trees == 0 || anomaly.max_samples < 2 {
            return Err(EngineError::invalid_config(
                "anomaly.trees must be positive and anomaly.max_samples at least 2",
            ));
        }

        let rs = &self.rightsizing;
        check_range("rightsizing.cpu_threshold", rs.cpu_threshold, 0.0, 100.0)?;
        check_range("rightsizing.max_cpu_guard", rs.max_cpu_guard, 0.0, 100.0)?;
        check_range("rightsizing.idle_cpu_threshold", rs.idle_cpu_threshold, 0.0, 100.0)?;

        let c = &self.commitment;
        for (name, value) in [
            ("commitment.min_consistency", c.min_consistency),
            ("commitment.high_confidence_consistency", c.high_confidence_consistency),
            ("commitment.medium_confidence_consistency", c.medium_confidence_consistency),
            ("commitment.compute_discount", c.compute_discount),
            ("commitment.database_discount", c.database_discount),
            ("commitment.savings_plan_commitment_ratio", c.savings_plan_commitment_ratio),
            ("commitment.savings_plan_savings_ratio", c.savings_plan_savings_ratio),
        ] {
            check_range(name, value, 0.0, 1.0)?;
        }
        for (name, value) in [
            ("commitment.high_confidence_cv", c.high_confidence_cv),
            ("commitment.medium_confidence_cv", c.medium_confidence_cv),
            ("commitment.high_stability_cv", c.high_stability_cv),
            ("commitment.medium_stability_cv", c.medium_stability_cv),
        ] {
            check_range(name, value, 0.0, f64::MAX)?;
        }
        if c.high_confidence_consistency < c.medium_confidence_consistency
            || c.high_confidence_cv > c.medium_confidence_cv
            || c.high_stability_cv > c.medium_stability_cv
        {
            return Err(EngineError::invalid_config(
                "commitment High cut points must be at least as strict as Medium ones",
            ));
        }

        Ok(())
    }

    /// Set a single `section.key` value from its string form
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
            value
                .parse::<T>()
                .map_err(|_| anyhow::anyhow!("Invalid value '{}' for {}", value, key))
        }

        match key {
            "analysis.lookback_days" => self.analysis.lookback_days = parse(key, value)?,
            "analysis.commitment_lookback_days" => {
                self.analysis.commitment_lookback_days = parse(key, value)?
            }
            "analysis.time_range_days" => {
                self.analysis.time_range_days = match value {
                    "" | "month" | "none" => None,
                    days => Some(parse(key, days)?),
                }
            }
            "analysis.regions" => self.analysis.regions = split_list(value),
            "analysis.tag_filter" => self.analysis.tag_filter = split_list(value),
            "anomaly.sensitivity" => self.anomaly.sensitivity = parse(key, value)?,
            "anomaly.lookback_days" => self.anomaly.lookback_days = parse(key, value)?,
            "anomaly.min_deviation_ratio" => self.anomaly.min_deviation_ratio = parse(key, value)?,
            "anomaly.seed" => self.anomaly.seed = parse(key, value)?,
            "rightsizing.cpu_threshold" => self.rightsizing.cpu_threshold = parse(key, value)?,
            "rightsizing.max_cpu_guard" => self.rightsizing.max_cpu_guard = parse(key, value)?,
            "rightsizing.idle_cpu_threshold" => {
                self.rightsizing.idle_cpu_threshold = parse(key, value)?
            }
            "commitment.min_consistency" => self.commitment.min_consistency = parse(key, value)?,
            "commitment.compute_discount" => self.commitment.compute_discount = parse(key, value)?,
            "commitment.database_discount" => {
                self.commitment.database_discount = parse(key, value)?
            }
            _ => anyhow::bail!("Unknown configuration key: {}", key),
        }

        self.validate()?;
        Ok(())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
