//! End-to-end analysis run: collect, merge per account, analyse each account.

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use std::mem;
use std::sync::Arc;
use tracing::info;

use crate::analysis::{
    AccountTotals, AccountView, AnomalyDetector, AnomalyReport, CommitmentAdvisor,
    ComparisonPeriod, CostOverview, OptimizationReport, RecommendationAggregator,
    RightSizingAnalyzer, UnusedResourceAnalyzer, UntaggedResources, UsageAggregator, UsagePattern,
    cost_overview, daily_series, untagged_resources,
};
use crate::config::Config;
use crate::diagnostics::Warning;
use crate::error::{EngineError, EngineResult};
use crate::gateway::{BillingGateway, CollectionPlan, collect_profiles};
use crate::models::{AccountIdentity, DateWindow, PricingCatalog};

/// Everything produced for one billing account.
#[derive(Debug, Clone, Serialize)]
pub struct AccountReport {
    pub label: String,
    pub account: Option<AccountIdentity>,
    pub profiles: Vec<String>,
    pub totals: AccountTotals,
    pub overview: CostOverview,
    pub anomalies: AnomalyReport,
    pub optimization: OptimizationReport,
    pub usage_patterns: Vec<UsagePattern>,
    pub untagged: UntaggedResources,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineReport {
    pub as_of: NaiveDate,
    pub accounts: Vec<AccountReport>,
}

impl EngineReport {
    pub fn account(&self, label: &str) -> Option<&AccountReport> {
        self.accounts.iter().find(|a| a.label == label)
    }

    pub fn warning_count(&self) -> usize {
        self.accounts.iter().map(|a| a.warnings.len()).sum()
    }
}

/// Validated configuration plus the pricing catalog used for every estimate.
#[derive(Debug, Clone)]
pub struct Engine {
    config: Config,
    pricing: PricingCatalog,
    detector: AnomalyDetector,
}

impl Engine {
    /// Rejects invalid configuration before anything is fetched.
    pub fn new(config: Config) -> EngineResult<Self> {
        config.validate()?;
        let detector = AnomalyDetector::new(config.anomaly.clone())?;
        Ok(Self {
            config,
            pricing: PricingCatalog::new(),
            detector,
        })
    }

    pub fn with_pricing(mut self, pricing: PricingCatalog) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn comparison_period(&self) -> ComparisonPeriod {
        ComparisonPeriod::from_days(self.config.analysis.time_range_days)
    }

    fn anomaly_window(&self, as_of: NaiveDate) -> DateWindow {
        DateWindow::trailing(as_of, self.config.anomaly.lookback_days)
    }

    /// Windows and filters for one run ending at `as_of`.
    pub fn plan(&self, as_of: NaiveDate) -> CollectionPlan {
        let analysis = &self.config.analysis;
        let anomaly_window = self.anomaly_window(as_of);
        let (current, previous) = self.comparison_period().windows(as_of);

        CollectionPlan {
            cost_window: anomaly_window.union(&current).union(&previous),
            cpu_window: DateWindow::trailing(as_of, analysis.lookback_days),
            usage_window: DateWindow::trailing(as_of, analysis.commitment_lookback_days),
            regions: analysis.regions.clone(),
            tag_filter: analysis.tag_filter.clone(),
        }
    }

    pub async fn run(
        &self,
        gateway: Arc<dyn BillingGateway>,
        profiles: &[String],
        as_of: NaiveDate,
    ) -> EngineResult<EngineReport> {
        if profiles.is_empty() {
            return Err(EngineError::invalid_config("at least one profile is required"));
        }

        let plan = self.plan(as_of);
        info!(
            profiles = profiles.len(),
            start = %plan.cost_window.start,
            end = %plan.cost_window.end,
            "Collecting billing data"
        );

        let fetches = collect_profiles(gateway, profiles, &plan).await;
        let accounts = UsageAggregator::new()
            .aggregate(fetches)
            .into_iter()
            .map(|view| self.analyze_account(view, as_of))
            .collect();

        Ok(EngineReport { as_of, accounts })
    }

    /// Pure analysis of one merged account.
    pub fn analyze_account(&self, view: AccountView, as_of: NaiveDate) -> AccountReport {
        let analysis = &self.config.analysis;
        let totals = view.totals();

        let overview = cost_overview(
            &view.costs,
            &view.inventory,
            &view.budgets,
            self.comparison_period(),
            as_of,
        );

        let series = daily_series(&view.costs, self.anomaly_window(as_of));
        let anomalies = self.detector.detect(&series);

        let resizes =
            RightSizingAnalyzer::new(&self.config.rightsizing, &self.pricing).analyze(&view.inventory);
        let unused = UnusedResourceAnalyzer::new(
            &self.config.rightsizing,
            &self.pricing,
            analysis.lookback_days,
            as_of.and_time(NaiveTime::MIN).and_utc(),
        )
        .analyze(&view.inventory);
        let mut commitments = CommitmentAdvisor::new(
            &self.config.commitment,
            &self.pricing,
            analysis.commitment_lookback_days,
        )
        .advise(&view.usage, view.savings_plan_advisory.as_deref());

        let usage_patterns = mem::take(&mut commitments.patterns);
        let optimization = RecommendationAggregator::new().combine(resizes, unused, commitments);
        let untagged = untagged_resources(&view.inventory);

        info!(
            account = %view.label,
            anomalies = anomalies.summary.total_anomalies,
            recommendations = optimization.summary.recommendation_count,
            monthly_savings = optimization.summary.total_monthly,
            untagged = untagged.count(),
            "Account analysed"
        );

        AccountReport {
            label: view.label,
            account: view.account,
            profiles: view.profiles,
            totals,
            overview,
            anomalies,
            optimization,
            usage_patterns,
            untagged,
            warnings: view.diagnostics.into_warnings(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = Config::default();
        config.anomaly.sensitivity = 0.9;
        assert!(matches!(
            Engine::new(config),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_plan_covers_every_window() {
        let engine = Engine::new(Config::default()).unwrap();
        let plan = engine.plan(date("2024-03-05"));

        // The 90-day anomaly history reaches further back than the comparison.
        assert_eq!(plan.cost_window.start, date("2023-12-07"));
        assert_eq!(plan.cost_window.end, date("2024-03-05"));
        assert_eq!(plan.cpu_window, DateWindow::new(date("2024-02-21"), date("2024-03-05")));
        assert_eq!(plan.usage_window.days(), 30);
    }

    #[test]
    fn test_plan_with_trailing_period() {
        let mut config = Config::default();
        config.analysis.time_range_days = Some(30);
        config.analysis.regions = vec!["eu-west-1".to_string()];
        let engine = Engine::new(config.clone()).unwrap();
        let plan = engine.plan(date("2024-03-31"));

        assert_eq!(plan.cost_window.start, date("2024-01-02"));
        assert_eq!(plan.regions, vec!["eu-west-1".to_string()]);

        // With a short anomaly history the previous period sets the start.
        config.anomaly.lookback_days = 14;
        let plan = Engine::new(config).unwrap().plan(date("2024-03-31"));
        assert_eq!(plan.cost_window.start, date("2024-02-01"));
        assert_eq!(plan.cpu_window.start, date("2024-03-18"));
    }

    #[tokio::test]
    async fn test_swapped_pricing_drives_savings() {
        let snapshot = serde_json::json!({"profiles": [{
            "name": "prod",
            "account_id": "555",
            "regions": {"us-east-1": {
                "instances": [{"id": "i-app", "instance_type": "t3.large", "state": "running",
                               "tags": {"Name": "app"}}],
                "cpu": {"i-app": [
                    {"timestamp": "2024-03-30T10:00:00Z", "average": 8.0, "maximum": 35.0},
                    {"timestamp": "2024-03-30T11:00:00Z", "average": 8.0, "maximum": 20.0}
                ]}
            }}
        }]});
        let gateway: Arc<dyn BillingGateway> =
            Arc::new(crate::gateway::SnapshotGateway::from_json(&snapshot.to_string()).unwrap());
        let profiles = vec!["prod".to_string()];

        let mut pricing = PricingCatalog::new();
        pricing.set_instance_hourly("t3.large", 0.2);
        let engine = Engine::new(Config::default()).unwrap().with_pricing(pricing);
        let report = engine.run(gateway, &profiles, date("2024-03-31")).await.unwrap();

        let resizes: Vec<_> = report.accounts[0].optimization.resizes().collect();
        assert_eq!(resizes.len(), 1);
        let expected = (0.2 - 0.0416) * crate::models::HOURS_PER_MONTH;
        assert!((resizes[0].monthly_savings - expected).abs() < 1e-9);
        assert!(report.accounts[0].untagged.is_empty());
    }
}
