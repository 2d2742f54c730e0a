// Analysis module
pub mod aggregation;
pub mod anomaly;
pub mod commitment;
pub mod isolation_forest;
pub mod overview;
pub mod report;
pub mod rightsizing;
pub mod tagging;
pub mod unused;

pub use aggregation::{AccountTotals, AccountView, MATERIALITY_THRESHOLD, UsageAggregator, merge_costs};
pub use anomaly::{AnomalyDetector, AnomalyRecord, AnomalyReport, AnomalySummary, daily_series};
pub use commitment::{CommitmentAdvisor, CommitmentReport, UsagePattern, coefficient_of_variation};
pub use isolation_forest::{ForestParams, IsolationForest};
pub use overview::{BudgetStatus, ComparisonPeriod, CostOverview, ServiceCost, cost_overview};
pub use report::{OptimizationReport, OptimizationSummary, RecommendationAggregator};
pub use rightsizing::{RightSizingAnalyzer, smaller_instance};
pub use tagging::{UntaggedResources, untagged_resources};
pub use unused::{UnusedResourceAnalyzer, UnusedResourceReport};
