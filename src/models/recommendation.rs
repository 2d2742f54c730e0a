//! Recommendation variants produced by the three generators.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::billing::CommitmentService;

/// Confidence tier for commitment recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Batch confidence: High only when every entry is High, Medium when any
    /// entry is Medium, Low otherwise (including an empty batch).
    pub fn overall<I>(levels: I) -> Confidence
    where
        I: IntoIterator<Item = Confidence>,
    {
        let levels: Vec<Confidence> = levels.into_iter().collect();
        if levels.is_empty() {
            return Confidence::Low;
        }
        if levels.iter().all(|c| *c == Confidence::High) {
            Confidence::High
        } else if levels.iter().any(|c| *c == Confidence::Medium) {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Low => f.write_str("Low"),
            Confidence::Medium => f.write_str("Medium"),
            Confidence::High => f.write_str("High"),
        }
    }
}

/// Qualitative bucket for the coefficient of variation of daily usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stability {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitmentTerm {
    #[serde(rename = "1 year")]
    OneYear,
    #[serde(rename = "3 years")]
    ThreeYears,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentOption {
    #[serde(rename = "No Upfront")]
    NoUpfront,
    #[serde(rename = "Partial Upfront")]
    PartialUpfront,
    #[serde(rename = "All Upfront")]
    AllUpfront,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResizeRecommendation {
    pub resource_id: String,
    pub resource_name: Option<String>,
    pub region: String,
    pub current_type: String,
    pub recommended_type: String,
    pub avg_cpu: f64,
    pub max_cpu: f64,
    pub datapoints: usize,
    pub reason: String,
    pub monthly_savings: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnusedResourceKind {
    StoppedInstance,
    IdleInstance,
    DetachedVolume,
    UnassociatedAddress,
}

impl UnusedResourceKind {
    pub fn resource_type(&self) -> &'static str {
        match self {
            UnusedResourceKind::StoppedInstance | UnusedResourceKind::IdleInstance => {
                "Compute Instance"
            }
            UnusedResourceKind::DetachedVolume => "Storage Volume",
            UnusedResourceKind::UnassociatedAddress => "Network Address",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnusedResourceRecommendation {
    pub resource_id: String,
    pub resource_name: Option<String>,
    pub kind: UnusedResourceKind,
    pub region: String,
    pub reason: String,
    pub recommendation: String,
    pub days_unused: Option<i64>,
    pub monthly_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservedInstanceRecommendation {
    pub service: CommitmentService,
    pub instance_type: String,
    pub region: String,
    pub recommended_count: u32,
    pub average_daily_hours: f64,
    pub utilization_projection: f64,
    pub term: CommitmentTerm,
    pub payment_option: PaymentOption,
    pub monthly_savings: f64,
    pub confidence: Confidence,
}

/// Which strategy produced a savings-plan recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavingsPlanSource {
    ProviderAdvisory,
    UsageEstimate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsPlanRecommendation {
    pub source: SavingsPlanSource,
    pub hourly_commitment: f64,
    pub monthly_commitment: f64,
    pub estimated_utilization: f64,
    pub term: CommitmentTerm,
    pub payment_option: PaymentOption,
    pub monthly_savings: f64,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recommendation {
    Resize(ResizeRecommendation),
    UnusedResource(UnusedResourceRecommendation),
    ReservedInstance(ReservedInstanceRecommendation),
    SavingsPlan(SavingsPlanRecommendation),
}

impl Recommendation {
    pub fn monthly_savings(&self) -> f64 {
        match self {
            Recommendation::Resize(r) => r.monthly_savings,
            Recommendation::UnusedResource(r) => r.monthly_cost,
            Recommendation::ReservedInstance(r) => r.monthly_savings,
            Recommendation::SavingsPlan(r) => r.monthly_savings,
        }
    }

    /// Confidence tier for commitment variants; `None` for resource findings.
    pub fn confidence(&self) -> Option<Confidence> {
        match self {
            Recommendation::ReservedInstance(r) => Some(r.confidence),
            Recommendation::SavingsPlan(r) => Some(r.confidence),
            Recommendation::Resize(_) | Recommendation::UnusedResource(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overall_confidence() {
        use Confidence::*;
        assert_eq!(Confidence::overall([High, High]), High);
        assert_eq!(Confidence::overall([High, Medium]), Medium);
        assert_eq!(Confidence::overall([Low, Medium]), Medium);
        assert_eq!(Confidence::overall([Low, High]), Low);
        assert_eq!(Confidence::overall(Vec::new()), Low);
    }

    #[test]
    fn test_recommendation_serializes_with_kind_tag() {
        let rec = Recommendation::SavingsPlan(SavingsPlanRecommendation {
            source: SavingsPlanSource::UsageEstimate,
            hourly_commitment: 1.0,
            monthly_commitment: 720.0,
            estimated_utilization: 90.0,
            term: CommitmentTerm::OneYear,
            payment_option: PaymentOption::PartialUpfront,
            monthly_savings: 180.0,
            confidence: Confidence::Medium,
        });
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["kind"], "savings_plan");
        assert_eq!(json["term"], "1 year");
        assert_eq!(json["payment_option"], "Partial Upfront");
        assert!((rec.monthly_savings() - 180.0).abs() < 1e-9);
    }
}
