//! Combines the generators' output into one optimization report.

use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

use super::commitment::CommitmentReport;
use super::unused::UnusedResourceReport;
use crate::models::{
    Confidence, Recommendation, ReservedInstanceRecommendation, ResizeRecommendation,
    SavingsPlanRecommendation, UnusedResourceKind, UnusedResourceRecommendation,
};

/// Monthly savings per category; the total is their sum.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OptimizationSummary {
    pub resize_monthly: f64,
    pub unused_monthly: f64,
    pub unused_annual: f64,
    pub reserved_instance_monthly: f64,
    pub savings_plan_monthly: f64,
    pub total_monthly: f64,
    pub total_annual: f64,
    pub recommendation_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizationReport {
    pub recommendations: Vec<Recommendation>,
    pub summary: OptimizationSummary,
    pub commitment_confidence: Confidence,
}

impl OptimizationReport {
    pub fn resizes(&self) -> impl Iterator<Item = &ResizeRecommendation> {
        self.recommendations.iter().filter_map(|r| match r {
            Recommendation::Resize(r) => Some(r),
            _ => None,
        })
    }

    pub fn unused(&self) -> impl Iterator<Item = &UnusedResourceRecommendation> {
        self.recommendations.iter().filter_map(|r| match r {
            Recommendation::UnusedResource(r) => Some(r),
            _ => None,
        })
    }

    pub fn reserved_instances(&self) -> impl Iterator<Item = &ReservedInstanceRecommendation> {
        self.recommendations.iter().filter_map(|r| match r {
            Recommendation::ReservedInstance(r) => Some(r),
            _ => None,
        })
    }

    pub fn savings_plans(&self) -> impl Iterator<Item = &SavingsPlanRecommendation> {
        self.recommendations.iter().filter_map(|r| match r {
            Recommendation::SavingsPlan(r) => Some(r),
            _ => None,
        })
    }
}

#[derive(Debug, Default)]
pub struct RecommendationAggregator;

impl RecommendationAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Usage patterns in `commitments` are not part of the optimization report.
    pub fn combine(
        &self,
        resizes: Vec<ResizeRecommendation>,
        unused: UnusedResourceReport,
        commitments: CommitmentReport,
    ) -> OptimizationReport {
        // Instances already flagged as stopped or idle are not resized.
        let unused_instances: HashSet<&str> = unused
            .resources
            .iter()
            .filter(|u| {
                matches!(
                    u.kind,
                    UnusedResourceKind::StoppedInstance | UnusedResourceKind::IdleInstance
                )
            })
            .map(|u| u.resource_id.as_str())
            .collect();
        let resizes: Vec<ResizeRecommendation> = resizes
            .into_iter()
            .filter(|r| {
                let duplicate = unused_instances.contains(r.resource_id.as_str());
                if duplicate {
                    debug!(instance = %r.resource_id, "Resize superseded by unused finding");
                }
                !duplicate
            })
            .collect();

        let mut summary = OptimizationSummary {
            unused_monthly: unused.total_monthly_cost,
            unused_annual: unused.total_annual_cost,
            ..OptimizationSummary::default()
        };

        let recommendations: Vec<Recommendation> = resizes
            .into_iter()
            .map(Recommendation::Resize)
            .chain(unused.resources.into_iter().map(Recommendation::UnusedResource))
            .chain(
                commitments
                    .reserved_instances
                    .into_iter()
                    .map(Recommendation::ReservedInstance),
            )
            .chain(commitments.savings_plans.into_iter().map(Recommendation::SavingsPlan))
            .filter(|r| r.monthly_savings() > 0.0)
            .collect();

        for recommendation in &recommendations {
            let savings = recommendation.monthly_savings();
            match recommendation {
                Recommendation::Resize(_) => summary.resize_monthly += savings,
                // Already totalled by the waste scan.
                Recommendation::UnusedResource(_) => {}
                Recommendation::ReservedInstance(_) => summary.reserved_instance_monthly += savings,
                Recommendation::SavingsPlan(_) => summary.savings_plan_monthly += savings,
            }
        }
        summary.total_monthly = summary.resize_monthly
            + summary.unused_monthly
            + summary.reserved_instance_monthly
            + summary.savings_plan_monthly;
        summary.total_annual = summary.total_monthly * 12.0;
        summary.recommendation_count = recommendations.len();

        OptimizationReport {
            recommendations,
            summary,
            commitment_confidence: commitments.overall_confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommitmentService, CommitmentTerm, PaymentOption, SavingsPlanSource};

    fn resize(id: &str, savings: f64) -> ResizeRecommendation {
        ResizeRecommendation {
            resource_id: id.to_string(),
            resource_name: None,
            region: "us-east-1".to_string(),
            current_type: "t3.large".to_string(),
            recommended_type: "t3.medium".to_string(),
            avg_cpu: 3.0,
            max_cpu: 10.0,
            datapoints: 336,
            reason: "Low CPU".to_string(),
            monthly_savings: savings,
        }
    }

    fn unused(id: &str, kind: UnusedResourceKind, cost: f64) -> UnusedResourceRecommendation {
        UnusedResourceRecommendation {
            resource_id: id.to_string(),
            resource_name: None,
            kind,
            region: "us-east-1".to_string(),
            reason: "unused".to_string(),
            recommendation: "remove".to_string(),
            days_unused: None,
            monthly_cost: cost,
        }
    }

    fn waste(resources: Vec<UnusedResourceRecommendation>) -> UnusedResourceReport {
        let total_monthly_cost = resources.iter().map(|r| r.monthly_cost).sum::<f64>();
        UnusedResourceReport {
            resources,
            total_monthly_cost,
            total_annual_cost: total_monthly_cost * 12.0,
        }
    }

    fn commitments(
        reserved_instances: Vec<ReservedInstanceRecommendation>,
        savings_plans: Vec<SavingsPlanRecommendation>,
    ) -> CommitmentReport {
        let overall_confidence = Confidence::overall(
            reserved_instances
                .iter()
                .map(|r| r.confidence)
                .chain(savings_plans.iter().map(|s| s.confidence)),
        );
        CommitmentReport {
            patterns: Vec::new(),
            reserved_instances,
            savings_plans,
            overall_confidence,
        }
    }

    fn reserved(savings: f64, confidence: Confidence) -> ReservedInstanceRecommendation {
        ReservedInstanceRecommendation {
            service: CommitmentService::Compute,
            instance_type: "m5.large".to_string(),
            region: "us-east-1".to_string(),
            recommended_count: 1,
            average_daily_hours: 24.0,
            utilization_projection: 100.0,
            term: CommitmentTerm::OneYear,
            payment_option: PaymentOption::PartialUpfront,
            monthly_savings: savings,
            confidence,
        }
    }

    fn plan(savings: f64) -> SavingsPlanRecommendation {
        SavingsPlanRecommendation {
            source: SavingsPlanSource::UsageEstimate,
            hourly_commitment: 1.0,
            monthly_commitment: 720.0,
            estimated_utilization: 90.0,
            term: CommitmentTerm::OneYear,
            payment_option: PaymentOption::PartialUpfront,
            monthly_savings: savings,
            confidence: Confidence::Medium,
        }
    }

    #[test]
    fn test_subtotals_sum_to_total() {
        let report = RecommendationAggregator::new().combine(
            vec![resize("i-1", 30.0)],
            waste(vec![unused("vol-1", UnusedResourceKind::DetachedVolume, 10.0)]),
            commitments(vec![reserved(55.0, Confidence::High)], vec![plan(5.0)]),
        );

        let s = &report.summary;
        assert!((s.resize_monthly - 30.0).abs() < 1e-9);
        assert!((s.unused_monthly - 10.0).abs() < 1e-9);
        assert!((s.unused_annual - 120.0).abs() < 1e-9);
        assert!((s.reserved_instance_monthly - 55.0).abs() < 1e-9);
        assert!((s.savings_plan_monthly - 5.0).abs() < 1e-9);
        assert!((s.total_monthly - 100.0).abs() < 1e-9);
        assert!((s.total_annual - 1200.0).abs() < 1e-9);
        assert_eq!(s.recommendation_count, 4);
        assert_eq!(report.commitment_confidence, Confidence::Medium);
        assert_eq!(report.resizes().count(), 1);
        assert_eq!(report.savings_plans().count(), 1);
    }

    #[test]
    fn test_unused_instance_is_not_also_resized() {
        let report = RecommendationAggregator::new().combine(
            vec![resize("i-idle", 30.0), resize("i-busy", 20.0)],
            waste(vec![unused("i-idle", UnusedResourceKind::IdleInstance, 70.0)]),
            commitments(Vec::new(), Vec::new()),
        );

        let resized: Vec<&str> = report.resizes().map(|r| r.resource_id.as_str()).collect();
        assert_eq!(resized, vec!["i-busy"]);
        assert!((report.summary.total_monthly - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_savings_are_discarded() {
        let report = RecommendationAggregator::new().combine(
            vec![resize("i-1", 0.0)],
            waste(vec![unused("eip", UnusedResourceKind::UnassociatedAddress, 0.0)]),
            commitments(Vec::new(), Vec::new()),
        );
        assert!(report.recommendations.is_empty());
        assert_eq!(report.summary.total_monthly, 0.0);
        assert_eq!(report.commitment_confidence, Confidence::Low);
    }
}
