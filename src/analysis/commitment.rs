//! Reservation and savings plan advice from historical usage.
//!
//! Savings plans come from one of two strategies. The provider's own advisory
//! wins whenever it yields at least one offer with positive savings; the usage
//! estimate is used only when the advisory is missing or empty.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::CommitmentConfig;
use crate::gateway::SavingsPlanOffer;
use crate::models::{
    CommitmentService, CommitmentTerm, Confidence, HOURS_PER_MONTH, PaymentOption,
    PricingCatalog, ReservedInstanceRecommendation, SavingsPlanRecommendation, SavingsPlanSource,
    Stability, UsageQuantity,
};

/// Utilization assumed for a commitment sized from our own estimate.
const ESTIMATED_PLAN_UTILIZATION: f64 = 90.0;

/// Steady usage of one instance type in one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsagePattern {
    pub service: CommitmentService,
    pub instance_type: String,
    pub region: String,
    /// Share of lookback days with any usage, in [0, 1].
    pub consistency: f64,
    pub coefficient_of_variation: f64,
    pub stability: Stability,
    pub days_used: usize,
    pub average_daily_hours: f64,
    pub total_hours: f64,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitmentReport {
    pub patterns: Vec<UsagePattern>,
    pub reserved_instances: Vec<ReservedInstanceRecommendation>,
    pub savings_plans: Vec<SavingsPlanRecommendation>,
    /// Low when there is nothing to recommend.
    pub overall_confidence: Confidence,
}

pub struct CommitmentAdvisor<'a> {
    config: &'a CommitmentConfig,
    pricing: &'a PricingCatalog,
    lookback_days: u32,
}

impl<'a> CommitmentAdvisor<'a> {
    pub fn new(config: &'a CommitmentConfig, pricing: &'a PricingCatalog, lookback_days: u32) -> Self {
        Self {
            config,
            pricing,
            lookback_days: lookback_days.max(1),
        }
    }

    /// Patterns, reservations and savings plans in one pass.
    pub fn advise(
        &self,
        usage: &[UsageQuantity],
        advisory: Option<&[SavingsPlanOffer]>,
    ) -> CommitmentReport {
        let patterns = self.usage_patterns(usage);
        let reserved_instances = self.reserved_instances(&patterns);
        let savings_plans = self.savings_plans(advisory, &patterns);

        let overall_confidence = Confidence::overall(
            reserved_instances
                .iter()
                .map(|r| r.confidence)
                .chain(savings_plans.iter().map(|s| s.confidence)),
        );

        CommitmentReport {
            patterns,
            reserved_instances,
            savings_plans,
            overall_confidence,
        }
    }

    /// Group usage by (service, type, region) and keep the consistent groups.
    pub fn usage_patterns(&self, usage: &[UsageQuantity]) -> Vec<UsagePattern> {
        type Key = (CommitmentService, String, String);
        let mut daily: BTreeMap<Key, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
        for quantity in usage.iter().filter(|u| u.hours > 0.0) {
            *daily
                .entry((quantity.service, quantity.instance_type.clone(), quantity.region.clone()))
                .or_default()
                .entry(quantity.date)
                .or_insert(0.0) += quantity.hours;
        }

        let lookback = f64::from(self.lookback_days);
        let mut patterns: Vec<UsagePattern> = daily
            .into_iter()
            .filter_map(|((service, instance_type, region), days)| {
                let values: Vec<f64> = days.into_values().collect();
                let days_used = values.len();
                let consistency = (days_used as f64 / lookback).min(1.0);

                if consistency < self.config.min_consistency || days_used < self.config.min_history_days {
                    debug!(%instance_type, %region, days_used, consistency, "Usage too sparse to commit");
                    return None;
                }

                let total_hours: f64 = values.iter().sum();
                let mean = total_hours / days_used as f64;
                let cv = coefficient_of_variation(&values);

                Some(UsagePattern {
                    service,
                    instance_type,
                    region,
                    consistency,
                    coefficient_of_variation: cv,
                    stability: self.stability(cv),
                    days_used,
                    average_daily_hours: mean,
                    total_hours,
                    confidence: self.confidence(consistency, cv),
                })
            })
            .collect();

        patterns.sort_by(|a, b| b.total_hours.partial_cmp(&a.total_hours).unwrap_or(Ordering::Equal));
        patterns
    }

    pub fn stability(&self, cv: f64) -> Stability {
        if cv < self.config.high_stability_cv {
            Stability::High
        } else if cv < self.config.medium_stability_cv {
            Stability::Medium
        } else {
            Stability::Low
        }
    }

    pub fn confidence(&self, consistency: f64, cv: f64) -> Confidence {
        if consistency > self.config.high_confidence_consistency && cv < self.config.high_confidence_cv {
            Confidence::High
        } else if consistency > self.config.medium_confidence_consistency
            && cv < self.config.medium_confidence_cv
        {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }

    pub fn reserved_instances(&self, patterns: &[UsagePattern]) -> Vec<ReservedInstanceRecommendation> {
        let mut recommendations: Vec<ReservedInstanceRecommendation> = patterns
            .iter()
            .filter(|p| p.confidence != Confidence::Low)
            .filter_map(|p| {
                // Whole instances only, rounded down.
                let count = (p.average_daily_hours / 24.0).floor();
                if count < 1.0 {
                    return None;
                }

                let (rate, discount) = match p.service {
                    CommitmentService::Compute => (
                        self.pricing.instance_hourly_in_region(&p.instance_type, &p.region),
                        self.config.compute_discount,
                    ),
                    CommitmentService::Database => (
                        self.pricing.database_hourly_in_region(&p.instance_type, &p.region),
                        self.config.database_discount,
                    ),
                };
                let monthly_savings = rate * discount * count * HOURS_PER_MONTH;
                if monthly_savings <= 0.0 {
                    return None;
                }

                Some(ReservedInstanceRecommendation {
                    service: p.service,
                    instance_type: p.instance_type.clone(),
                    region: p.region.clone(),
                    recommended_count: count as u32,
                    average_daily_hours: p.average_daily_hours,
                    utilization_projection: p.consistency * 100.0,
                    term: CommitmentTerm::OneYear,
                    payment_option: PaymentOption::PartialUpfront,
                    monthly_savings,
                    confidence: p.confidence,
                })
            })
            .collect();

        recommendations.sort_by(|a, b| {
            b.monthly_savings
                .partial_cmp(&a.monthly_savings)
                .unwrap_or(Ordering::Equal)
        });
        recommendations
    }

    /// Advisory first, usage estimate as the fallback.
    pub fn savings_plans(
        &self,
        advisory: Option<&[SavingsPlanOffer]>,
        patterns: &[UsagePattern],
    ) -> Vec<SavingsPlanRecommendation> {
        if let Some(offers) = advisory {
            let recommendations = self.from_advisory(offers);
            if !recommendations.is_empty() {
                return recommendations;
            }
            debug!("Advisory had no usable offers, estimating from usage");
        }
        self.from_usage_estimate(patterns).into_iter().collect()
    }

    fn from_advisory(&self, offers: &[SavingsPlanOffer]) -> Vec<SavingsPlanRecommendation> {
        let mut recommendations: Vec<SavingsPlanRecommendation> = offers
            .iter()
            .filter(|o| o.estimated_monthly_savings > 0.0 && o.hourly_commitment > 0.0)
            .map(|o| SavingsPlanRecommendation {
                source: SavingsPlanSource::ProviderAdvisory,
                hourly_commitment: o.hourly_commitment,
                monthly_commitment: o.hourly_commitment * HOURS_PER_MONTH,
                estimated_utilization: o.estimated_utilization,
                term: CommitmentTerm::OneYear,
                payment_option: PaymentOption::PartialUpfront,
                monthly_savings: o.estimated_monthly_savings,
                confidence: if o.estimated_utilization > 90.0 {
                    Confidence::High
                } else {
                    Confidence::Medium
                },
            })
            .collect();

        recommendations.sort_by(|a, b| {
            b.monthly_savings
                .partial_cmp(&a.monthly_savings)
                .unwrap_or(Ordering::Equal)
        });
        recommendations
    }

    /// Commit to a share of the steady compute spend per hour.
    fn from_usage_estimate(&self, patterns: &[UsagePattern]) -> Option<SavingsPlanRecommendation> {
        let window_hours = f64::from(self.lookback_days) * 24.0;
        let steady_spend: f64 = patterns
            .iter()
            .filter(|p| p.service == CommitmentService::Compute && p.confidence != Confidence::Low)
            .map(|p| p.total_hours * self.pricing.instance_hourly_in_region(&p.instance_type, &p.region))
            .sum::<f64>()
            / window_hours;

        let hourly_commitment = steady_spend * self.config.savings_plan_commitment_ratio;
        let monthly_savings =
            hourly_commitment * self.config.savings_plan_savings_ratio * HOURS_PER_MONTH;
        if hourly_commitment <= 0.0 || monthly_savings <= 0.0 {
            return None;
        }

        Some(SavingsPlanRecommendation {
            source: SavingsPlanSource::UsageEstimate,
            hourly_commitment,
            monthly_commitment: hourly_commitment * HOURS_PER_MONTH,
            estimated_utilization: ESTIMATED_PLAN_UTILIZATION,
            term: CommitmentTerm::OneYear,
            payment_option: PaymentOption::PartialUpfront,
            monthly_savings,
            confidence: Confidence::Medium,
        })
    }
}

/// Population standard deviation over mean; 0 for fewer than two values.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return f64::INFINITY;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() / mean
}
