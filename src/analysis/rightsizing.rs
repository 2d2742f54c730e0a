//! CPU-driven instance right-sizing.

use std::cmp::Ordering;
use tracing::debug;

use crate::config::RightSizingConfig;
use crate::models::{HOURS_PER_MONTH, Inventory, PricingCatalog, ResizeRecommendation, cpu_stats};

/// Size ladders, smallest first.
const FAMILY_LADDERS: &[(&str, &[&str])] = &[
    (
        "t2",
        &["t2.nano", "t2.micro", "t2.small", "t2.medium", "t2.large", "t2.xlarge", "t2.2xlarge"],
    ),
    (
        "t3",
        &["t3.nano", "t3.micro", "t3.small", "t3.medium", "t3.large", "t3.xlarge", "t3.2xlarge"],
    ),
    (
        "m5",
        &[
            "m5.large", "m5.xlarge", "m5.2xlarge", "m5.4xlarge", "m5.8xlarge", "m5.12xlarge",
            "m5.16xlarge", "m5.24xlarge",
        ],
    ),
    (
        "c5",
        &[
            "c5.large", "c5.xlarge", "c5.2xlarge", "c5.4xlarge", "c5.9xlarge", "c5.12xlarge",
            "c5.18xlarge", "c5.24xlarge",
        ],
    ),
    (
        "r5",
        &[
            "r5.large", "r5.xlarge", "r5.2xlarge", "r5.4xlarge", "r5.8xlarge", "r5.12xlarge",
            "r5.16xlarge", "r5.24xlarge",
        ],
    ),
];

/// The next size down in the same family, if there is one.
pub fn smaller_instance(instance_type: &str) -> Option<&'static str> {
    let (family, _) = instance_type.split_once('.')?;
    let ladder = FAMILY_LADDERS
        .iter()
        .find(|(name, _)| *name == family)
        .map(|(_, ladder)| *ladder)?;
    let position = ladder.iter().position(|t| *t == instance_type)?;
    position.checked_sub(1).map(|i| ladder[i])
}

pub struct RightSizingAnalyzer<'a> {
    config: &'a RightSizingConfig,
    pricing: &'a PricingCatalog,
}

impl<'a> RightSizingAnalyzer<'a> {
    pub fn new(config: &'a RightSizingConfig, pricing: &'a PricingCatalog) -> Self {
        Self { config, pricing }
    }

    /// One-step downsize candidates, highest savings first.
    pub fn analyze(&self, inventory: &Inventory) -> Vec<ResizeRecommendation> {
        let mut recommendations: Vec<ResizeRecommendation> = inventory
            .running_instances()
            .filter_map(|instance| {
                let smaller = smaller_instance(&instance.instance_type)?;
                let datapoints = inventory.cpu(&instance.id);
                let Some((avg_cpu, max_cpu)) = cpu_stats(datapoints) else {
                    debug!(instance = %instance.id, "No CPU datapoints, skipping");
                    return None;
                };

                if avg_cpu >= self.config.cpu_threshold || max_cpu >= self.config.max_cpu_guard {
                    return None;
                }

                let current_rate = self.pricing.instance_hourly(&instance.instance_type)?;
                let smaller_rate = self.pricing.instance_hourly(smaller)?;
                let monthly_savings = (current_rate - smaller_rate) * HOURS_PER_MONTH;
                if monthly_savings <= 0.0 {
                    return None;
                }

                Some(ResizeRecommendation {
                    resource_id: instance.id.clone(),
                    resource_name: instance.name().map(str::to_string),
                    region: instance.region.clone(),
                    current_type: instance.instance_type.clone(),
                    recommended_type: smaller.to_string(),
                    avg_cpu,
                    max_cpu,
                    datapoints: datapoints.len(),
                    reason: format!(
                        "Low CPU utilization (avg: {:.1}%, max: {:.1}%)",
                        avg_cpu, max_cpu
                    ),
                    monthly_savings,
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
}
