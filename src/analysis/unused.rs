//! Waste scan: stopped, idle and orphaned resources.

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::LazyLock;
use tracing::debug;

use crate::config::RightSizingConfig;
use crate::models::{
    ComputeInstance, InstanceState, Inventory, PricingCatalog, UnusedResourceKind,
    UnusedResourceRecommendation, VolumeState, cpu_stats,
};

static STOPPED_AT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\((\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}) GMT\)").ok());

/// When the instance was stopped, from a reason like
/// `"User initiated (2024-01-02 10:00:00 GMT)"`.
pub fn parse_stopped_at(reason: &str) -> Option<DateTime<Utc>> {
    let captures = STOPPED_AT.as_ref()?.captures(reason)?;
    let stamp = captures.get(1)?.as_str();
    NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UnusedResourceReport {
    pub resources: Vec<UnusedResourceRecommendation>,
    pub total_monthly_cost: f64,
    pub total_annual_cost: f64,
}

pub struct UnusedResourceAnalyzer<'a> {
    config: &'a RightSizingConfig,
    pricing: &'a PricingCatalog,
    lookback_days: u32,
    as_of: DateTime<Utc>,
}

impl<'a> UnusedResourceAnalyzer<'a> {
    pub fn new(
        config: &'a RightSizingConfig,
        pricing: &'a PricingCatalog,
        lookback_days: u32,
        as_of: DateTime<Utc>,
    ) -> Self {
        Self {
            config,
            pricing,
            lookback_days,
            as_of,
        }
    }

    pub fn analyze(&self, inventory: &Inventory) -> UnusedResourceReport {
        let mut resources = Vec::new();

        for instance in &inventory.instances {
            let finding = match instance.state {
                InstanceState::Stopped => self.stopped_instance(instance, inventory),
                InstanceState::Running => self.idle_instance(instance, inventory),
                _ => None,
            };
            resources.extend(finding);
        }

        for volume in &inventory.volumes {
            if volume.state != VolumeState::Available {
                continue;
            }
            let monthly_cost =
                self.pricing
                    .volume_monthly(volume.size_gb, &volume.volume_type, &volume.region);
            resources.push(UnusedResourceRecommendation {
                resource_id: volume.id.clone(),
                resource_name: volume.name().map(str::to_string),
                kind: UnusedResourceKind::DetachedVolume,
                region: volume.region.clone(),
                reason: format!(
                    "Volume is not attached to any instance. Size: {} GB, Type: {}",
                    volume.size_gb, volume.volume_type
                ),
                recommendation: "Delete unused volume".to_string(),
                days_unused: None,
                monthly_cost,
            });
        }

        for address in &inventory.addresses {
            if address.is_associated() {
                continue;
            }
            resources.push(UnusedResourceRecommendation {
                resource_id: address.allocation_id.clone(),
                resource_name: Some(address.public_ip.clone()),
                kind: UnusedResourceKind::UnassociatedAddress,
                region: address.region.clone(),
                reason: "Address is not associated with any instance".to_string(),
                recommendation: "Release unused address".to_string(),
                days_unused: None,
                monthly_cost: self.pricing.address_monthly(),
            });
        }

        resources.sort_by(|a, b| {
            b.monthly_cost
                .partial_cmp(&a.monthly_cost)
                .unwrap_or(Ordering::Equal)
        });

        let total_monthly_cost: f64 = resources.iter().map(|r| r.monthly_cost).sum();
        UnusedResourceReport {
            resources,
            total_monthly_cost,
            total_annual_cost: total_monthly_cost * 12.0,
        }
    }

    fn stopped_instance(
        &self,
        instance: &ComputeInstance,
        inventory: &Inventory,
    ) -> Option<UnusedResourceRecommendation> {
        let storage_cost: f64 = instance
            .volume_ids
            .iter()
            .filter_map(|id| inventory.volume(id))
            .map(|v| self.pricing.volume_monthly(v.size_gb, &v.volume_type, &v.region))
            .sum();

        // Nothing is billed for a stopped instance without storage.
        if storage_cost <= 0.0 {
            debug!(instance = %instance.id, "Stopped instance has no billed storage");
            return None;
        }

        let days_stopped = instance
            .state_transition_reason
            .as_deref()
            .and_then(parse_stopped_at)
            .map(|stopped_at| (self.as_of - stopped_at).num_days().max(0))
            .unwrap_or_else(|| i64::from(self.lookback_days));

        Some(UnusedResourceRecommendation {
            resource_id: instance.id.clone(),
            resource_name: instance.name().map(str::to_string),
            kind: UnusedResourceKind::StoppedInstance,
            region: instance.region.clone(),
            reason: format!(
                "Instance has been stopped for {} days but its attached volumes are still billed",
                days_stopped
            ),
            recommendation: "Terminate stopped instance or delete its unused volumes".to_string(),
            days_unused: Some(days_stopped),
            monthly_cost: storage_cost,
        })
    }

    fn idle_instance(
        &self,
        instance: &ComputeInstance,
        inventory: &Inventory,
    ) -> Option<UnusedResourceRecommendation> {
        let (avg_cpu, _) = cpu_stats(inventory.cpu(&instance.id))?;
        if avg_cpu >= self.config.idle_cpu_threshold {
            return None;
        }

        Some(UnusedResourceRecommendation {
            resource_id: instance.id.clone(),
            resource_name: instance.name().map(str::to_string),
            kind: UnusedResourceKind::IdleInstance,
            region: instance.region.clone(),
            reason: format!(
                "Average CPU utilization of {:.1}% over the last {} days",
                avg_cpu, self.lookback_days
            ),
            recommendation: "Stop or terminate the idle instance".to_string(),
            days_unused: Some(i64::from(self.lookback_days)),
            monthly_cost: self
                .pricing
                .instance_monthly(&instance.instance_type, &instance.region),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CpuDatapoint, NetworkAddress, StorageVolume};
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
    }

    fn instance(id: &str, state: InstanceState, volumes: &[&str], reason: Option<&str>) -> ComputeInstance {
        ComputeInstance {
            id: id.to_string(),
            instance_type: "m5.large".to_string(),
            state,
            region: "us-east-1".to_string(),
            tags: HashMap::new(),
            volume_ids: volumes.iter().map(|v| v.to_string()).collect(),
            state_transition_reason: reason.map(str::to_string),
        }
    }

    fn volume(id: &str, size_gb: u32, state: VolumeState) -> StorageVolume {
        StorageVolume {
            id: id.to_string(),
            size_gb,
            volume_type: "gp2".to_string(),
            state,
            region: "us-east-1".to_string(),
            created_at: None,
            tags: HashMap::new(),
        }
    }

    fn analyze(inventory: &Inventory) -> UnusedResourceReport {
        let config = RightSizingConfig::default();
        let pricing = PricingCatalog::new();
        UnusedResourceAnalyzer::new(&config, &pricing, 14, as_of()).analyze(inventory)
    }

    #[test]
    fn test_parse_stopped_at() {
        let parsed = parse_stopped_at("User initiated (2024-01-02 10:00:00 GMT)").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap());
        assert!(parse_stopped_at("User initiated").is_none());
        assert!(parse_stopped_at("").is_none());
    }

    #[test]
    fn test_stopped_instance_costs_its_storage() {
        let inventory = Inventory {
            instances: vec![
                instance("i-dated", InstanceState::Stopped, &["vol-a"], Some("User initiated (2024-01-02 10:00:00 GMT)")),
                instance("i-undated", InstanceState::Stopped, &["vol-b"], None),
                instance("i-bare", InstanceState::Stopped, &[], None),
            ],
            volumes: vec![
                volume("vol-a", 100, VolumeState::InUse),
                volume("vol-b", 50, VolumeState::InUse),
            ],
            ..Default::default()
        };

        let report = analyze(&inventory);
        assert_eq!(report.resources.len(), 2);

        let dated = &report.resources[0];
        assert_eq!(dated.resource_id, "i-dated");
        assert_eq!(dated.kind, UnusedResourceKind::StoppedInstance);
        assert!((dated.monthly_cost - 10.0).abs() < 1e-9);
        assert_eq!(dated.days_unused, Some(29));

        let undated = &report.resources[1];
        assert_eq!(undated.days_unused, Some(14));
    }

    #[test]
    fn test_idle_instance_is_flagged() {
        let t = as_of();
        let mut inventory = Inventory {
            instances: vec![
                instance("i-idle", InstanceState::Running, &[], None),
                instance("i-busy", InstanceState::Running, &[], None),
                instance("i-blind", InstanceState::Running, &[], None),
            ],
            ..Default::default()
        };
        inventory.cpu_history.insert(
            "i-idle".to_string(),
            vec![CpuDatapoint { timestamp: t, average: 2.0, maximum: 9.0 }],
        );
        inventory.cpu_history.insert(
            "i-busy".to_string(),
            vec![CpuDatapoint { timestamp: t, average: 30.0, maximum: 60.0 }],
        );

        let report = analyze(&inventory);
        assert_eq!(report.resources.len(), 1);
        assert_eq!(report.resources[0].kind, UnusedResourceKind::IdleInstance);
        assert!((report.resources[0].monthly_cost - 0.096 * 720.0).abs() < 1e-9);
    }

    #[test]
    fn test_orphans_and_totals() {
        let inventory = Inventory {
            volumes: vec![
                volume("vol-free", 100, VolumeState::Available),
                volume("vol-used", 100, VolumeState::InUse),
            ],
            addresses: vec![
                NetworkAddress {
                    allocation_id: "eipalloc-1".to_string(),
                    public_ip: "203.0.113.10".to_string(),
                    region: "us-east-1".to_string(),
                    association_id: None,
                },
                NetworkAddress {
                    allocation_id: "eipalloc-2".to_string(),
                    public_ip: "203.0.113.11".to_string(),
                    region: "us-east-1".to_string(),
                    association_id: Some("eipassoc-1".to_string()),
                },
            ],
            ..Default::default()
        };

        let report = analyze(&inventory);
        assert_eq!(report.resources.len(), 2);
        assert_eq!(report.resources[0].kind, UnusedResourceKind::DetachedVolume);
        assert_eq!(report.resources[1].kind, UnusedResourceKind::UnassociatedAddress);
        assert!((report.total_monthly_cost - 13.6).abs() < 1e-9);
        assert!((report.total_annual_cost - 13.6 * 12.0).abs() < 1e-9);
    }
}
