//! A [`BillingGateway`] backed by a JSON document captured ahead of time.
//!
//! The `failures` block of a profile makes individual calls fail with the given
//! message, which is how partial outages are reproduced offline.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::debug;

use super::{BillingGateway, GatewayError, GatewayResult, SavingsPlanOffer};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AccountIdentity, Budget, ComputeInstance, CostRecord, CpuDatapoint, DateWindow, Inventory,
    NetworkAddress, StorageVolume, UsageQuantity,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub profiles: Vec<ProfileSnapshot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub name: String,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub regions: BTreeMap<String, RegionSnapshot>,
    #[serde(default)]
    pub costs: Vec<SnapshotCost>,
    #[serde(default)]
    pub usage: Vec<UsageQuantity>,
    #[serde(default)]
    pub budgets: Vec<Budget>,
    #[serde(default)]
    pub savings_plan_advisory: Option<Vec<SavingsPlanOffer>>,
    #[serde(default)]
    pub failures: FailureSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegionSnapshot {
    #[serde(default)]
    pub instances: Vec<ComputeInstance>,
    #[serde(default)]
    pub volumes: Vec<StorageVolume>,
    #[serde(default)]
    pub addresses: Vec<NetworkAddress>,
    /// Hourly CPU samples keyed by instance id.
    #[serde(default)]
    pub cpu: HashMap<String, Vec<CpuDatapoint>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotCost {
    pub date: NaiveDate,
    pub service: String,
    pub amount: f64,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl SnapshotCost {
    fn matches(&self, tag_filter: &[String]) -> bool {
        tag_filter.iter().all(|filter| match filter.split_once('=') {
            Some((key, value)) => self.tags.get(key).is_some_and(|v| v == value),
            None => false,
        })
    }
}

/// Calls that should fail for a profile, with the error message to return.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailureSpec {
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub regions: Option<String>,
    #[serde(default)]
    pub costs: Option<String>,
    #[serde(default)]
    pub usage: Option<String>,
    #[serde(default)]
    pub budgets: Option<String>,
    /// Region name -> message
    #[serde(default)]
    pub inventory: BTreeMap<String, String>,
    /// Instance id -> message
    #[serde(default)]
    pub cpu: BTreeMap<String, String>,
}

fn fail(failure: &Option<String>, operation: &str) -> GatewayResult<()> {
    match failure {
        Some(message) => Err(GatewayError::unavailable(operation, message.clone())),
        None => Ok(()),
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotGateway {
    snapshot: Snapshot,
}

impl SnapshotGateway {
    pub fn new(snapshot: Snapshot) -> EngineResult<Self> {
        let mut seen = HashSet::new();
        for profile in &snapshot.profiles {
            if profile.name.is_empty() {
                return Err(EngineError::Snapshot("profile with an empty name".to_string()));
            }
            if !seen.insert(profile.name.as_str()) {
                return Err(EngineError::Snapshot(format!(
                    "profile '{}' appears more than once",
                    profile.name
                )));
            }
            if let Some(cost) = profile.costs.iter().find(|c| c.amount < 0.0 || c.amount.is_nan()) {
                return Err(EngineError::Snapshot(format!(
                    "profile '{}' has an invalid cost for {} on {}",
                    profile.name, cost.service, cost.date
                )));
            }
        }
        Ok(Self { snapshot })
    }

    pub fn from_json(json: &str) -> EngineResult<Self> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        Self::new(snapshot)
    }

    pub fn from_path(path: &Path) -> EngineResult<Self> {
        let contents = fs::read_to_string(path)?;
        debug!(path = %path.display(), bytes = contents.len(), "Loaded snapshot");
        Self::from_json(&contents)
    }

    /// Profile names in document order.
    pub fn profile_names(&self) -> Vec<String> {
        self.snapshot.profiles.iter().map(|p| p.name.clone()).collect()
    }

    fn profile(&self, name: &str) -> GatewayResult<&ProfileSnapshot> {
        self.snapshot
            .profiles
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| GatewayError::UnknownProfile(name.to_string()))
    }
}

#[async_trait]
impl BillingGateway for SnapshotGateway {
    async fn resolve_account(&self, profile: &str) -> GatewayResult<AccountIdentity> {
        let snapshot = self.profile(profile)?;
        fail(&snapshot.failures.account, "account lookup")?;
        snapshot
            .account_id
            .as_ref()
            .map(AccountIdentity::new)
            .ok_or_else(|| GatewayError::unavailable("account lookup", "no account id recorded"))
    }

    async fn regions(&self, profile: &str) -> GatewayResult<Vec<String>> {
        let snapshot = self.profile(profile)?;
        fail(&snapshot.failures.regions, "region listing")?;
        Ok(snapshot.regions.keys().cloned().collect())
    }

    async fn daily_costs(
        &self,
        profile: &str,
        window: DateWindow,
        tag_filter: &[String],
    ) -> GatewayResult<Vec<CostRecord>> {
        let snapshot = self.profile(profile)?;
        fail(&snapshot.failures.costs, "cost data")?;
        Ok(snapshot
            .costs
            .iter()
            .filter(|c| window.contains(c.date) && c.matches(tag_filter))
            .map(|c| CostRecord::new(c.date, c.service.clone(), c.amount))
            .collect())
    }

    async fn inventory(&self, profile: &str, region: &str) -> GatewayResult<Inventory> {
        let snapshot = self.profile(profile)?;
        if let Some(message) = snapshot.failures.inventory.get(region) {
            return Err(GatewayError::unavailable("inventory", message.clone()));
        }
        let data = snapshot
            .regions
            .get(region)
            .ok_or_else(|| GatewayError::UnknownRegion {
                profile: profile.to_string(),
                region: region.to_string(),
            })?;

        let mut instances = data.instances.clone();
        for instance in &mut instances {
            if instance.region.is_empty() {
                instance.region = region.to_string();
            }
        }
        let mut volumes = data.volumes.clone();
        for volume in &mut volumes {
            if volume.region.is_empty() {
                volume.region = region.to_string();
            }
        }
        let mut addresses = data.addresses.clone();
        for address in &mut addresses {
            if address.region.is_empty() {
                address.region = region.to_string();
            }
        }

        Ok(Inventory {
            instances,
            volumes,
            addresses,
            cpu_history: HashMap::new(),
            regions: vec![region.to_string()],
        })
    }

    async fn cpu_history(
        &self,
        profile: &str,
        region: &str,
        instance_id: &str,
        window: DateWindow,
    ) -> GatewayResult<Vec<CpuDatapoint>> {
        let snapshot = self.profile(profile)?;
        if let Some(message) = snapshot.failures.cpu.get(instance_id) {
            return Err(GatewayError::unavailable("cpu metrics", message.clone()));
        }
        let points = snapshot
            .regions
            .get(region)
            .and_then(|r| r.cpu.get(instance_id))
            .map(|points| {
                points
                    .iter()
                    .filter(|p| window.contains(p.timestamp.date_naive()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(points)
    }

    async fn usage_quantities(
        &self,
        profile: &str,
        window: DateWindow,
    ) -> GatewayResult<Vec<UsageQuantity>> {
        let snapshot = self.profile(profile)?;
        fail(&snapshot.failures.usage, "usage data")?;
        Ok(snapshot
            .usage
            .iter()
            .filter(|u| window.contains(u.date))
            .cloned()
            .collect())
    }

    async fn budgets(&self, profile: &str) -> GatewayResult<Vec<Budget>> {
        let snapshot = self.profile(profile)?;
        fail(&snapshot.failures.budgets, "budgets")?;
        Ok(snapshot.budgets.clone())
    }

    async fn savings_plan_advisory(&self, profile: &str) -> GatewayResult<Vec<SavingsPlanOffer>> {
        let snapshot = self.profile(profile)?;
        snapshot
            .savings_plan_advisory
            .clone()
            .ok_or_else(|| GatewayError::unavailable("savings plan advisory", "not captured"))
    }
}
