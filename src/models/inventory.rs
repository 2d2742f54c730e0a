use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
}

impl InstanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceState::Pending => "pending",
            InstanceState::Running => "running",
            InstanceState::Stopping => "stopping",
            InstanceState::Stopped => "stopped",
            InstanceState::ShuttingDown => "shutting-down",
            InstanceState::Terminated => "terminated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeInstance {
    pub id: String,
    pub instance_type: String,
    pub state: InstanceState,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    /// Volume ids attached to this instance.
    #[serde(default)]
    pub volume_ids: Vec<String>,
    /// Free-form reason for the last state change, e.g.
    /// `"User initiated (2024-01-02 10:00:00 GMT)"`.
    #[serde(default)]
    pub state_transition_reason: Option<String>,
}

impl ComputeInstance {
    pub fn name(&self) -> Option<&str> {
        self.tags.get("Name").map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VolumeState {
    Creating,
    Available,
    InUse,
    Deleting,
    Deleted,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageVolume {
    pub id: String,
    pub size_gb: u32,
    pub volume_type: String,
    pub state: VolumeState,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl StorageVolume {
    pub fn name(&self) -> Option<&str> {
        self.tags.get("Name").map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkAddress {
    pub allocation_id: String,
    pub public_ip: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub association_id: Option<String>,
}

impl NetworkAddress {
    pub fn is_associated(&self) -> bool {
        self.association_id.is_some()
    }
}

/// One hourly CPU utilization sample, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuDatapoint {
    pub timestamp: DateTime<Utc>,
    pub average: f64,
    pub maximum: f64,
}

/// Everything known about an account's resources at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub instances: Vec<ComputeInstance>,
    #[serde(default)]
    pub volumes: Vec<StorageVolume>,
    #[serde(default)]
    pub addresses: Vec<NetworkAddress>,
    /// CPU history keyed by instance id.
    #[serde(default)]
    pub cpu_history: HashMap<String, Vec<CpuDatapoint>>,
    /// Regions whose inventory was actually read.
    #[serde(default)]
    pub regions: Vec<String>,
}

impl Inventory {
    pub fn volume(&self, id: &str) -> Option<&StorageVolume> {
        self.volumes.iter().find(|v| v.id == id)
    }

    pub fn cpu(&self, instance_id: &str) -> &[CpuDatapoint] {
        self.cpu_history
            .get(instance_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn running_instances(&self) -> impl Iterator<Item = &ComputeInstance> {
        self.instances
            .iter()
            .filter(|i| i.state == InstanceState::Running)
    }

    /// Merge one region's snapshot into the account-wide view.
    pub fn extend(&mut self, other: Inventory) {
        self.instances.extend(other.instances);
        self.volumes.extend(other.volumes);
        self.addresses.extend(other.addresses);
        self.cpu_history.extend(other.cpu_history);
        for region in other.regions {
            if !self.regions.contains(&region) {
                self.regions.push(region);
            }
        }
    }
}

/// Average and maximum CPU over a set of samples; `None` when empty.
pub fn cpu_stats(datapoints: &[CpuDatapoint]) -> Option<(f64, f64)> {
    if datapoints.is_empty() {
        return None;
    }
    let avg = datapoints.iter().map(|dp| dp.average).sum::<f64>() / datapoints.len() as f64;
    let max = datapoints
        .iter()
        .map(|dp| dp.maximum)
        .fold(f64::MIN, f64::max);
    Some((avg, max))
}
