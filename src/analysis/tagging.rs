//! Tag audit: resources that carry no tags at all.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{InstanceState, Inventory};

/// Untagged resource ids grouped by region, sorted within each region.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UntaggedResources {
    pub instances: BTreeMap<String, Vec<String>>,
    pub volumes: BTreeMap<String, Vec<String>>,
}

impl UntaggedResources {
    pub fn count(&self) -> usize {
        self.instances.values().chain(self.volumes.values()).map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

/// Instances (terminated ones excluded) and volumes with an empty tag set.
pub fn untagged_resources(inventory: &Inventory) -> UntaggedResources {
    let mut untagged = UntaggedResources::default();

    for instance in &inventory.instances {
        if instance.tags.is_empty() && instance.state != InstanceState::Terminated {
            untagged
                .instances
                .entry(instance.region.clone())
                .or_default()
                .push(instance.id.clone());
        }
    }
    for volume in &inventory.volumes {
        if volume.tags.is_empty() {
            untagged
                .volumes
                .entry(volume.region.clone())
                .or_default()
                .push(volume.id.clone());
        }
    }

    for ids in untagged.instances.values_mut().chain(untagged.volumes.values_mut()) {
        ids.sort();
    }
    untagged
}
