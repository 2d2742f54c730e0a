//! Per-profile warning collection.
//!
//! Every component that can skip a unit of work (a region, a resource, a
//! profile's cost feed) receives a `&mut Diagnostics` owned by the task doing
//! the work. Nothing here is global, so concurrently collected profiles never
//! contend on shared output state.

use serde::Serialize;
use tracing::warn;

/// What a warning is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarningScope {
    Profile { profile: String },
    Region { profile: String, region: String },
    Resource {
        profile: String,
        region: String,
        resource_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub scope: WarningScope,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn profile(&mut self, profile: &str, message: impl Into<String>) {
        let message = message.into();
        warn!(profile, "{}", message);
        self.warnings.push(Warning {
            scope: WarningScope::Profile {
                profile: profile.to_string(),
            },
            message,
        });
    }

    pub fn region(&mut self, profile: &str, region: &str, message: impl Into<String>) {
        let message = message.into();
        warn!(profile, region, "{}", message);
        self.warnings.push(Warning {
            scope: WarningScope::Region {
                profile: profile.to_string(),
                region: region.to_string(),
            },
            message,
        });
    }

    pub fn resource(
        &mut self,
        profile: &str,
        region: &str,
        resource_id: &str,
        message: impl Into<String>,
    ) {
        let message = message.into();
        warn!(profile, region, resource_id, "{}", message);
        self.warnings.push(Warning {
            scope: WarningScope::Resource {
                profile: profile.to_string(),
                region: region.to_string(),
                resource_id: resource_id.to_string(),
            },
            message,
        });
    }

    /// Append another log, keeping its order.
    pub fn absorb(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}
