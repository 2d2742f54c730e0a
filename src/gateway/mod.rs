//! Billing data sources.
//!
//! The engine never talks to a cloud provider directly. Everything it analyses
//! arrives through a [`BillingGateway`], one call per profile and data kind, so
//! each call can fail on its own without taking the rest of the run down.

pub mod collector;
pub mod snapshot;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{AccountIdentity, Budget, CostRecord, CpuDatapoint, DateWindow, Inventory, UsageQuantity};

pub use collector::{CollectionPlan, ProfileFetch, collect_profiles};
pub use snapshot::SnapshotGateway;

pub type GatewayResult<T> = Result<T, GatewayError>;

/// A single data request that could not be served.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    #[error("Unknown region '{region}' for profile {profile}")]
    UnknownRegion { profile: String, region: String },

    #[error("{operation} unavailable: {message}")]
    Unavailable { operation: String, message: String },
}

impl GatewayError {
    pub fn unavailable(operation: impl Into<String>, message: impl Into<String>) -> Self {
        GatewayError::Unavailable {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// One entry of a provider-computed savings plan purchase advisory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsPlanOffer {
    pub hourly_commitment: f64,
    pub estimated_monthly_savings: f64,
    /// Projected utilization of the commitment, in percent.
    pub estimated_utilization: f64,
}

#[async_trait]
pub trait BillingGateway: Send + Sync {
    /// Resolve the billing account a profile's credentials belong to.
    async fn resolve_account(&self, profile: &str) -> GatewayResult<AccountIdentity>;

    /// Regions the profile can enumerate resources in.
    async fn regions(&self, profile: &str) -> GatewayResult<Vec<String>>;

    /// Daily cost per service, restricted to `tag_filter` (`Key=Value`) when non-empty.
    async fn daily_costs(
        &self,
        profile: &str,
        window: DateWindow,
        tag_filter: &[String],
    ) -> GatewayResult<Vec<CostRecord>>;

    /// Instances, volumes and addresses of one region, without CPU history.
    async fn inventory(&self, profile: &str, region: &str) -> GatewayResult<Inventory>;

    async fn cpu_history(
        &self,
        profile: &str,
        region: &str,
        instance_id: &str,
        window: DateWindow,
    ) -> GatewayResult<Vec<CpuDatapoint>>;

    async fn usage_quantities(
        &self,
        profile: &str,
        window: DateWindow,
    ) -> GatewayResult<Vec<UsageQuantity>>;

    async fn budgets(&self, profile: &str) -> GatewayResult<Vec<Budget>>;

    /// Provider savings plan advisory; an empty list means the provider had nothing to offer.
    async fn savings_plan_advisory(&self, profile: &str) -> GatewayResult<Vec<SavingsPlanOffer>>;
}
