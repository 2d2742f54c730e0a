use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Billing month used by every savings estimate (24 h × 30 days).
pub const HOURS_PER_MONTH: f64 = 24.0 * 30.0;

/// Static on-demand rates the analyzers price against.
///
/// The tables are plain data so a caller can swap in fresher figures without
/// touching any analysis code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingCatalog {
    instance_hourly: HashMap<String, f64>,   // compute instance type -> USD/h
    database_hourly: HashMap<String, f64>,   // database instance class -> USD/h
    volume_gb_month: HashMap<String, f64>,   // volume type -> USD per GB-month
    region_multipliers: HashMap<String, f64>,
    default_instance_hourly: f64,
    default_database_hourly: f64,
    default_volume_gb_month: f64,
    address_hourly: f64,
}

impl PricingCatalog {
    /// Create a catalog with the bundled us-east-1 rates
    pub fn new() -> Self {
        let instance_hourly = [
            // t2 family
            ("t2.nano", 0.0058),
            ("t2.micro", 0.0116),
            ("t2.small", 0.023),
            ("t2.medium", 0.0464),
            ("t2.large", 0.0928),
            ("t2.xlarge", 0.1856),
            ("t2.2xlarge", 0.3712),
            // t3 family
            ("t3.nano", 0.0052),
            ("t3.micro", 0.0104),
            ("t3.small", 0.0208),
            ("t3.medium", 0.0416),
            ("t3.large", 0.0832),
            ("t3.xlarge", 0.1664),
            ("t3.2xlarge", 0.3328),
            // m5 family
            ("m5.large", 0.096),
            ("m5.xlarge", 0.192),
            ("m5.2xlarge", 0.384),
            ("m5.4xlarge", 0.768),
            ("m5.8xlarge", 1.536),
            ("m5.12xlarge", 2.304),
            ("m5.16xlarge", 3.072),
            ("m5.24xlarge", 4.608),
            // c5 family
            ("c5.large", 0.085),
            ("c5.xlarge", 0.17),
            ("c5.2xlarge", 0.34),
            ("c5.4xlarge", 0.68),
            ("c5.9xlarge", 1.53),
            ("c5.12xlarge", 2.04),
            ("c5.18xlarge", 3.06),
            ("c5.24xlarge", 4.08),
            // r5 family
            ("r5.large", 0.126),
            ("r5.xlarge", 0.252),
            ("r5.2xlarge", 0.504),
            ("r5.4xlarge", 1.008),
            ("r5.8xlarge", 2.016),
            ("r5.12xlarge", 3.024),
            ("r5.16xlarge", 4.032),
            ("r5.24xlarge", 6.048),
        ];

        let database_hourly = [
            ("db.t2.micro", 0.017),
            ("db.t2.small", 0.034),
            ("db.t2.medium", 0.068),
            ("db.t3.micro", 0.016),
            ("db.t3.small", 0.032),
            ("db.t3.medium", 0.064),
            ("db.m5.large", 0.171),
            ("db.m5.xlarge", 0.342),
            ("db.r5.large", 0.226),
            ("db.r5.xlarge", 0.452),
        ];

        let volume_gb_month = [
            ("gp2", 0.10),
            ("gp3", 0.08),
            ("io1", 0.125),
            ("io2", 0.125),
            ("st1", 0.045),
            ("sc1", 0.025),
            ("standard", 0.05),
        ];

        let region_multipliers = [
            ("us-east-1", 1.0),
            ("us-east-2", 1.0),
            ("us-west-1", 1.1),
            ("us-west-2", 1.0),
            ("eu-west-1", 1.05),
            ("eu-central-1", 1.15),
            ("ap-northeast-1", 1.15),
            ("ap-southeast-1", 1.1),
            ("ap-southeast-2", 1.15),
            ("ap-south-1", 1.1),
        ];

        fn table(entries: &[(&str, f64)]) -> HashMap<String, f64> {
            entries
                .iter()
                .map(|(k, v)| ((*k).to_string(), *v))
                .collect()
        }

        Self {
            instance_hourly: table(&instance_hourly),
            database_hourly: table(&database_hourly),
            volume_gb_month: table(&volume_gb_month),
            region_multipliers: table(&region_multipliers),
            default_instance_hourly: 0.1,
            default_database_hourly: 0.15,
            default_volume_gb_month: 0.1,
            address_hourly: 0.005,
        }
    }

    /// Exact on-demand hourly rate for an instance type, if catalogued
    pub fn instance_hourly(&self, instance_type: &str) -> Option<f64> {
        self.instance_hourly.get(instance_type).copied()
    }

    /// Hourly rate adjusted for region, with a fallback for unknown types
    pub fn instance_hourly_in_region(&self, instance_type: &str, region: &str) -> f64 {
        self.instance_hourly(instance_type)
            .unwrap_or(self.default_instance_hourly)
            * self.region_multiplier(region)
    }

    pub fn database_hourly_in_region(&self, instance_class: &str, region: &str) -> f64 {
        self.database_hourly
            .get(instance_class)
            .copied()
            .unwrap_or(self.default_database_hourly)
            * self.region_multiplier(region)
    }

    pub fn region_multiplier(&self, region: &str) -> f64 {
        self.region_multipliers.get(region).copied().unwrap_or(1.0)
    }

    /// Monthly on-demand cost of running one instance all month
    pub fn instance_monthly(&self, instance_type: &str, region: &str) -> f64 {
        self.instance_hourly_in_region(instance_type, region) * HOURS_PER_MONTH
    }

    /// Monthly storage cost for a volume of the given size and type
    pub fn volume_monthly(&self, size_gb: u32, volume_type: &str, region: &str) -> f64 {
        let rate = self
            .volume_gb_month
            .get(volume_type)
            .copied()
            .unwrap_or(self.default_volume_gb_month);
        rate * self.region_multiplier(region) * f64::from(size_gb)
    }

    /// Monthly holding cost of an allocated but unassociated address
    pub fn address_monthly(&self) -> f64 {
        self.address_hourly * HOURS_PER_MONTH
    }

    pub fn set_instance_hourly(&mut self, instance_type: impl Into<String>, rate: f64) {
        self.instance_hourly.insert(instance_type.into(), rate);
    }

    pub fn set_region_multiplier(&mut self, region: impl Into<String>, multiplier: f64) {
        self.region_multipliers.insert(region.into(), multiplier);
    }

    pub fn set_volume_gb_month(&mut self, volume_type: impl Into<String>, rate: f64) {
        self.volume_gb_month.insert(volume_type.into(), rate);
    }
}

impl Default for PricingCatalog {
    fn default() -> Self {
        Self::new()
    }
}
