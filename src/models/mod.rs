// Models module
pub mod billing;
pub mod inventory;
pub mod pricing;
pub mod recommendation;

pub use billing::{AccountIdentity, Budget, CommitmentService, CostRecord, DateWindow, UsageQuantity};
pub use inventory::{
    ComputeInstance, CpuDatapoint, InstanceState, Inventory, NetworkAddress, StorageVolume,
    VolumeState, cpu_stats,
};
pub use pricing::{HOURS_PER_MONTH, PricingCatalog};
pub use recommendation::{
    CommitmentTerm, Confidence, PaymentOption, Recommendation, ReservedInstanceRecommendation,
    ResizeRecommendation, SavingsPlanRecommendation, SavingsPlanSource, Stability,
    UnusedResourceKind, UnusedResourceRecommendation,
};
