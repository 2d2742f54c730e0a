// Configuration module
pub mod settings;

pub use settings::{AnalysisConfig, AnomalyConfig, CommitmentConfig, Config, RightSizingConfig};
