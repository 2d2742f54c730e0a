use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cloudspend")]
#[command(about = "Cloud cost anomaly detection and optimization advisor")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Profile to analyse (repeatable; default: every profile in the snapshot)
    #[arg(long = "profile", global = true)]
    pub profiles: Vec<String>,

    /// Analysis date (YYYY-MM-DD, default: today)
    #[arg(long, global = true)]
    pub as_of: Option<String>,

    /// Override anomaly sensitivity (0.01 - 0.5)
    #[arg(long, global = true)]
    pub sensitivity: Option<f64>,

    /// Override the right-sizing CPU threshold percent
    #[arg(long, global = true)]
    pub cpu_threshold: Option<f64>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON output format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Initialize fresh configuration
    Init,
    /// Set configuration value
    Set {
        /// Configuration key (e.g., anomaly.sensitivity)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Full report: overview, anomalies and recommendations
    Analyze {
        /// Billing snapshot (JSON)
        #[arg(long)]
        snapshot: PathBuf,
    },

    /// Cost anomalies only
    Anomalies {
        /// Billing snapshot (JSON)
        #[arg(long)]
        snapshot: PathBuf,
    },

    /// Right-sizing, unused resource and commitment recommendations
    Optimize {
        /// Billing snapshot (JSON)
        #[arg(long)]
        snapshot: PathBuf,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}
