// Command handlers module
pub mod analyze;
pub mod config;

pub use analyze::{ReportKind, RunOptions, handle_report_command};
pub use config::handle_config_action;
