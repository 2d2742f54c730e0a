// cloudspend: cloud cost anomaly detection and optimization advisor
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cloudspend::cli::{Cli, Commands};
use cloudspend::commands::{ReportKind, RunOptions, handle_config_action, handle_report_command};

fn init_logging(verbose: bool) {
    let default_level = if verbose { "cloudspend=debug" } else { "cloudspend=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout carries the report, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = RunOptions {
        config_path: cli.config.clone(),
        profiles: cli.profiles.clone(),
        as_of: cli.as_of.clone(),
        sensitivity: cli.sensitivity,
        cpu_threshold: cli.cpu_threshold,
        json: cli.json,
    };

    match cli.command {
        Commands::Analyze { snapshot } => {
            handle_report_command(ReportKind::Full, &snapshot, &options).await?;
        }
        Commands::Anomalies { snapshot } => {
            handle_report_command(ReportKind::Anomalies, &snapshot, &options).await?;
        }
        Commands::Optimize { snapshot } => {
            handle_report_command(ReportKind::Optimization, &snapshot, &options).await?;
        }
        Commands::Config { action } => {
            handle_config_action(action, cli.config.as_deref(), cli.json)?;
        }
    }

    Ok(())
}
