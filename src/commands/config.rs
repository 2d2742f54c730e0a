use anyhow::{Context, Result};
use std::path::Path;

use crate::cli::ConfigAction;
use crate::config::Config;

pub fn handle_config_action(
    action: ConfigAction,
    config_path: Option<&Path>,
    json_output: bool,
) -> Result<()> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => Config::default_path()?,
    };

    match action {
        ConfigAction::Init => {
            Config::default()
                .save_to(&path)
                .context("Failed to initialize config")?;
            if json_output {
                println!(
                    "{}",
                    serde_json::json!({
                        "status": "success",
                        "message": "Configuration initialized successfully",
                        "path": path.display().to_string(),
                    })
                );
            } else {
                println!("Configuration initialized at: {}", path.display());
            }
        }
        ConfigAction::Show => {
            let config = if path.exists() {
                Config::load_from(&path)?
            } else {
                Config::default()
            };
            if json_output {
                let json = serde_json::to_string_pretty(&config)
                    .context("Failed to serialize config to JSON")?;
                println!("{}", json);
            } else {
                let toml_str =
                    toml::to_string_pretty(&config).context("Failed to serialize config")?;
                println!("Configuration ({})", path.display());
                println!("{}", toml_str);
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = if path.exists() {
                Config::load_from(&path)?
            } else {
                Config::default()
            };
            config
                .set_value(&key, &value)
                .with_context(|| format!("Failed to set {}", key))?;
            config.save_to(&path)?;
            if json_output {
                println!(
                    "{}",
                    serde_json::json!({
                        "status": "success",
                        "message": format!("Configuration updated: {} = {}", key, value),
                    })
                );
            } else {
                println!("Configuration updated: {} = {}", key, value);
            }
        }
    }

    Ok(())
}
