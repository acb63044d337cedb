//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use std::path::{Path, PathBuf};
use techradar_core::config::{RadarConfig, load_config, workspace_config_path};

/// Handle a CLI subcommand.
pub fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, workspace),
    }
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let (config_path, created) = init_config(workspace)?;
            if created {
                println!(
                    "Created default configuration at: {}",
                    config_path.display()
                );
            } else {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
            }
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_config(Some(workspace), None)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            println!("{}", render_config(&config)?);
            Ok(())
        }
    }
}

/// Write the default config into the workspace unless one already exists.
///
/// Returns the config path and whether a file was created.
fn init_config(workspace: &Path) -> anyhow::Result<(PathBuf, bool)> {
    let config_path = workspace_config_path(workspace);
    if config_path.exists() {
        return Ok((config_path, false));
    }
    if let Some(dir) = config_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&config_path, render_config(&RadarConfig::default())?)?;
    Ok((config_path, true))
}

fn render_config(config: &RadarConfig) -> anyhow::Result<String> {
    Ok(toml::to_string_pretty(config)?)
}
