use crate::cli_args::ConfigArgs;
use crate::output::{confirm_overwrite, write_to_stdout};
use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::Path;
use xmark_core::Config;
use xmark_core::config::{DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILENAME};

pub fn handle_config_command(args: &ConfigArgs, project_root: &Path, quiet: bool) -> Result<()> {
    let content = default_config_toml()?;

    if !args.save {
        return write_to_stdout(&content);
    }

    let save_path = project_root
        .join(DEFAULT_CONFIG_DIR)
        .join(DEFAULT_CONFIG_FILENAME);
    if save_path.exists() && !confirm_overwrite(&save_path, "Config file", quiet)? {
        println!("Save cancelled.");
        return Ok(());
    }
    if let Some(dir) = save_path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }
    fs::write(&save_path, &content)
        .with_context(|| format!("Failed to write config file {}", save_path.display()))?;

    if !quiet {
        println!(
            "{} Default config saved to: {}",
            "✅".green(),
            save_path.display().to_string().blue()
        );
    }
    Ok(())
}

fn default_config_toml() -> Result<String> {
    toml::to_string_pretty(&Config::default()).context("Failed to serialize default config")
}
