use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::{Shell, generate};
use colored::*;
use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use xmark_core::AppError;

use crate::cli_args::{Cli, CompletionArgs};
use crate::output::confirm_overwrite;

pub fn handle_completion_command(args: &CompletionArgs, quiet: bool) -> Result<()> {
    let shell_str = args.shell.as_deref().unwrap_or("fish");
    let shell = parse_shell(shell_str)?;

    let mut command = Cli::command();
    let bin_name = command.get_name().to_string();

    if !args.save {
        generate(shell, &mut command, bin_name, &mut io::stdout());
        return Ok(());
    }

    let save_path = default_save_path(shell, &bin_name)?;
    if save_path.exists() && !confirm_overwrite(&save_path, "Completion file", quiet)? {
        println!("Save cancelled.");
        return Ok(());
    }
    if let Some(save_dir) = save_path.parent() {
        fs::create_dir_all(save_dir)
            .with_context(|| format!("Failed to create directory {}", save_dir.display()))?;
    }
    let mut file = File::create(&save_path)
        .with_context(|| format!("Failed to create file {}", save_path.display()))?;
    generate(shell, &mut command, bin_name, &mut file);

    if !quiet {
        println!(
            "{} {} completions saved to: {}",
            "✅".green(),
            shell_str.cyan(),
            save_path.display().to_string().blue()
        );
    }
    Ok(())
}

fn parse_shell(name: &str) -> Result<Shell> {
    match name.to_lowercase().as_str() {
        "fish" => Ok(Shell::Fish),
        "bash" => Ok(Shell::Bash),
        "zsh" => Ok(Shell::Zsh),
        _ => anyhow::bail!(AppError::InvalidArgument(format!(
            "Unsupported shell for completion: {}",
            name
        ))),
    }
}

fn completion_file_name(shell: Shell, bin_name: &str) -> Result<String> {
    match shell {
        Shell::Fish => Ok(format!("{}.fish", bin_name)),
        Shell::Bash => Ok(format!("{}.bash", bin_name)),
        Shell::Zsh => Ok(format!("_{}", bin_name)),
        other => anyhow::bail!(AppError::InvalidArgument(format!(
            "Default save location not known for shell: {}",
            other
        ))),
    }
}

fn default_save_path(shell: Shell, bin_name: &str) -> Result<PathBuf> {
    let dir = match shell {
        Shell::Fish => dirs::config_dir().map(|p| p.join("fish").join("completions")),
        Shell::Bash => dirs::config_dir().map(|p| p.join("bash_completion.d")),
        Shell::Zsh => dirs::data_local_dir().map(|p| p.join("zsh").join("site-functions")),
        _ => None,
    }
    .ok_or_else(|| anyhow::anyhow!("Could not determine standard completion directory."))?;
    Ok(dir.join(completion_file_name(shell, bin_name)?))
}
