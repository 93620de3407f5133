mod cli_args;
mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use log;
use std::path::Path;
use std::process;

use cli_args::{Cli, Commands, FilterGroup, GenerateArgs, ProjectConfigOpts};
use xmark_core::{AppError, Config, MdPolicy};

fn main() {
    let cli_args = Cli::parse();

    setup_logging(cli_args.quiet, cli_args.verbose);

    let quiet = cli_args.quiet;

    log::debug!("CLI args parsed: {:?}", cli_args);

    let exit_code = match run_app(cli_args, quiet) {
        Ok(_) => {
            log::info!("Application finished successfully.");
            0
        }
        Err(e) => {
            let exit_code = exit_code_for(&e);
            // Configuration and argument problems are always shown.
            if !quiet || exit_code == 1 || exit_code == 5 {
                eprintln!("{} {:#}", "Error:".red().bold(), e);
            } else {
                log::error!("Application failed: {:#}", e);
            }
            exit_code
        }
    };
    log::debug!("Exiting with code {}", exit_code);
    process::exit(exit_code);
}

fn exit_code_for(e: &anyhow::Error) -> i32 {
    match e.downcast_ref::<AppError>() {
        Some(AppError::Config(_)) => 1,
        Some(AppError::TomlParse(_)) => 1,
        Some(AppError::TomlSerialize(_)) => 1,
        Some(AppError::Glob(_)) => 1,
        Some(AppError::Regex(_)) => 1,
        Some(AppError::DataLoading(_)) => 1,
        Some(AppError::Io(_)) => 2,
        Some(AppError::FileRead { .. }) => 2,
        Some(AppError::FileWrite { .. }) => 2,
        Some(AppError::WalkDir(_)) => 2,
        Some(AppError::Ignore(_)) => 2,
        Some(AppError::InvalidArgument(_)) => 5,
        Some(AppError::DurationParse(_)) => 5,
        Some(AppError::JsonSerialize(_)) => 6,
        Some(AppError::YamlError(_)) => 6,
        Some(AppError::XmlSerialize(_)) => 6,
        Some(_) => 1,
        None => 1,
    }
}

fn setup_logging(quiet: bool, verbose: u8) {
    let log_level = if quiet {
        log::LevelFilter::Off
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();
    log::trace!("Logger initialized with level: {:?}", log_level);
}

fn run_app(cli: Cli, quiet: bool) -> Result<()> {
    match cli.command {
        None => {
            Cli::command().print_help()?;
        }
        Some(command) => match command {
            Commands::Completion(args) => {
                log::debug!("Executing 'completion' command...");
                commands::completion::handle_completion_command(&args, quiet)?;
            }
            Commands::Config(args) => {
                log::debug!("Executing 'config' command...");
                let project_root =
                    Config::determine_project_root(args.project_config.project_root.as_ref())
                        .context("Failed to determine project root for config command")?;
                commands::config::handle_config_command(&args, &project_root, quiet)?;
            }
            Commands::Generate(args) => {
                log::debug!("Executing 'generate' command...");
                commands::generate::handle_generate_command(args, quiet)?;
            }
            Commands::Metrics(args) => {
                log::debug!("Executing 'metrics' command...");
                commands::metrics::handle_metrics_command(args, quiet)?;
            }
            Commands::Debug(args) => {
                log::debug!("Executing 'debug' command...");
                commands::debug::handle_debug_command(args, quiet)?;
            }
        },
    }
    Ok(())
}

/// Filter flags shared by every command that walks the project.
/// CLI ignores are added to the configured ones; extensions replace them.
fn apply_filter_overrides(config: &mut Config, filters: &FilterGroup) {
    config.filters.ignore.extend(filters.ignore.iter().cloned());
    if !filters.only_ext.is_empty() {
        config.filters.only_extensions = filters.only_ext.clone();
    }
    if filters.exclude_hidden {
        config.filters.exclude_hidden = true;
    }
    if filters.builtin_ignores {
        config.general.use_builtin_ignores = true;
    }
    if filters.gitignore {
        config.general.respect_gitignore = true;
    }
    if filters.follow_symlinks {
        config.general.follow_symlinks = true;
    }
}

fn merge_config_with_cli_overrides(mut config: Config, args: &GenerateArgs) -> Result<Config> {
    log::trace!("Applying generate command CLI overrides to config...");
    apply_filter_overrides(&mut config, &args.filters);

    if let Some(max) = args.content.max_bytes_per_file {
        config.content.max_bytes_per_file = max;
    }
    if let Some(policy) = &args.content.md_policy {
        config.content.md_policy = policy.parse::<MdPolicy>()?;
    }
    if let Some(title) = &args.content.title {
        config.general.title = Some(title.clone());
    }

    if let Some(top_n) = args.report.top_n {
        config.report.top_n = top_n;
    }
    if args.report.mermaid_import_graph {
        config.report.import_graph = true;
    }
    if args.report.no_metrics {
        config.report.show_metrics = false;
    }
    if args.report.no_summaries {
        config.report.show_summaries = false;
    }
    if args.report.no_timestamp {
        config.report.include_timestamp = false;
    }

    if let Some(threads) = args.limits.threads {
        config.general.threads = Some(threads);
    }
    if let Some(max_files) = args.limits.max_files {
        config.limits.max_files = Some(max_files);
    }
    if let Some(budget) = &args.limits.time_budget {
        config.limits.time_budget = Some(budget.clone());
    }

    log::trace!("Config after CLI overrides: {:?}", config);
    Ok(config)
}

/// Loads the TOML config (if any) and layers the command's flags on top.
pub fn load_config_for_command(
    project_root: &Path,
    project_opts: &ProjectConfigOpts,
    generate_args: Option<&GenerateArgs>,
    filter_override: Option<&FilterGroup>,
) -> Result<Config> {
    let config_path = Config::resolve_config_path(
        project_root,
        project_opts.config_file.as_ref(),
        project_opts.no_config_file,
    )
    .context("Failed to resolve configuration path")?;

    let mut config = match &config_path {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(gen_args) = generate_args {
        config = merge_config_with_cli_overrides(config, gen_args)?;
    } else if let Some(filters) = filter_override {
        apply_filter_overrides(&mut config, filters);
    }

    config.validate()?;
    Ok(config)
}
