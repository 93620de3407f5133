use crate::cli_args::DebugArgs;
use crate::load_config_for_command;
use crate::output::print_data_or_text;
use anyhow::{Context, Result};
use colored::*;
use log;
use serde::Serialize;
use toml;
use xmark_core::pipeline::collect_candidates;
use xmark_core::{Config, FileIssue, LanguageTable, PathFilter};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DebugInfo<'a> {
    effective_config: &'a Config,
    files_to_include: Vec<IncludedFile>,
    traversal_issues: Vec<FileIssue>,
}

#[derive(Debug, Serialize)]
struct IncludedFile {
    path: String,
    language: String,
}

pub fn handle_debug_command(args: DebugArgs, _quiet: bool) -> Result<()> {
    let project_root = Config::determine_project_root(args.project_config.project_root.as_ref())
        .context("Failed to determine project root")?;
    log::info!("Project root determined: {}", project_root.display());

    let config = load_config_for_command(
        &project_root,
        &args.project_config,
        None,
        Some(&args.filters),
    )
    .context("Failed to load configuration for debug command")?;

    let table = LanguageTable::with_extras(&config.languages)?;
    let filter = PathFilter::new(&project_root, &config)?;
    log::debug!("Debug: Listing candidates...");
    let entries = collect_candidates(&filter, &config)?;

    let mut files_to_include = Vec::new();
    let mut traversal_issues = Vec::new();
    for entry in entries {
        match entry {
            Ok(candidate) => {
                let language = table.detect(&candidate.rel_path).name.clone();
                files_to_include.push(IncludedFile {
                    path: candidate.rel_path,
                    language,
                });
            }
            Err(issue) => traversal_issues.push(issue),
        }
    }

    let debug_data = DebugInfo {
        effective_config: &config,
        files_to_include,
        traversal_issues,
    };

    if args.format_output.format.is_none() {
        print_debug_info_pretty(&debug_data)
    } else {
        print_data_or_text(&debug_data, None, &args.format_output, "json", "DebugInfo")
    }
}

fn print_debug_info_pretty(debug_info: &DebugInfo) -> Result<()> {
    println!(
        "{}",
        "\n--- Effective Configuration ---"
            .green()
            .bold()
            .underline()
    );
    let config_toml = toml::to_string_pretty(debug_info.effective_config)
        .context("Failed to serialize effective config to TOML")?;
    println!("{}", config_toml);

    println!(
        "{}",
        format!(
            "\n--- Files Included ({}) ---",
            debug_info.files_to_include.len()
        )
        .green()
        .bold()
        .underline()
    );
    if debug_info.files_to_include.is_empty() {
        println!("{}", "(None)".dimmed());
    } else {
        for file in &debug_info.files_to_include {
            println!("- {} {}", file.path.cyan(), format!("[{}]", file.language).dimmed());
        }
    }

    if !debug_info.traversal_issues.is_empty() {
        println!("{}", "\n--- Traversal Issues ---".yellow().bold().underline());
        for issue in &debug_info.traversal_issues {
            println!(
                "- {} ({}): {}",
                issue.path.cyan(),
                issue.kind.to_string().yellow(),
                issue.message
            );
        }
    }

    println!("{}", "\n--- End Debug Info ---".green().bold());
    Ok(())
}
