use crate::cli_args::MetricsArgs;
use crate::load_config_for_command;
use crate::output::{print_data_or_text, print_issues, print_metrics_pretty_table};
use anyhow::{Context, Result};
use byte_unit::{Byte, UnitType};
use log;
use serde::Serialize;
use tiktoken_rs::cl100k_base;
use xmark_core::{self as core, Config, FileRecord, ProjectAnalysis};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
    pub total_files: usize,
    pub binary_files: usize,
    pub total_lines: usize,
    pub total_significant_lines: usize,
    pub total_todos: usize,
    pub total_bytes: u64,
    pub total_bytes_readable: String,
    /// cl100k token estimate over the text that would be embedded.
    pub estimated_tokens: usize,
    pub languages: Vec<LanguageMetrics>,
    pub dependencies: Vec<String>,
    pub files: Vec<FileMetrics>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageMetrics {
    pub language: String,
    pub file_count: usize,
    pub bytes: u64,
    pub bytes_readable: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetrics {
    pub path: String,
    pub language: String,
    pub lines: usize,
    pub significant_lines: usize,
    pub todos: usize,
    pub bytes: u64,
    pub bytes_readable: String,
    pub estimated_tokens: usize,
}

pub fn handle_metrics_command(args: MetricsArgs, quiet: bool) -> Result<()> {
    let project_root = Config::determine_project_root(args.project_config.project_root.as_ref())
        .context("Failed to determine project root")?;
    log::info!("Project root determined: {}", project_root.display());

    let config = load_config_for_command(
        &project_root,
        &args.project_config,
        None,
        Some(&args.filters),
    )
    .context("Failed to load configuration for metrics command")?;

    let analysis = core::analyze_project(&project_root, &config)
        .context("Failed to analyze project for metrics calculation")?;
    print_issues(&analysis.issues, quiet);

    if analysis.records.is_empty() && !quiet {
        println!("No files found to calculate metrics.");
        return Ok(());
    }

    log::debug!("Calculating metrics...");
    let metrics = build_metrics_report(&analysis)?;
    log::debug!("Metrics calculation complete.");

    if args.format_output.format.is_none() {
        print_metrics_pretty_table(&metrics)
    } else {
        print_data_or_text(
            &metrics,
            None,
            &args.format_output,
            "json",
            "ProjectMetrics",
        )
    }
}

fn readable(bytes: u64) -> String {
    Byte::from_u128(bytes as u128)
        .unwrap_or_default()
        .get_appropriate_unit(UnitType::Binary)
        .to_string()
}

fn file_metrics(record: &FileRecord, tokens: usize) -> FileMetrics {
    FileMetrics {
        path: record.path.clone(),
        language: record.language.clone(),
        lines: record.line_count,
        significant_lines: record.significant_line_count,
        todos: record.todo_count,
        bytes: record.size_bytes,
        bytes_readable: readable(record.size_bytes),
        estimated_tokens: tokens,
    }
}

fn build_metrics_report(analysis: &ProjectAnalysis) -> Result<MetricsReport> {
    let bpe = cl100k_base().map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;
    let totals = &analysis.metrics.totals;

    let files: Vec<FileMetrics> = analysis
        .records
        .iter()
        .map(|record| {
            let tokens = record
                .content
                .as_deref()
                .map(|text| bpe.encode_ordinary(text).len())
                .unwrap_or(0);
            file_metrics(record, tokens)
        })
        .collect();

    let languages = analysis
        .metrics
        .languages
        .iter()
        .map(|stat| LanguageMetrics {
            language: stat.language.clone(),
            file_count: stat.file_count,
            bytes: stat.bytes,
            bytes_readable: readable(stat.bytes),
        })
        .collect();

    Ok(MetricsReport {
        total_files: totals.file_count,
        binary_files: totals.binary_file_count,
        total_lines: totals.total_lines,
        total_significant_lines: totals.total_significant_lines,
        total_todos: totals.total_todos,
        total_bytes: totals.total_bytes,
        total_bytes_readable: readable(totals.total_bytes),
        estimated_tokens: files.iter().map(|f| f.estimated_tokens).sum(),
        languages,
        dependencies: analysis.metrics.dependencies.clone(),
        files,
    })
}
