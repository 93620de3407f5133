use anyhow::{Context, Result};
use colored::*;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table, presets::UTF8_FULL};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use xmark_core::{FileIssue, output_formats};

use crate::cli_args::FormatOutputOpts;
use crate::commands::metrics::MetricsReport;

/// Prints structured data in the requested format, falling back to the
/// plain-text rendering when no format was asked for.
pub fn print_data_or_text<T: Serialize>(
    data: &T,
    plain_text: Option<String>,
    format_opts: &FormatOutputOpts,
    default_format: &str,
    root_name: &str,
) -> Result<()> {
    let format = format_opts
        .format
        .as_deref()
        .unwrap_or(default_format)
        .to_lowercase();

    if format == "text" {
        match plain_text {
            Some(text) => write_to_stdout(&text),
            None => write_to_stdout(&output_formats::serialize_to_json(data, true)?),
        }
    } else {
        let content = serialize_output(data, &format, format_opts.disable_json_minify, root_name)?;
        write_to_stdout(&content)
    }
}

fn serialize_output<T: Serialize>(
    data: &T,
    format: &str,
    pretty_json: bool,
    xml_root: &str,
) -> Result<String> {
    match format {
        "yaml" | "yml" => output_formats::serialize_to_yaml(data).map_err(anyhow::Error::from),
        "xml" => output_formats::serialize_to_xml(data, xml_root).map_err(anyhow::Error::from),
        _ => output_formats::serialize_to_json(data, pretty_json).map_err(anyhow::Error::from),
    }
}

pub fn write_to_stdout(content: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(content.as_bytes())
        .context("Failed to write to stdout")?;
    if !content.ends_with('\n') {
        handle
            .write_all(b"\n")
            .context("Failed to write newline to stdout")?;
    }
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}

/// Asks before replacing an existing file. Quiet mode never overwrites.
pub fn confirm_overwrite(path: &Path, what: &str, quiet: bool) -> Result<bool> {
    if quiet {
        anyhow::bail!(
            "Target file '{}' exists. Overwrite prevented in quiet mode.",
            path.display()
        );
    }
    print!(
        "{} {} already exists at '{}'. Overwrite? [{}/{}] ",
        "⚠️".yellow(),
        what,
        path.display().to_string().cyan(),
        "y".green(),
        "N".red()
    );
    io::stdout().flush().context("Failed to flush stdout")?;
    let mut response = String::new();
    io::stdin()
        .read_line(&mut response)
        .context("Failed to read user input")?;
    Ok(response.trim().eq_ignore_ascii_case("y"))
}

/// Non-fatal problems go to stderr so `--stdout` output stays clean.
pub fn print_issues(issues: &[FileIssue], quiet: bool) {
    if quiet || issues.is_empty() {
        return;
    }
    eprintln!(
        "{} {} file(s) had issues:",
        "⚠️".yellow(),
        issues.len().to_string().yellow().bold()
    );
    for issue in issues {
        eprintln!(
            "  - {} ({}): {}",
            issue.path.cyan(),
            issue.kind.to_string().yellow(),
            issue.message
        );
    }
}

pub fn print_metrics_pretty_table(metrics: &MetricsReport) -> Result<()> {
    println!();
    println!("{}", " Project Metrics Summary ".green().bold().underline());
    println!(
        "{:<20} {}",
        "Total Files:".green(),
        metrics.total_files.to_string().cyan()
    );
    println!(
        "{:<20} {}",
        "Binary Files:".green(),
        metrics.binary_files.to_string().cyan()
    );
    println!(
        "{:<20} {}",
        "Total Lines:".green(),
        metrics.total_lines.to_string().cyan()
    );
    println!(
        "{:<20} {}",
        "Significant Lines:".green(),
        metrics.total_significant_lines.to_string().cyan()
    );
    println!(
        "{:<20} {}",
        "TODO Markers:".green(),
        metrics.total_todos.to_string().cyan()
    );
    println!(
        "{:<20} {}",
        "Total Size:".green(),
        metrics.total_bytes_readable.cyan()
    );
    println!(
        "{:<20} {}",
        "Est. Tokens:".green(),
        metrics.estimated_tokens.to_string().cyan()
    );

    if !metrics.languages.is_empty() {
        println!("\n{}", " Language Mix ".green().bold().underline());
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Language").fg(Color::Green),
            Cell::new("Files").fg(Color::Green),
            Cell::new("Size").fg(Color::Green),
        ]);
        for lang in &metrics.languages {
            table.add_row(vec![
                Cell::new(&lang.language).fg(Color::Cyan),
                Cell::new(lang.file_count).set_alignment(CellAlignment::Right),
                Cell::new(&lang.bytes_readable)
                    .set_alignment(CellAlignment::Right)
                    .fg(Color::DarkGrey),
            ]);
        }
        println!("{table}");
    }

    if metrics.files.is_empty() {
        println!("\n{}", "(No files included in metrics)".yellow());
    } else {
        println!("\n{}", " File Details ".green().bold().underline());
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Path").fg(Color::Green),
            Cell::new("Language").fg(Color::Green),
            Cell::new("Lines").fg(Color::Green),
            Cell::new("SLOC").fg(Color::Green),
            Cell::new("TODOs").fg(Color::Green),
            Cell::new("Size").fg(Color::Green),
            Cell::new("Tokens").fg(Color::Green),
        ]);
        for file in &metrics.files {
            table.add_row(vec![
                Cell::new(&file.path).fg(Color::Cyan),
                Cell::new(&file.language),
                Cell::new(file.lines).set_alignment(CellAlignment::Right),
                Cell::new(file.significant_lines).set_alignment(CellAlignment::Right),
                Cell::new(file.todos).set_alignment(CellAlignment::Right),
                Cell::new(&file.bytes_readable)
                    .set_alignment(CellAlignment::Right)
                    .fg(Color::DarkGrey),
                Cell::new(file.estimated_tokens).set_alignment(CellAlignment::Right),
            ]);
        }
        println!("{table}");
    }
    println!();
    Ok(())
}
