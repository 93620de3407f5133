//! Final document assembly.
//!
//! Sections are emitted in a fixed order: timestamp comment, title,
//! overview, project tree, table of contents, import graph, files and the
//! run summary. `#` is the title, `##` top-level sections, `###` per-file
//! headers and `####` per-file blocks.

use crate::aggregate::{ImportEdge, ProjectMetrics, RankedFile};
use crate::analyze::FileRecord;
use crate::config::{Config, MdPolicy};
use crate::error::FileIssue;
use crate::tree::{build_tree, render_tree};
use chrono::{DateTime, Local};
use log;
use std::collections::BTreeSet;

pub mod markdown;

pub use markdown::{assign_anchors, demote_headings, fenced_block, inline_code, slugify};

pub const TRUNCATION_TAG: &str = "[TRUNCATED due to max-bytes-per-file]";

/// Run-level inputs that do not come from the configuration.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub title: String,
    /// Display name of the project root; used instead of the absolute path
    /// so the document does not depend on where the project is checked out.
    pub root_label: String,
    pub generated_at: Option<DateTime<Local>>,
}

pub fn truncation_marker(included: u64, size: u64) -> String {
    format!(
        "> **{}** included {} of {} bytes",
        TRUNCATION_TAG, included, size
    )
}

pub fn binary_placeholder(size: u64) -> String {
    format!("_Binary file omitted ({} bytes)._", size)
}

pub const SKIPPED_PLACEHOLDER: &str = "_Content skipped (md-policy: skip)._";

struct Doc {
    out: String,
}

impl Doc {
    fn line(&mut self, text: impl AsRef<str>) {
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    /// Appends pre-rendered text that already ends with a newline.
    fn block(&mut self, text: &str) {
        self.out.push_str(text);
        if !text.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn heading(&mut self, level: usize, text: impl AsRef<str>) {
        self.line(format!("{} {}", "#".repeat(level), text.as_ref()));
        self.blank();
    }
}

pub fn assemble(
    records: &[FileRecord],
    metrics: &ProjectMetrics,
    issues: &[FileIssue],
    config: &Config,
    ctx: &ReportContext,
) -> String {
    let mut doc = Doc {
        out: String::with_capacity(
            records
                .iter()
                .map(|r| r.included_bytes as usize + 256)
                .sum::<usize>()
                + 4096,
        ),
    };
    let anchors = assign_anchors(records.iter().map(|r| r.path.as_str()));

    if let Some(at) = &ctx.generated_at {
        doc.line(format!(
            "<!-- GENERATED at {} -->",
            at.format("%Y-%m-%d %H:%M:%S %:z")
        ));
    }
    doc.heading(1, &ctx.title);

    if config.report.show_metrics {
        write_overview(&mut doc, metrics, ctx);
    }
    write_tree(&mut doc, records, ctx);
    write_toc(&mut doc, records, &anchors);
    if let Some(edges) = &metrics.import_edges {
        write_import_graph(&mut doc, edges);
    }

    doc.line("---");
    doc.blank();
    doc.heading(2, "Files");
    for (index, (record, anchor)) in records.iter().zip(&anchors).enumerate() {
        write_file_section(&mut doc, index + 1, record, anchor, config);
    }

    if !issues.is_empty() {
        write_run_summary(&mut doc, issues);
    }

    log::debug!(
        "Assembled document: {} bytes, {} file sections",
        doc.out.len(),
        records.len()
    );
    doc.out
}

fn write_overview(doc: &mut Doc, metrics: &ProjectMetrics, ctx: &ReportContext) {
    let t = &metrics.totals;
    doc.heading(2, "Overview");
    doc.line(format!("- Root: {}", inline_code(&ctx.root_label)));
    doc.line(format!(
        "- Files: **{}** (text: {}, binary: {}, truncated: {})",
        t.file_count, t.text_file_count, t.binary_file_count, t.truncated_file_count
    ));
    doc.line(format!("- Total size: **{} bytes**", t.total_bytes));
    doc.line(format!(
        "- Lines: {} | SLOC: {} | TODOs: {}",
        t.total_lines, t.total_significant_lines, t.total_todos
    ));
    doc.blank();

    if !metrics.languages.is_empty() {
        doc.heading(3, "Language mix");
        for stat in &metrics.languages {
            doc.line(format!(
                "- {}: {} {} ({} bytes)",
                stat.language,
                stat.file_count,
                plural(stat.file_count, "file", "files"),
                stat.bytes
            ));
        }
        doc.blank();
    }

    if !metrics.manifests.is_empty() {
        doc.heading(3, "Detected dependencies (best-effort)");
        for (manifest, names) in &metrics.manifests {
            doc.line(format!(
                "- {} ({}): {}",
                inline_code(manifest),
                names.len(),
                join_or_none(names)
            ));
        }
        doc.line(format!(
            "- **All** ({}): {}",
            metrics.dependencies.len(),
            join_or_none(&metrics.dependencies)
        ));
        doc.blank();
    }

    write_ranking(doc, "largest files (bytes)", &metrics.largest_files, "bytes");
    write_ranking(doc, "longest files (lines)", &metrics.longest_files, "lines");
}

fn write_ranking(doc: &mut Doc, label: &str, ranked: &[RankedFile], unit: &str) {
    if ranked.is_empty() {
        return;
    }
    doc.heading(3, format!("Top {} {}", ranked.len(), label));
    for entry in ranked {
        doc.line(format!("- {}: {} {}", inline_code(&entry.path), entry.value, unit));
    }
    doc.blank();
}

fn write_tree(doc: &mut Doc, records: &[FileRecord], ctx: &ReportContext) {
    let roots = build_tree(records.iter().map(|r| r.path.as_str()));
    doc.heading(2, "Project tree");
    doc.block(&fenced_block(&render_tree(&ctx.root_label, &roots), "text"));
    doc.blank();
}

fn write_toc(doc: &mut Doc, records: &[FileRecord], anchors: &[String]) {
    doc.heading(2, "Table of contents");
    if records.is_empty() {
        doc.line("_No files matched the current filters._");
    }
    for (index, (record, anchor)) in records.iter().zip(anchors).enumerate() {
        doc.line(format!(
            "{}. [{}](#{})",
            index + 1,
            inline_code(&record.path),
            anchor
        ));
    }
    doc.blank();
}

/// Mermaid node ids are `m0`, `m1`, ... over the sorted module names.
fn write_import_graph(doc: &mut Doc, edges: &[ImportEdge]) {
    doc.heading(2, "Import graph (Python, naive)");
    if edges.is_empty() {
        doc.line("_No imports between project modules were detected._");
        doc.blank();
        return;
    }
    let modules: Vec<&str> = edges
        .iter()
        .flat_map(|e| [e.from.as_str(), e.to.as_str()])
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let id_of = |name: &str| {
        modules
            .binary_search(&name)
            .map(|i| format!("m{}", i))
            .unwrap_or_default()
    };

    let mut graph = String::from("graph LR\n");
    for (i, module) in modules.iter().enumerate() {
        graph.push_str(&format!("  m{}[\"{}\"]\n", i, module));
    }
    for edge in edges {
        graph.push_str(&format!("  {} --> {}\n", id_of(&edge.from), id_of(&edge.to)));
    }
    doc.block(&fenced_block(&graph, "mermaid"));
    doc.blank();
}

fn write_file_section(
    doc: &mut Doc,
    number: usize,
    record: &FileRecord,
    anchor: &str,
    config: &Config,
) {
    doc.line(format!("<a id=\"{}\"></a>", anchor));
    doc.heading(3, format!("{}. {}", number, inline_code(&record.path)));

    if config.report.show_metrics {
        doc.line(format!("- {}", metric_line(record)));
    } else {
        doc.line(format!("- Size: {} bytes", record.size_bytes));
    }
    doc.blank();

    if let Some(brief) = record.brief.as_deref() {
        doc.heading(4, "Brief");
        doc.block(&quote_lines(brief));
        doc.blank();
    }

    if config.report.show_summaries {
        if let Some(summary) = record.summary.as_deref().filter(|s| !s.is_empty()) {
            doc.heading(4, "Summary");
            doc.line(summary);
            doc.blank();
        }
    }

    let content = match (&record.content, record.is_binary) {
        (Some(content), false) => content.as_str(),
        _ => {
            doc.heading(4, "Content");
            doc.line(binary_placeholder(record.size_bytes));
            doc.blank();
            return;
        }
    };

    if record.is_markdown {
        match config.content.md_policy {
            MdPolicy::Skip => {
                doc.heading(4, "Content");
                doc.line(SKIPPED_PLACEHOLDER);
                doc.blank();
                return;
            }
            MdPolicy::Fence => {
                doc.heading(4, "Content (verbatim)");
                doc.block(&fenced_block(content, "markdown"));
            }
            MdPolicy::Render => {
                doc.heading(4, "Content (rendered, headings demoted)");
                let rendered =
                    demote_headings(content, config.content.render_heading_offset);
                doc.block(rendered.trim_end_matches('\n'));
            }
        }
    } else {
        doc.heading(4, "Content");
        doc.block(&fenced_block(content, &record.fence));
    }

    if record.truncated {
        doc.blank();
        doc.line(truncation_marker(record.included_bytes, record.size_bytes));
    }
    doc.blank();
}

/// Renders quoted file text as a blockquote whose lines cannot open
/// headings, fences or nested quotes in the surrounding document.
fn quote_lines(text: &str) -> String {
    let mut out = String::new();
    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            out.push_str(">\n");
            continue;
        }
        out.push_str("> ");
        if trimmed.starts_with(['#', '=', '-', '>', '`', '~', '+', '*', '<']) {
            out.push('\\');
        }
        out.push_str(trimmed);
        out.push('\n');
    }
    out
}

fn metric_line(record: &FileRecord) -> String {
    let mut parts = vec![format!("Size: {} bytes", record.size_bytes)];
    if !record.is_binary {
        parts.push(format!("Lines: {}", record.line_count));
        parts.push(format!("SLOC: {}", record.significant_line_count));
        parts.push(format!("TODOs: {}", record.todo_count));
    }
    parts.push(format!("Language: {}", record.language));
    if let Some(modified) = record.modified {
        parts.push(format!("Modified: {}", modified.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    parts.push(format!("Digest: {}", record.short_digest()));
    if let Some(s) = &record.structural {
        parts.push(format!(
            "Functions: {} | Classes: {} | Complexity≈{}",
            s.function_count, s.class_count, s.complexity_estimate
        ));
    }
    parts.join(" | ")
}

fn write_run_summary(doc: &mut Doc, issues: &[FileIssue]) {
    doc.heading(2, "Run summary");
    doc.line(format!(
        "{} {} recorded during this run:",
        issues.len(),
        plural(issues.len(), "issue", "issues")
    ));
    doc.blank();
    for issue in issues {
        doc.line(format!(
            "- {} ({}): {}",
            inline_code(&issue.path),
            issue.kind,
            issue.message
        ));
    }
    doc.blank();
}

fn plural<'a>(n: usize, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 { one } else { many }
}

fn join_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Totals, compute_totals};
    use crate::analyze::StructuralMetrics;
    use crate::error::IssueKind;

    fn text_record(path: &str, content: &str, fence: &str) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            size_bytes: content.len() as u64,
            line_count: content.lines().count(),
            significant_line_count: content.lines().count(),
            todo_count: 0,
            modified: None,
            digest: "ab".repeat(32),
            language: fence.to_string(),
            fence: fence.to_string(),
            is_binary: false,
            is_markdown: fence == "markdown",
            structural: None,
            truncated: false,
            included_bytes: content.len() as u64,
            summary: None,
            brief: None,
            content: Some(content.to_string()),
        }
    }

    fn ctx() -> ReportContext {
        ReportContext {
            title: "Project Export: demo".to_string(),
            root_label: "demo".to_string(),
            generated_at: None,
        }
    }

    fn metrics_for(records: &[FileRecord]) -> ProjectMetrics {
        ProjectMetrics {
            totals: compute_totals(records),
            ..ProjectMetrics::default()
        }
    }

    #[test]
    fn sections_appear_in_fixed_order() {
        let records = vec![text_record("src/main.py", "print('hi')\n", "python")];
        let mut metrics = metrics_for(&records);
        metrics.import_edges = Some(vec![]);
        let issues = vec![FileIssue::new("gone.txt", IssueKind::Access, "vanished")];
        let doc = assemble(&records, &metrics, &issues, &Config::default(), &ctx());

        let order = [
            "# Project Export: demo",
            "## Overview",
            "## Project tree",
            "## Table of contents",
            "## Import graph (Python, naive)",
            "## Files",
            "### 1. `src/main.py`",
            "## Run summary",
        ];
        let positions: Vec<usize> = order
            .iter()
            .map(|h| doc.find(&format!("{}\n", h)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", doc);
        assert!(doc.starts_with("# Project Export: demo\n"));
        assert!(doc.contains("- `gone.txt` (access_error): vanished"));
    }

    #[test]
    fn overview_is_optional_and_timestamp_is_line_one() {
        let records = vec![text_record("a.txt", "x\n", "text")];
        let mut config = Config::default();
        config.report.show_metrics = false;
        let mut context = ctx();
        context.generated_at = Some(Local::now());
        let doc = assemble(&records, &metrics_for(&records), &[], &config, &context);
        assert!(doc.lines().next().unwrap().starts_with("<!-- GENERATED at "));
        assert_eq!(doc.matches("GENERATED").count(), 1);
        assert!(!doc.contains("## Overview"));
        assert!(!doc.contains("## Run summary"));
        assert!(doc.contains("- Size: 2 bytes\n"));
    }

    #[test]
    fn markdown_policies_shape_the_content_block() {
        let records = vec![text_record("README.md", "# Title\nbody\n", "markdown")];
        let metrics = metrics_for(&records);
        let mut config = Config::default();

        let fenced = assemble(&records, &metrics, &[], &config, &ctx());
        assert!(fenced.contains("#### Content (verbatim)\n\n```markdown\n# Title\nbody\n```\n"));

        config.content.md_policy = MdPolicy::Render;
        let rendered = assemble(&records, &metrics, &[], &config, &ctx());
        assert!(rendered.contains("#### Content (rendered, headings demoted)\n\n#### Title\nbody\n"));

        config.content.md_policy = MdPolicy::Skip;
        let skipped = assemble(&records, &metrics, &[], &config, &ctx());
        assert!(skipped.contains(SKIPPED_PLACEHOLDER));
        assert!(!skipped.contains("body"));
        assert!(skipped.contains("[`README.md`](#README.md)"));
    }

    #[test]
    fn truncated_and_binary_blocks() {
        let mut cut = text_record("big.txt", "AAAA", "text");
        cut.size_bytes = 1000;
        cut.included_bytes = 4;
        cut.truncated = true;
        let mut bin = text_record("logo.png", "", "");
        bin.is_binary = true;
        bin.content = None;
        bin.size_bytes = 42;
        let records = vec![cut, bin];
        let doc = assemble(&records, &metrics_for(&records), &[], &Config::default(), &ctx());
        assert!(doc.contains(
            "```text\nAAAA\n```\n\n> **[TRUNCATED due to max-bytes-per-file]** included 4 of 1000 bytes\n"
        ));
        assert!(doc.contains("_Binary file omitted (42 bytes)._"));
        assert_eq!(doc.matches(TRUNCATION_TAG).count(), 1);
    }

    #[test]
    fn toc_links_match_emitted_anchors() {
        let records = vec![
            text_record("a/b.md", "x\n", "markdown"),
            text_record("a-b.md", "y\n", "markdown"),
        ];
        let doc = assemble(&records, &metrics_for(&records), &[], &Config::default(), &ctx());
        assert!(doc.contains("1. [`a/b.md`](#a-b.md)"));
        assert!(doc.contains("2. [`a-b.md`](#a-b.md-2)"));
        assert!(doc.contains("<a id=\"a-b.md\"></a>"));
        assert!(doc.contains("<a id=\"a-b.md-2\"></a>"));
    }

    #[test]
    fn import_graph_uses_stable_node_ids() {
        let mut metrics = ProjectMetrics {
            totals: Totals::default(),
            ..ProjectMetrics::default()
        };
        metrics.import_edges = Some(vec![
            ImportEdge {
                from: "app.main".to_string(),
                to: "app.util".to_string(),
            },
            ImportEdge {
                from: "app.util".to_string(),
                to: "app".to_string(),
            },
        ]);
        let doc = assemble(&[], &metrics, &[], &Config::default(), &ctx());
        assert!(doc.contains(
            "```mermaid\ngraph LR\n  m0[\"app\"]\n  m1[\"app.main\"]\n  m2[\"app.util\"]\n  m1 --> m2\n  m2 --> m0\n```\n"
        ));
    }

    #[test]
    fn metric_line_includes_structure() {
        let mut record = text_record("m.py", "def f():\n    pass\n", "python");
        record.structural = Some(StructuralMetrics {
            function_count: 1,
            class_count: 0,
            complexity_estimate: 1,
        });
        let line = metric_line(&record);
        assert!(line.starts_with("Size: 18 bytes | Lines: 2 | SLOC: 2 | TODOs: 0"));
        assert!(line.ends_with("Digest: abababababab | Functions: 1 | Classes: 0 | Complexity≈1"));
    }

    #[test]
    fn brief_precedes_summary_and_stays_inert() {
        let mut record = text_record("README.md", "# Demo\n\nText\n", "markdown");
        record.brief = Some("# Demo\n\nText".to_string());
        record.summary = Some("Demo".to_string());
        let records = vec![record];
        let doc = assemble(&records, &metrics_for(&records), &[], &Config::default(), &ctx());
        assert!(doc.contains("#### Brief\n\n> \\# Demo\n>\n> Text\n\n#### Summary\n\nDemo\n"));

        let mut config = Config::default();
        config.report.show_summaries = false;
        let quiet = assemble(&records, &metrics_for(&records), &[], &config, &ctx());
        assert!(quiet.contains("#### Brief\n"));
        assert!(!quiet.contains("#### Summary\n"));
    }
}
