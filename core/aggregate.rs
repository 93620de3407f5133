use crate::analyze::FileRecord;
use crate::config::Config;
use crate::error::{FileIssue, IssueKind};
use crate::languages::{ImportStyle, LanguageTable};
use indexmap::IndexMap;
use log;
#[cfg(feature = "serde_support")]
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeSet;

pub mod imports;
pub mod manifests;

pub use imports::{ImportEdge, ModuleSource, build_import_graph, module_name};
pub use manifests::ManifestKind;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
#[cfg_attr(feature = "serde_support", serde(rename_all = "camelCase"))]
pub struct Totals {
    pub file_count: usize,
    pub text_file_count: usize,
    pub binary_file_count: usize,
    pub truncated_file_count: usize,
    pub total_bytes: u64,
    /// Line, SLOC and TODO sums cover text files only.
    pub total_lines: usize,
    pub total_significant_lines: usize,
    pub total_todos: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
#[cfg_attr(feature = "serde_support", serde(rename_all = "camelCase"))]
pub struct LanguageStat {
    pub language: String,
    pub file_count: usize,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
pub struct RankedFile {
    pub path: String,
    pub value: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
#[cfg_attr(feature = "serde_support", serde(rename_all = "camelCase"))]
pub struct ProjectMetrics {
    pub totals: Totals,
    pub languages: Vec<LanguageStat>,
    pub largest_files: Vec<RankedFile>,
    pub longest_files: Vec<RankedFile>,
    /// Manifest path to its declared names, in traversal order.
    pub manifests: IndexMap<String, Vec<String>>,
    /// Union of all manifest names, sorted and deduplicated.
    pub dependencies: Vec<String>,
    /// `None` unless the import graph was requested.
    pub import_edges: Option<Vec<ImportEdge>>,
}

/// Folds the records into project-wide metrics. Manifest problems are
/// returned as issues, never as errors.
pub fn aggregate(
    records: &[FileRecord],
    config: &Config,
    table: &LanguageTable,
) -> (ProjectMetrics, Vec<FileIssue>) {
    let mut issues = Vec::new();
    let (manifests, dependencies) = sniff_dependencies(records, &mut issues);
    let import_edges = config.report.import_graph.then(|| {
        let sources: Vec<ModuleSource<'_>> = records
            .iter()
            .filter(|r| {
                table.get(&r.language).and_then(|l| l.imports) == Some(ImportStyle::Python)
            })
            .filter_map(|r| {
                r.content.as_deref().map(|content| ModuleSource {
                    rel_path: &r.path,
                    content,
                })
            })
            .collect();
        build_import_graph(&sources)
    });

    let metrics = ProjectMetrics {
        totals: compute_totals(records),
        languages: language_histogram(records),
        largest_files: top_n(records, config.report.top_n, |r| Some(r.size_bytes)),
        longest_files: top_n(records, config.report.top_n, |r| {
            (!r.is_binary).then_some(r.line_count as u64)
        }),
        manifests,
        dependencies,
        import_edges,
    };
    log::info!(
        "Aggregated {} files ({} bytes, {} languages, {} dependencies)",
        metrics.totals.file_count,
        metrics.totals.total_bytes,
        metrics.languages.len(),
        metrics.dependencies.len()
    );
    (metrics, issues)
}

pub fn compute_totals(records: &[FileRecord]) -> Totals {
    records.iter().fold(Totals::default(), |mut totals, r| {
        totals.file_count += 1;
        totals.total_bytes += r.size_bytes;
        if r.is_binary {
            totals.binary_file_count += 1;
        } else {
            totals.text_file_count += 1;
            totals.total_lines += r.line_count;
            totals.total_significant_lines += r.significant_line_count;
            totals.total_todos += r.todo_count;
        }
        if r.truncated {
            totals.truncated_file_count += 1;
        }
        totals
    })
}

/// Sorted by file count, then bytes (both descending), then name.
pub fn language_histogram(records: &[FileRecord]) -> Vec<LanguageStat> {
    let mut by_language: IndexMap<&str, LanguageStat> = IndexMap::new();
    for r in records {
        let stat = by_language
            .entry(r.language.as_str())
            .or_insert_with(|| LanguageStat {
                language: r.language.clone(),
                file_count: 0,
                bytes: 0,
            });
        stat.file_count += 1;
        stat.bytes += r.size_bytes;
    }
    let mut stats: Vec<LanguageStat> = by_language.into_values().collect();
    stats.sort_by(|a, b| {
        b.file_count
            .cmp(&a.file_count)
            .then(b.bytes.cmp(&a.bytes))
            .then_with(|| a.language.cmp(&b.language))
    });
    stats
}

/// Descending by key, ties broken by path. Records the key skips are left out.
pub fn top_n<F>(records: &[FileRecord], n: usize, key: F) -> Vec<RankedFile>
where
    F: Fn(&FileRecord) -> Option<u64>,
{
    let mut ranked: Vec<RankedFile> = records
        .iter()
        .filter_map(|r| {
            key(r).map(|value| RankedFile {
                path: r.path.clone(),
                value,
            })
        })
        .collect();
    ranked.sort_by(|a, b| {
        (Reverse(a.value), &a.path).cmp(&(Reverse(b.value), &b.path))
    });
    ranked.truncate(n);
    ranked
}

fn sniff_dependencies(
    records: &[FileRecord],
    issues: &mut Vec<FileIssue>,
) -> (IndexMap<String, Vec<String>>, Vec<String>) {
    let mut manifests = IndexMap::new();
    let mut all = BTreeSet::new();
    for r in records {
        let Some(kind) = ManifestKind::from_path(&r.path) else {
            continue;
        };
        let content = match (&r.content, r.truncated) {
            (Some(content), false) => content,
            (Some(_), true) => {
                log::warn!("Manifest {} was truncated; skipping dependency sniffing", r.path);
                issues.push(FileIssue::new(
                    &r.path,
                    IssueKind::ManifestParse,
                    "manifest truncated by max-bytes-per-file; no dependencies read",
                ));
                continue;
            }
            (None, _) => {
                issues.push(FileIssue::new(
                    &r.path,
                    IssueKind::ManifestParse,
                    "manifest is not text; no dependencies read",
                ));
                continue;
            }
        };
        match kind.parse(content) {
            Ok(names) => {
                log::debug!("{}: {} dependencies", r.path, names.len());
                all.extend(names.iter().cloned());
                manifests.insert(r.path.clone(), names);
            }
            Err(message) => {
                log::warn!("Could not parse manifest {}: {}", r.path, message);
                issues.push(FileIssue::new(&r.path, IssueKind::ManifestParse, message));
            }
        }
    }
    (manifests, all.into_iter().collect())
}
