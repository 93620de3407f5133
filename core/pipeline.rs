use crate::aggregate::{self, ProjectMetrics};
use crate::analyze::{FileAnalyzer, FileRecord};
use crate::config::{Config, project_display_name};
use crate::error::{AppError, FileIssue, IssueKind, Result};
use crate::filter::{Candidate, PathFilter};
use crate::languages::LanguageTable;
use crate::report::{self, ReportContext};
use chrono::Local;
use log;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Records, metrics and issues of one run, before document assembly.
#[derive(Debug, Clone)]
pub struct ProjectAnalysis {
    pub root: PathBuf,
    pub records: Vec<FileRecord>,
    pub metrics: ProjectMetrics,
    /// Per-file problems in traversal order, then manifest problems.
    pub issues: Vec<FileIssue>,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub document: String,
    pub analysis: ProjectAnalysis,
}

/// Included paths in traversal order, honouring the cooperative limits.
/// Traversal problems keep their position among the candidates.
pub fn collect_candidates(
    filter: &PathFilter,
    config: &Config,
) -> Result<Vec<std::result::Result<Candidate, FileIssue>>> {
    let budget = config.time_budget()?;
    let max_files = config.limits.max_files;
    let started = Instant::now();

    let mut entries = Vec::new();
    let mut taken = 0usize;
    for entry in filter.walk() {
        if let Some(budget) = budget {
            if started.elapsed() > budget {
                log::warn!("Time budget of {:?} exhausted during traversal", budget);
                entries.push(Err(FileIssue::new(
                    ".",
                    IssueKind::Limit,
                    format!("time budget of {:?} reached; remaining files were not listed", budget),
                )));
                break;
            }
        }
        match entry {
            Ok(candidate) => {
                if max_files.is_some_and(|max| taken >= max) {
                    log::warn!("File limit reached at {}", candidate.rel_path);
                    entries.push(Err(FileIssue::new(
                        &candidate.rel_path,
                        IssueKind::Limit,
                        format!(
                            "max_files limit of {} reached; this and later files were not included",
                            taken
                        ),
                    )));
                    break;
                }
                taken += 1;
                entries.push(Ok(candidate));
            }
            Err(issue) => {
                log::warn!("{}", issue);
                entries.push(Err(issue));
            }
        }
    }
    log::debug!("Traversal produced {} included files", taken);
    Ok(entries)
}

/// Runs filtering, per-file analysis and aggregation. Only configuration
/// problems are errors; everything per-file ends up in `issues`.
pub fn analyze_project(project_root: &Path, config: &Config) -> Result<ProjectAnalysis> {
    config.validate()?;
    let table = LanguageTable::with_extras(&config.languages)?;
    let filter = PathFilter::new(project_root, config)?;
    let analyzer = FileAnalyzer::new(&table, config)?;

    log::info!("Scanning project: {}", filter.root().display());
    let entries = collect_candidates(&filter, config)?;

    let run = || -> Vec<std::result::Result<crate::analyze::Analysis, FileIssue>> {
        entries
            .par_iter()
            .map(|entry| match entry {
                Ok(candidate) => analyzer.analyze(candidate),
                Err(issue) => Err(issue.clone()),
            })
            .collect()
    };
    let outcomes = match config.general.threads {
        Some(threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build worker pool: {}", e)))?
            .install(run),
        None => run(),
    };

    let mut records = Vec::with_capacity(outcomes.len());
    let mut issues = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(analysis) => {
                if let Some(issue) = analysis.issue {
                    log::warn!("{}", issue);
                    issues.push(issue);
                }
                records.push(analysis.record);
            }
            // Traversal issues were already logged.
            Err(issue) => issues.push(issue),
        }
    }
    log::info!(
        "Analyzed {} files ({} issues)",
        records.len(),
        issues.len()
    );

    let (metrics, manifest_issues) = aggregate::aggregate(&records, config, &table);
    issues.extend(manifest_issues);

    Ok(ProjectAnalysis {
        root: filter.root().to_path_buf(),
        records,
        metrics,
        issues,
    })
}

/// Full run: analysis plus the assembled document, held in memory.
pub fn generate(project_root: &Path, config: &Config) -> Result<RunOutput> {
    let analysis = analyze_project(project_root, config)?;
    let ctx = ReportContext {
        title: config.effective_title(&analysis.root),
        root_label: project_display_name(&analysis.root),
        generated_at: config.report.include_timestamp.then(Local::now),
    };
    let document = report::assemble(
        &analysis.records,
        &analysis.metrics,
        &analysis.issues,
        config,
        &ctx,
    );
    Ok(RunOutput { document, analysis })
}

/// Writes the document next to its destination and renames it into place,
/// so a failed write never leaves a partial file behind.
pub fn write_document(destination: &Path, document: &str) -> Result<()> {
    let write_err = |source: std::io::Error| AppError::FileWrite {
        path: destination.to_path_buf(),
        source,
    };
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let file_name = destination
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| {
            AppError::InvalidArgument(format!(
                "Output path has no file name: {}",
                destination.display()
            ))
        })?;
    let temp = destination.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()));

    log::debug!("Writing {} bytes to {}", document.len(), temp.display());
    if let Err(e) = fs::write(&temp, document).and_then(|_| fs::rename(&temp, destination)) {
        let _ = fs::remove_file(&temp);
        return Err(write_err(e));
    }
    log::info!("Wrote report to {}", destination.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_document_replaces_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out/report.md");
        write_document(&dest, "first").unwrap();
        write_document(&dest, "second").unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "second");
        let leftovers: Vec<_> = fs::read_dir(dest.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn write_into_a_file_parent_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let err = write_document(&blocker.join("report.md"), "doc").unwrap_err();
        assert!(matches!(err, AppError::FileWrite { .. }));
    }

    #[test]
    fn max_files_records_a_single_limit_issue() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            fs::write(dir.path().join(name), "x\n").unwrap();
        }
        let mut config = Config::default();
        config.limits.max_files = Some(2);
        let analysis = analyze_project(dir.path(), &config).unwrap();
        assert_eq!(analysis.records.len(), 2);
        assert_eq!(analysis.issues.len(), 1);
        assert_eq!(analysis.issues[0].kind, IssueKind::Limit);
        assert_eq!(analysis.issues[0].path, "c.txt");
    }

    #[test]
    fn dedicated_pool_gives_same_records() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..20 {
            fs::write(dir.path().join(format!("f{:02}.txt", i)), format!("{}\n", i)).unwrap();
        }
        let mut config = Config::default();
        let global = analyze_project(dir.path(), &config).unwrap();
        config.general.threads = Some(3);
        let pooled = analyze_project(dir.path(), &config).unwrap();
        assert_eq!(global.records, pooled.records);
    }
}
