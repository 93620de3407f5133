use crate::cli_args::GenerateArgs;
use crate::load_config_for_command;
use crate::output::{print_issues, write_to_stdout};
use anyhow::{Context, Result};
use chrono::Local;
use colored::Colorize;
use log;
use std::env;
use std::path::{Component, Path, PathBuf};
use xmark_core::config::project_display_name;
use xmark_core::{self as core, Config};

pub fn handle_generate_command(args: GenerateArgs, quiet: bool) -> Result<()> {
    let project_root = Config::determine_project_root(args.project_config.project_root.as_ref())
        .context("Failed to determine project root")?;
    log::info!("Project root determined: {}", project_root.display());

    let mut config =
        load_config_for_command(&project_root, &args.project_config, Some(&args), None)
            .context("Failed to load configuration")?;

    let destination = if args.stdout {
        None
    } else {
        Some(resolve_output_path(args.output.as_deref(), &project_root)?)
    };
    if let Some(pattern) = destination
        .as_deref()
        .and_then(|dest| self_exclusion_pattern(dest, &project_root))
    {
        log::debug!("Excluding the report itself from the scan: {}", pattern);
        config.filters.ignore.push(pattern);
    }

    let output = core::generate(&project_root, &config)?;
    print_issues(&output.analysis.issues, quiet);

    match destination {
        None => write_to_stdout(&output.document)?,
        Some(dest) => {
            core::write_document(&dest, &output.document)?;
            if !quiet {
                println!(
                    "{} Report written to: {} ({} files)",
                    "✅".green(),
                    dest.display().to_string().blue(),
                    output.analysis.records.len()
                );
            }
        }
    }
    Ok(())
}

/// Explicit paths are taken relative to the working directory; otherwise a
/// timestamped name is derived from the project.
fn resolve_output_path(explicit: Option<&Path>, project_root: &Path) -> Result<PathBuf> {
    let cwd = env::current_dir().context("Failed to read current directory")?;
    let path = match explicit {
        Some(p) if p.is_absolute() => p.to_path_buf(),
        Some(p) => cwd.join(p),
        None => cwd.join(default_output_name(project_root)),
    };
    Ok(path)
}

fn default_output_name(project_root: &Path) -> String {
    format!(
        "{}_{}.md",
        project_display_name(project_root),
        Local::now().format("%Y%m%d_%H%M%S")
    )
}

/// A report written inside the root must not appear in a later run's scan.
/// Returns an escaped, root-anchored glob for the destination's path.
fn self_exclusion_pattern(destination: &Path, project_root: &Path) -> Option<String> {
    let file_name = destination.file_name()?;
    let parent = destination.parent()?;
    let parent = parent
        .canonicalize()
        .unwrap_or_else(|_| parent.to_path_buf());
    let relative = pathdiff::diff_paths(parent.join(file_name), project_root)?;
    if relative
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        return None;
    }
    let rel_str = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    Some(format!("/{}", globset::escape(&rel_str)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_name_uses_project_and_timestamp() {
        let name = default_output_name(Path::new("/work/demo"));
        assert!(name.starts_with("demo_"));
        assert!(name.ends_with(".md"));
        // demo_YYYYMMDD_HHMMSS.md
        assert_eq!(name.len(), "demo_".len() + 15 + ".md".len());
    }

    #[test]
    fn output_inside_root_is_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::create_dir_all(root.join("docs")).unwrap();
        let pattern = self_exclusion_pattern(&root.join("docs/export[1].md"), &root).unwrap();
        let anchored = pattern.strip_prefix('/').unwrap();
        let glob = globset::Glob::new(anchored).unwrap().compile_matcher();
        assert!(glob.is_match("docs/export[1].md"));
        assert!(!glob.is_match("docs/export1.md"));
    }

    #[test]
    fn output_outside_root_adds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().canonicalize().unwrap();
        let root = base.join("project");
        std::fs::create_dir_all(&root).unwrap();
        assert_eq!(self_exclusion_pattern(&base.join("report.md"), &root), None);
    }

    #[test]
    fn generated_report_is_skipped_on_rerun() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::write(root.join("a.txt"), "alpha\n").unwrap();
        let dest = root.join("export.md");

        let mut config = Config::default();
        config.report.include_timestamp = false;
        config
            .filters
            .ignore
            .push(self_exclusion_pattern(&dest, &root).unwrap());

        let first = core::generate(&root, &config).unwrap();
        core::write_document(&dest, &first.document).unwrap();
        let second = core::generate(&root, &config).unwrap();
        assert_eq!(first.document, second.document);
        assert_eq!(second.analysis.records.len(), 1);
    }

    #[test]
    fn same_named_files_deeper_in_the_tree_stay_visible() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::create_dir_all(root.join("docs")).unwrap();
        std::fs::write(root.join("docs/export.md"), "# Docs export\n").unwrap();
        std::fs::write(root.join("export.md"), "old report\n").unwrap();

        let mut config = Config::default();
        config.report.include_timestamp = false;
        config
            .filters
            .ignore
            .push(self_exclusion_pattern(&root.join("export.md"), &root).unwrap());

        let output = core::generate(&root, &config).unwrap();
        let paths: Vec<&str> = output.analysis.records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["docs/export.md"]);
    }
}
