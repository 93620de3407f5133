use crate::config::Config;
use crate::error::{AppError, FileIssue, IssueKind, Result};
use crate::languages::{extension_of, normalize_extension};
use crate::output_formats::get_builtin_ignore_patterns;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use log;
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

const DIR_PROBE: &str = "dummy_file_for_dir_match";

/// A file that passed every filter, in traversal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub abs_path: PathBuf,
    /// Project-relative path joined with `/` on every platform.
    pub rel_path: String,
}

#[derive(Debug)]
pub struct PathFilter {
    root: PathBuf,
    ignore_set: GlobSet,
    /// Patterns written with a leading `/`: matched against the
    /// root-relative path only, never the bare name.
    anchored_set: GlobSet,
    gitignore: Option<Gitignore>,
    exclude_hidden: bool,
    only_extensions: HashSet<String>,
    follow_symlinks: bool,
}

impl PathFilter {
    pub fn new(project_root: &Path, config: &Config) -> Result<Self> {
        let root = project_root.canonicalize().map_err(|e| {
            AppError::Config(format!(
                "Failed to canonicalize root '{}': {}",
                project_root.display(),
                e
            ))
        })?;
        if !root.is_dir() {
            return Err(AppError::Config(format!(
                "Root is not a directory: {}",
                project_root.display()
            )));
        }

        let mut patterns: Vec<String> = Vec::new();
        if config.general.use_builtin_ignores {
            patterns.extend(get_builtin_ignore_patterns().patterns.iter().cloned());
        }
        patterns.extend(config.filters.ignore.iter().cloned());
        let (anchored, floating): (Vec<String>, Vec<String>) = patterns
            .iter()
            .map(|p| p.trim().to_string())
            .partition(|p| p.starts_with('/'));
        let anchored: Vec<String> = anchored
            .iter()
            .map(|p| p.trim_start_matches('/').to_string())
            .collect();
        let ignore_set = build_glob_set_from_vec(&floating)?;
        let anchored_set = build_glob_set_from_vec(&anchored)?;

        let gitignore = if config.general.respect_gitignore {
            let mut builder = GitignoreBuilder::new(&root);
            if let Some(err) = builder.add(root.join(".gitignore")) {
                log::debug!("No usable .gitignore at root: {}", err);
            }
            Some(builder.build()?)
        } else {
            None
        };

        let only_extensions: HashSet<String> = config
            .filters
            .only_extensions
            .iter()
            .map(|e| normalize_extension(e))
            .filter(|e| !e.is_empty())
            .collect();

        log::debug!(
            "PathFilter configured (patterns: {}, exclude_hidden: {}, only_ext: {:?}, gitignore: {}, follow_symlinks: {})",
            patterns.len(),
            config.filters.exclude_hidden,
            only_extensions,
            gitignore.is_some(),
            config.general.follow_symlinks
        );

        Ok(Self {
            root,
            ignore_set,
            anchored_set,
            gitignore,
            exclude_hidden: config.filters.exclude_hidden,
            only_extensions,
            follow_symlinks: config.general.follow_symlinks,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily walks the root depth-first with entries sorted by name, pruning
    /// excluded directories before they are descended.
    pub fn walk(&self) -> impl Iterator<Item = std::result::Result<Candidate, FileIssue>> + '_ {
        WalkDir::new(&self.root)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name()
            .min_depth(1)
            .into_iter()
            .filter_entry(move |entry| self.keep_entry(entry))
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => {
                    if entry.file_type().is_dir() {
                        return None;
                    }
                    let rel_path = self.relative(entry.path())?;
                    log::trace!("Candidate: {}", rel_path);
                    Some(Ok(Candidate {
                        abs_path: entry.path().to_path_buf(),
                        rel_path,
                    }))
                }
                Err(e) => {
                    if e.loop_ancestor().is_some() {
                        log::debug!("Skipping symlink loop: {}", e);
                        return None;
                    }
                    let rel = e
                        .path()
                        .and_then(|p| self.relative(p))
                        .unwrap_or_else(|| "<unknown>".to_string());
                    log::warn!("Error walking directory at {}: {}", rel, e);
                    Some(Err(FileIssue::new(rel, IssueKind::Access, e.to_string())))
                }
            })
    }

    fn relative(&self, path: &Path) -> Option<String> {
        let diff = pathdiff::diff_paths(path, &self.root)?;
        let parts: Vec<String> = diff
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }

    fn keep_entry(&self, entry: &DirEntry) -> bool {
        let Some(rel_path) = self.relative(entry.path()) else {
            log::warn!("Could not get relative path for: {}", entry.path().display());
            return false;
        };
        let name = entry.file_name().to_string_lossy();

        if entry.path_is_symlink() && !self.symlink_allowed(entry, &rel_path) {
            return false;
        }

        if entry.file_type().is_dir() {
            !self.is_dir_pruned(&rel_path, &name)
        } else {
            !self.is_file_excluded(&rel_path, &name)
        }
    }

    fn symlink_allowed(&self, entry: &DirEntry, rel_path: &str) -> bool {
        let target = match fs::canonicalize(entry.path()) {
            Ok(target) => target,
            Err(e) => {
                // Dangling links are passed on so the read failure is reported.
                log::debug!("Unresolvable symlink {}: {}", rel_path, e);
                return true;
            }
        };
        if !target.starts_with(&self.root) {
            log::debug!(
                "Skipping symlink leaving the project root: {} -> {}",
                rel_path,
                target.display()
            );
            return false;
        }
        if target.is_dir() && !self.follow_symlinks {
            log::trace!("Not following directory symlink: {}", rel_path);
            return false;
        }
        true
    }

    pub fn is_dir_pruned(&self, rel_path: &str, name: &str) -> bool {
        if self.exclude_hidden && is_hidden_name(name) {
            log::trace!("Pruning hidden directory: {}", rel_path);
            return true;
        }
        let probes = [
            rel_path.to_string(),
            format!("{}/{}", rel_path, DIR_PROBE),
            name.to_string(),
            format!("{}/{}", name, DIR_PROBE),
        ];
        if probes.iter().any(|p| self.ignore_set.is_match(p))
            || probes[..2].iter().any(|p| self.anchored_set.is_match(p))
        {
            log::trace!("Pruning ignored directory: {}", rel_path);
            return true;
        }
        if let Some(gi) = &self.gitignore {
            if gi.matched(Path::new(rel_path), true).is_ignore() {
                log::trace!("Pruning gitignored directory: {}", rel_path);
                return true;
            }
        }
        false
    }

    pub fn is_file_excluded(&self, rel_path: &str, name: &str) -> bool {
        if self.exclude_hidden && is_hidden_name(name) {
            log::trace!("Excluding hidden file: {}", rel_path);
            return true;
        }
        if self.ignore_set.is_match(rel_path)
            || self.ignore_set.is_match(name)
            || self.anchored_set.is_match(rel_path)
        {
            log::trace!("Excluding ignored file: {}", rel_path);
            return true;
        }
        if let Some(gi) = &self.gitignore {
            if gi.matched(Path::new(rel_path), false).is_ignore() {
                log::trace!("Excluding gitignored file: {}", rel_path);
                return true;
            }
        }
        if !self.only_extensions.is_empty() {
            let keep = extension_of(name).is_some_and(|ext| self.only_extensions.contains(&ext));
            if !keep {
                log::trace!("Excluding file outside extension whitelist: {}", rel_path);
                return true;
            }
        }
        false
    }
}

fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.') && name != "." && name != ".."
}

pub fn build_glob_set_from_vec(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern_str in patterns {
        let mut processed_pattern = pattern_str.trim().to_string();
        if processed_pattern.is_empty() {
            continue;
        }
        if processed_pattern.ends_with('/') && processed_pattern.len() > 1 {
            processed_pattern.push_str("**");
        }
        match Glob::new(&processed_pattern) {
            Ok(glob) => {
                log::trace!(
                    "Adding glob pattern: {} (processed as {})",
                    pattern_str,
                    processed_pattern
                );
                builder.add(glob);
            }
            Err(e) => {
                log::error!("Invalid glob pattern \"{}\": {}", pattern_str, e);
                return Err(AppError::Glob(format!(
                    "Invalid glob pattern \"{}\" (processed as \"{}\"): {}",
                    pattern_str, processed_pattern, e
                )));
            }
        }
    }
    builder.build().map_err(|e| {
        log::error!("Error building glob set: {}", e);
        AppError::Glob(e.to_string())
    })
}
