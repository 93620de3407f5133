//! Naive text-level Python import graph.
//!
//! Import statements are found line by line with regexes. Dynamic imports,
//! imports inside strings and multi-line parenthesised name lists are not
//! understood; only the module part of such statements is used.

use once_cell::sync::Lazy;
use regex::Regex;
#[cfg(feature = "serde_support")]
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

static IMPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*import\s+(.+)$").expect("valid import regex"));
static FROM_IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*from\s+(\.*)([A-Za-z_][\w.]*)?\s+import\s+(.+)$")
        .expect("valid from-import regex")
});
static DOTTED_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_]\w*(?:\.[A-Za-z_]\w*)*$").expect("valid name regex"));

/// Directed edge between two project modules.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
pub struct ImportEdge {
    pub from: String,
    pub to: String,
}

/// A project source file taking part in the graph.
#[derive(Debug, Clone)]
pub struct ModuleSource<'a> {
    pub rel_path: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ModuleId {
    dotted: String,
    is_package: bool,
}

/// `src/pkg/mod.py` is `src.pkg.mod`; `pkg/__init__.py` is the package `pkg`.
fn module_id(rel_path: &str) -> ModuleId {
    let without_ext = match rel_path.rfind('.') {
        Some(dot) if !rel_path[dot..].contains('/') => &rel_path[..dot],
        _ => rel_path,
    };
    let mut parts: Vec<&str> = without_ext.split('/').filter(|p| !p.is_empty()).collect();
    let is_package = parts.len() > 1 && parts.last() == Some(&"__init__");
    if is_package {
        parts.pop();
    }
    ModuleId {
        dotted: parts.join("."),
        is_package,
    }
}

pub fn module_name(rel_path: &str) -> String {
    module_id(rel_path).dotted
}

/// Maps every dotted suffix of every module to one identity. Exact
/// identities beat suffix matches; otherwise the smallest identity wins.
struct ModuleIndex {
    by_key: HashMap<String, (u8, String)>,
}

impl ModuleIndex {
    fn build<'i>(identities: impl Iterator<Item = &'i str>) -> Self {
        let mut by_key: HashMap<String, (u8, String)> = HashMap::new();
        for identity in identities {
            let segments: Vec<&str> = identity.split('.').collect();
            for start in 0..segments.len() {
                let key = segments[start..].join(".");
                let rank = u8::from(start > 0);
                let entry = (rank, identity.to_string());
                by_key
                    .entry(key)
                    .and_modify(|current| {
                        if entry < *current {
                            *current = entry.clone();
                        }
                    })
                    .or_insert_with(|| entry.clone());
            }
        }
        Self { by_key }
    }

    /// Longest existing prefix of `candidate`.
    fn resolve(&self, candidate: &str) -> Option<&str> {
        let segments: Vec<&str> = candidate.split('.').filter(|s| !s.is_empty()).collect();
        (1..=segments.len()).rev().find_map(|len| {
            self.by_key
                .get(&segments[..len].join("."))
                .map(|(_, identity)| identity.as_str())
        })
    }
}

/// Candidate module names referenced by one file, before resolution.
pub fn referenced_modules(content: &str, own_package: &[&str]) -> Vec<String> {
    let mut candidates = Vec::new();
    for line in content.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('#') {
            continue;
        }
        if let Some(caps) = FROM_IMPORT_RE.captures(line) {
            let dots = caps.get(1).map_or(0, |m| m.as_str().len());
            let module = caps.get(2).map_or("", |m| m.as_str());
            let Some(base) = absolute_base(dots, module, own_package) else {
                continue;
            };
            for name in import_names(&caps[3]) {
                if name != "*" && DOTTED_NAME_RE.is_match(name) {
                    candidates.push(join_dotted(&base, name));
                }
            }
            if !base.is_empty() {
                candidates.push(base);
            }
        } else if let Some(caps) = IMPORT_RE.captures(line) {
            candidates.extend(
                import_names(&caps[1])
                    .filter(|name| DOTTED_NAME_RE.is_match(name))
                    .map(str::to_string),
            );
        }
    }
    candidates
}

fn import_names(list: &str) -> impl Iterator<Item = &str> {
    let list = list.split('#').next().unwrap_or(list);
    list.split(',').filter_map(|item| {
        let item = item.trim().trim_matches(|c| c == '(' || c == ')' || c == '\\').trim();
        let name = item.split_whitespace().next()?;
        Some(name)
    })
}

/// Resolves the module part of a `from` statement. Relative imports climb
/// from the importing file's package; climbing past the root is dropped.
fn absolute_base(dots: usize, module: &str, own_package: &[&str]) -> Option<String> {
    if dots == 0 {
        return Some(module.to_string());
    }
    let keep = own_package.len().checked_sub(dots - 1)?;
    let mut parts: Vec<&str> = own_package[..keep].to_vec();
    parts.extend(module.split('.').filter(|s| !s.is_empty()));
    Some(parts.join("."))
}

fn join_dotted(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

/// Builds the deduplicated, sorted edge list. Targets that are not project
/// modules and self edges are dropped.
pub fn build_import_graph(sources: &[ModuleSource<'_>]) -> Vec<ImportEdge> {
    let ids: Vec<ModuleId> = sources.iter().map(|s| module_id(s.rel_path)).collect();
    let index = ModuleIndex::build(ids.iter().map(|id| id.dotted.as_str()));

    let mut edges = BTreeSet::new();
    for (source, id) in sources.iter().zip(&ids) {
        let segments: Vec<&str> = id.dotted.split('.').collect();
        let package: &[&str] = if id.is_package {
            &segments
        } else {
            &segments[..segments.len().saturating_sub(1)]
        };
        for candidate in referenced_modules(source.content, package) {
            if let Some(target) = index.resolve(&candidate) {
                if target != id.dotted {
                    edges.insert(ImportEdge {
                        from: id.dotted.clone(),
                        to: target.to_string(),
                    });
                }
            }
        }
    }
    log::debug!("Import graph: {} modules, {} edges", ids.len(), edges.len());
    edges.into_iter().collect()
}
