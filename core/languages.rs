//! Extension/filename to language mapping.
//!
//! The table is data: the built-in entries come from the embedded
//! `data/languages.yaml`, and `[[languages]]` entries from the config file are
//! layered on top. Later entries win for the same extension, filename or name.

use crate::error::{AppError, Result};
use crate::output_formats::load_embedded_text;
use log;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const UNKNOWN_LANGUAGE: &str = "unknown";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LanguageSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fence: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filenames: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub line_comments: Vec<String>,
    #[serde(default)]
    pub markdown: bool,
    /// Leading `"""` / `'''` string literals document the file.
    #[serde(default)]
    pub docstrings: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<StructureSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imports: Option<ImportStyle>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StructureSpec {
    pub functions: String,
    pub classes: String,
    #[serde(default)]
    pub branch_keywords: Vec<String>,
}

/// Textual import syntax understood by the import-graph builder.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImportStyle {
    Python,
}

#[derive(Debug, Deserialize)]
struct LanguageFile {
    languages: Vec<LanguageSpec>,
}

static BUILTIN_LANGUAGES: Lazy<Vec<LanguageSpec>> = Lazy::new(|| {
    let yaml_content =
        load_embedded_text("languages.yaml").expect("Embedded data/languages.yaml is missing");
    let parsed: LanguageFile =
        serde_yml::from_str(&yaml_content).expect("Failed to parse embedded data/languages.yaml");
    parsed.languages
});

pub fn builtin_language_specs() -> &'static [LanguageSpec] {
    &BUILTIN_LANGUAGES
}

/// Compiled structural heuristics. These are keyword and line-pattern counts,
/// not a parse.
#[derive(Debug, Clone)]
pub struct StructureRules {
    pub functions: Regex,
    pub classes: Regex,
    pub branches: Option<Regex>,
}

#[derive(Debug, Clone)]
pub struct Language {
    pub name: String,
    pub fence: String,
    pub line_comments: Vec<String>,
    pub markdown: bool,
    pub docstrings: bool,
    pub structure: Option<StructureRules>,
    pub imports: Option<ImportStyle>,
    recognized: bool,
}

impl Language {
    fn unknown() -> Self {
        Self {
            name: UNKNOWN_LANGUAGE.to_string(),
            fence: String::new(),
            line_comments: Vec::new(),
            markdown: false,
            docstrings: false,
            structure: None,
            imports: None,
            recognized: false,
        }
    }

    fn compile(spec: &LanguageSpec) -> Result<Self> {
        let structure = match &spec.structure {
            Some(s) => Some(StructureRules {
                functions: Regex::new(&s.functions).map_err(|e| {
                    AppError::Config(format!(
                        "Invalid function pattern for language '{}': {}",
                        spec.name, e
                    ))
                })?,
                classes: Regex::new(&s.classes).map_err(|e| {
                    AppError::Config(format!(
                        "Invalid class pattern for language '{}': {}",
                        spec.name, e
                    ))
                })?,
                branches: keyword_regex(&s.branch_keywords)?,
            }),
            None => None,
        };
        Ok(Self {
            name: spec.name.clone(),
            fence: spec.fence.clone().unwrap_or_else(|| spec.name.clone()),
            line_comments: spec
                .line_comments
                .iter()
                .filter(|p| !p.is_empty())
                .cloned()
                .collect(),
            markdown: spec.markdown,
            docstrings: spec.docstrings,
            structure,
            imports: spec.imports,
            recognized: true,
        })
    }

    pub fn is_recognized(&self) -> bool {
        self.recognized
    }

    pub fn is_comment_line(&self, trimmed: &str) -> bool {
        self.line_comments.iter().any(|p| trimmed.starts_with(p))
    }
}

fn keyword_regex(keywords: &[String]) -> Result<Option<Regex>> {
    let alternatives: Vec<String> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(regex::escape)
        .collect();
    if alternatives.is_empty() {
        return Ok(None);
    }
    let pattern = format!(r"\b(?:{})\b", alternatives.join("|"));
    Ok(Some(Regex::new(&pattern)?))
}

#[derive(Debug, Clone)]
pub struct LanguageTable {
    languages: Vec<Language>,
    by_extension: HashMap<String, usize>,
    by_filename: HashMap<String, usize>,
    unknown: Language,
}

impl LanguageTable {
    pub fn builtin() -> Result<Self> {
        Self::from_specs(builtin_language_specs())
    }

    /// Built-in table with `extras` layered on top.
    pub fn with_extras(extras: &[LanguageSpec]) -> Result<Self> {
        let specs: Vec<LanguageSpec> = builtin_language_specs()
            .iter()
            .chain(extras.iter())
            .cloned()
            .collect();
        Self::from_specs(&specs)
    }

    pub fn from_specs(specs: &[LanguageSpec]) -> Result<Self> {
        let mut table = Self {
            languages: Vec::new(),
            by_extension: HashMap::new(),
            by_filename: HashMap::new(),
            unknown: Language::unknown(),
        };
        for spec in specs {
            let compiled = Language::compile(spec)?;
            let index = match table.languages.iter().position(|l| l.name == spec.name) {
                Some(existing) => {
                    log::trace!("Overriding language table entry '{}'", spec.name);
                    table.languages[existing] = compiled;
                    existing
                }
                None => {
                    table.languages.push(compiled);
                    table.languages.len() - 1
                }
            };
            for ext in &spec.extensions {
                table
                    .by_extension
                    .insert(normalize_extension(ext), index);
            }
            for name in &spec.filenames {
                table.by_filename.insert(name.clone(), index);
            }
        }
        log::debug!(
            "Language table ready: {} languages, {} extensions, {} filenames",
            table.languages.len(),
            table.by_extension.len(),
            table.by_filename.len()
        );
        Ok(table)
    }

    /// Resolves a `/`-separated relative path. Exact filenames win over
    /// extensions.
    pub fn detect(&self, rel_path: &str) -> &Language {
        let file_name = rel_path.rsplit('/').next().unwrap_or(rel_path);
        if let Some(&index) = self.by_filename.get(file_name) {
            return &self.languages[index];
        }
        match extension_of(file_name) {
            Some(ext) => self
                .by_extension
                .get(&ext)
                .map(|&index| &self.languages[index])
                .unwrap_or(&self.unknown),
            None => &self.unknown,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Language> {
        self.languages.iter().find(|l| l.name == name)
    }
}

pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Lowercased extension of a file name. Dotfiles such as `.env` have none.
pub fn extension_of(file_name: &str) -> Option<String> {
    let dot = file_name.rfind('.')?;
    if dot == 0 || dot + 1 == file_name.len() {
        return None;
    }
    Some(file_name[dot + 1..].to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_maps_common_extensions() {
        let table = LanguageTable::builtin().unwrap();
        assert_eq!(table.detect("src/main.py").name, "python");
        assert_eq!(table.detect("lib.RS").name, "rust");
        assert_eq!(table.detect("docs/README.md").fence, "markdown");
        assert!(table.detect("README.md").markdown);
        assert_eq!(table.detect("web/app.tsx").fence, "tsx");
    }

    #[test]
    fn filenames_take_precedence_over_extensions() {
        let table = LanguageTable::builtin().unwrap();
        assert_eq!(table.detect("docker/Dockerfile").name, "dockerfile");
        assert_eq!(table.detect(".env").name, "dotenv");
        assert_eq!(table.detect(".gitignore").name, "ignore");
    }

    #[test]
    fn unmapped_files_are_unknown() {
        let table = LanguageTable::builtin().unwrap();
        let lang = table.detect("blob.xyz");
        assert_eq!(lang.name, UNKNOWN_LANGUAGE);
        assert!(!lang.is_recognized());
        assert_eq!(lang.fence, "");
        assert_eq!(table.detect("LICENSE").name, UNKNOWN_LANGUAGE);
    }

    #[test]
    fn only_python_has_structure_and_imports() {
        let table = LanguageTable::builtin().unwrap();
        let python = table.get("python").unwrap();
        assert!(python.structure.is_some());
        assert_eq!(python.imports, Some(ImportStyle::Python));
        assert!(python.docstrings);
        assert!(!table.get("markdown").unwrap().docstrings);
        assert!(table.get("rust").unwrap().structure.is_none());
    }

    #[test]
    fn extras_extend_and_override() {
        let extras = vec![
            LanguageSpec {
                name: "zig".to_string(),
                fence: None,
                extensions: vec![".zig".to_string()],
                filenames: vec![],
                line_comments: vec!["//".to_string()],
                markdown: false,
                docstrings: false,
                structure: None,
                imports: None,
            },
            LanguageSpec {
                name: "text".to_string(),
                fence: Some("plaintext".to_string()),
                extensions: vec!["txt".to_string(), "log".to_string()],
                filenames: vec![],
                line_comments: vec![],
                markdown: false,
                docstrings: false,
                structure: None,
                imports: None,
            },
        ];
        let table = LanguageTable::with_extras(&extras).unwrap();
        assert_eq!(table.detect("build.zig").fence, "zig");
        assert_eq!(table.detect("notes.txt").fence, "plaintext");
        assert_eq!(table.detect("app.log").name, "text");
    }

    #[test]
    fn invalid_structure_regex_is_rejected() {
        let spec = LanguageSpec {
            name: "broken".to_string(),
            fence: None,
            extensions: vec!["brk".to_string()],
            filenames: vec![],
            line_comments: vec![],
            markdown: false,
            docstrings: false,
            structure: Some(StructureSpec {
                functions: "(".to_string(),
                classes: "class".to_string(),
                branch_keywords: vec![],
            }),
            imports: None,
        };
        assert!(LanguageTable::from_specs(&[spec]).is_err());
    }

    #[test]
    fn extension_of_handles_dotfiles() {
        assert_eq!(extension_of("a.tar.GZ").as_deref(), Some("gz"));
        assert_eq!(extension_of(".bashrc"), None);
        assert_eq!(extension_of("Makefile"), None);
        assert_eq!(extension_of("trailing."), None);
    }
}
