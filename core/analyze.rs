use crate::classify::{self, TextVerdict};
use crate::config::Config;
use crate::error::{FileIssue, IssueKind, Result};
use crate::filter::Candidate;
use crate::languages::{Language, LanguageTable};
use chrono::{DateTime, Utc};
use log;
use regex::Regex;
#[cfg(feature = "serde_support")]
use serde::Serialize;
use std::fs;

const SUMMARY_MAX_CHARS: usize = 200;
const BRIEF_MAX_LINES: usize = 5;
const BRIEF_FALLBACK_LINES: usize = 2;
const BRIEF_MAX_CHARS: usize = 400;

/// Count-based structural heuristic. `complexity_estimate` is 1 plus the
/// number of branch/loop/exception keywords found anywhere in the text; it
/// approximates McCabe complexity and is not derived from a control-flow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
#[cfg_attr(feature = "serde_support", serde(rename_all = "camelCase"))]
pub struct StructuralMetrics {
    pub function_count: usize,
    pub class_count: usize,
    pub complexity_estimate: usize,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
#[cfg_attr(feature = "serde_support", serde(rename_all = "camelCase"))]
pub struct FileRecord {
    pub path: String,
    pub size_bytes: u64,
    pub line_count: usize,
    pub significant_line_count: usize,
    pub todo_count: usize,
    pub modified: Option<DateTime<Utc>>,
    /// blake3 of the complete, untruncated file.
    pub digest: String,
    pub language: String,
    #[cfg_attr(feature = "serde_support", serde(skip))]
    pub fence: String,
    pub is_binary: bool,
    pub is_markdown: bool,
    #[cfg_attr(
        feature = "serde_support",
        serde(skip_serializing_if = "Option::is_none")
    )]
    pub structural: Option<StructuralMetrics>,
    pub truncated: bool,
    pub included_bytes: u64,
    #[cfg_attr(
        feature = "serde_support",
        serde(skip_serializing_if = "Option::is_none")
    )]
    pub summary: Option<String>,
    /// Leading docstring or comment block, else the first lines.
    #[cfg_attr(
        feature = "serde_support",
        serde(skip_serializing_if = "Option::is_none")
    )]
    pub brief: Option<String>,
    /// Retained text: at most `max_bytes_per_file` bytes. `None` for binaries.
    #[cfg_attr(feature = "serde_support", serde(skip))]
    pub content: Option<String>,
}

impl FileRecord {
    pub fn short_digest(&self) -> &str {
        &self.digest[..self.digest.len().min(12)]
    }
}

/// Result of analysing one file: the record plus an optional non-fatal note.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub record: FileRecord,
    pub issue: Option<FileIssue>,
}

pub struct FileAnalyzer<'a> {
    table: &'a LanguageTable,
    todo_pattern: Option<Regex>,
    max_bytes_per_file: u64,
}

impl<'a> FileAnalyzer<'a> {
    pub fn new(table: &'a LanguageTable, config: &Config) -> Result<Self> {
        Ok(Self {
            table,
            todo_pattern: todo_regex(&config.content.todo_markers)?,
            max_bytes_per_file: config.content.max_bytes_per_file,
        })
    }

    /// Reads and analyses one candidate. A read failure (permissions, the
    /// file vanishing after listing) is returned as an access issue.
    pub fn analyze(&self, candidate: &Candidate) -> std::result::Result<Analysis, FileIssue> {
        let bytes = fs::read(&candidate.abs_path).map_err(|e| {
            log::warn!("Failed to read {}: {}", candidate.rel_path, e);
            FileIssue::new(&candidate.rel_path, IssueKind::Access, e.to_string())
        })?;
        let modified = fs::metadata(&candidate.abs_path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        Ok(self.analyze_bytes(&candidate.rel_path, &bytes, modified))
    }

    pub fn analyze_bytes(
        &self,
        rel_path: &str,
        bytes: &[u8],
        modified: Option<DateTime<Utc>>,
    ) -> Analysis {
        let size_bytes = bytes.len() as u64;
        let digest = blake3::hash(bytes).to_hex().to_string();
        let classification = classify::classify(bytes, rel_path, self.table);
        let language = classification.language;

        let text = match classification.verdict {
            TextVerdict::Text => std::str::from_utf8(bytes).ok(),
            _ => None,
        };
        let Some(text) = text else {
            let issue = (classification.verdict == TextVerdict::InvalidEncoding).then(|| {
                FileIssue::new(
                    rel_path,
                    IssueKind::Decode,
                    "not valid UTF-8; listed as binary",
                )
            });
            return Analysis {
                record: FileRecord {
                    path: rel_path.to_string(),
                    size_bytes,
                    line_count: 0,
                    significant_line_count: 0,
                    todo_count: 0,
                    modified,
                    digest,
                    language: language.name.clone(),
                    fence: language.fence.clone(),
                    is_binary: true,
                    is_markdown: false,
                    structural: None,
                    truncated: false,
                    included_bytes: size_bytes,
                    summary: None,
                    brief: None,
                    content: None,
                },
                issue,
            };
        };
        let text = strip_bom(text);

        let line_count = count_lines(text);
        let significant_line_count = count_significant_lines(text, language);
        let todo_count = self
            .todo_pattern
            .as_ref()
            .map_or(0, |re| count_marker_lines(text, re));
        let structural = structural_metrics(text, language);

        let (content, included_bytes, truncated) = if size_bytes > self.max_bytes_per_file {
            let cap = self.max_bytes_per_file as usize;
            let retained = String::from_utf8_lossy(&bytes[..cap]);
            log::debug!(
                "Truncating {} from {} to {} bytes",
                rel_path,
                size_bytes,
                cap
            );
            (strip_bom(&retained).to_string(), self.max_bytes_per_file, true)
        } else {
            (text.to_string(), size_bytes, false)
        };
        // Descriptions quote the file, so they only see the retained text.
        let summary = auto_summary(&content, language, structural.as_ref());
        let brief = brief_description(&content, language);

        Analysis {
            record: FileRecord {
                path: rel_path.to_string(),
                size_bytes,
                line_count,
                significant_line_count,
                todo_count,
                modified,
                digest,
                language: language.name.clone(),
                fence: language.fence.clone(),
                is_binary: false,
                is_markdown: language.markdown,
                structural,
                truncated,
                included_bytes,
                summary,
                brief,
                content: Some(content),
            },
            issue: None,
        }
    }
}

fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

/// Number of `\n` terminators, plus one when trailing content lacks one.
pub fn count_lines(text: &str) -> usize {
    let terminators = text.bytes().filter(|&b| b == b'\n').count();
    if !text.is_empty() && !text.ends_with('\n') {
        terminators + 1
    } else {
        terminators
    }
}

/// Non-blank lines that are not single-line comments. Block comments are
/// counted as code. Unrecognised languages report every line.
pub fn count_significant_lines(text: &str, language: &Language) -> usize {
    if !language.is_recognized() {
        return count_lines(text);
    }
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !language.is_comment_line(line))
        .count()
}

pub fn todo_regex(markers: &[String]) -> Result<Option<Regex>> {
    let alternatives: Vec<String> = markers
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .map(|m| {
            let starts_word = m.chars().next().is_some_and(is_word_char);
            let ends_word = m.chars().last().is_some_and(is_word_char);
            format!(
                "{}{}{}",
                if starts_word { r"\b" } else { "" },
                regex::escape(m),
                if ends_word { r"\b" } else { "" }
            )
        })
        .collect();
    if alternatives.is_empty() {
        return Ok(None);
    }
    Ok(Some(Regex::new(&format!(
        "(?i)(?:{})",
        alternatives.join("|")
    ))?))
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Lines containing at least one marker; repeats on a line count once.
pub fn count_marker_lines(text: &str, pattern: &Regex) -> usize {
    text.lines().filter(|line| pattern.is_match(line)).count()
}

pub fn structural_metrics(text: &str, language: &Language) -> Option<StructuralMetrics> {
    let rules = language.structure.as_ref()?;
    let branches = rules
        .branches
        .as_ref()
        .map_or(0, |re| re.find_iter(text).count());
    Some(StructuralMetrics {
        function_count: rules.functions.find_iter(text).count(),
        class_count: rules.classes.find_iter(text).count(),
        complexity_estimate: 1 + branches,
    })
}

/// Deterministic one-line description: first Markdown heading, leading
/// docstring, a structural count, or the first non-empty line.
pub fn auto_summary(
    text: &str,
    language: &Language,
    structural: Option<&StructuralMetrics>,
) -> Option<String> {
    let summary = if language.markdown {
        text.lines().find_map(markdown_heading_text)
    } else {
        None
    }
    .or_else(|| {
        language
            .docstrings
            .then(|| leading_docstring(text))
            .flatten()
            .and_then(|doc| doc.lines().next().map(str::trim).map(str::to_string))
            .filter(|line| !line.is_empty())
    })
    .or_else(|| {
        structural.map(|s| {
            format!(
                "{} module with {} functions and {} classes.",
                capitalize(&language.name),
                s.function_count,
                s.class_count
            )
        })
    })
    .or_else(|| {
        text.lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    })?;
    Some(summary.chars().take(SUMMARY_MAX_CHARS).collect())
}

fn markdown_heading_text(line: &str) -> Option<String> {
    let trimmed = line.trim_start();
    let rest = trimmed.trim_start_matches('#');
    if rest.len() == trimmed.len() || !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let heading = rest.trim();
    (!heading.is_empty()).then(|| heading.to_string())
}

/// Body of a leading `"""` or `'''` string, trimmed. `None` when unterminated.
fn leading_docstring(text: &str) -> Option<&str> {
    let trimmed = text.trim_start();
    let quote = ["\"\"\"", "'''"]
        .into_iter()
        .find(|q| trimmed.starts_with(q))?;
    let body = &trimmed[quote.len()..];
    let end = body.find(quote)?;
    Some(body[..end].trim())
}

/// Short multi-line description: the leading docstring (up to five lines),
/// else the leading block of line comments (up to five, blank lines kept),
/// else the first two lines of the file.
pub fn brief_description(text: &str, language: &Language) -> Option<String> {
    if language.docstrings {
        if let Some(doc) = leading_docstring(text) {
            let brief: Vec<&str> = doc.lines().take(BRIEF_MAX_LINES).collect();
            return cap_brief(brief.join("\n").trim());
        }
    }

    if !language.line_comments.is_empty() {
        let mut lines: Vec<&str> = Vec::new();
        for line in text.lines() {
            let trimmed = line.trim();
            if let Some(prefix) = language
                .line_comments
                .iter()
                .find(|p| trimmed.starts_with(p.as_str()))
            {
                lines.push(trimmed[prefix.len()..].trim_start());
                if lines.len() >= BRIEF_MAX_LINES {
                    break;
                }
            } else if trimmed.is_empty() {
                if !lines.is_empty() {
                    lines.push("");
                }
            } else {
                break;
            }
        }
        if let Some(brief) = cap_brief(lines.join("\n").trim()) {
            return Some(brief);
        }
    }

    let head: Vec<&str> = text.lines().take(BRIEF_FALLBACK_LINES).collect();
    cap_brief(head.join("\n").trim())
}

fn cap_brief(brief: &str) -> Option<String> {
    (!brief.is_empty()).then(|| brief.chars().take(BRIEF_MAX_CHARS).collect())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
