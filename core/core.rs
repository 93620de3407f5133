pub mod aggregate;
pub mod analyze;
pub mod classify;
pub mod config;
pub mod error;
pub mod filter;
pub mod languages;
pub mod output_formats;
pub mod pipeline;
pub mod report;
pub mod tree;

pub use aggregate::{ImportEdge, LanguageStat, ProjectMetrics, RankedFile, Totals};
pub use analyze::{FileAnalyzer, FileRecord, StructuralMetrics};
pub use classify::{Classification, TextVerdict, classify};
pub use config::{Config, MdPolicy};
pub use error::{AppError, FileIssue, IssueKind, Result};
pub use filter::{Candidate, PathFilter, build_glob_set_from_vec};
pub use languages::{Language, LanguageSpec, LanguageTable};
pub use output_formats::{BuiltinIgnores, get_builtin_ignore_patterns};
pub use pipeline::{ProjectAnalysis, RunOutput, analyze_project, generate, write_document};
pub use report::ReportContext;
pub use tree::{TreeNode, build_tree};
