use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("TOML Parsing Error: {0}")]
    TomlParse(String),

    #[error("TOML Serialization Error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON Serialization Error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("YAML Parsing/Serialization Error: {0}")]
    YamlError(#[from] serde_yml::Error),

    #[error("XML Serialization Error: {0}")]
    XmlSerialize(String),

    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File Read Error: Path '{path}', Error: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File Write Error: Path '{path}', Error: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("WalkDir Error: {0}")]
    WalkDir(String),

    #[error("Ignore Error: {0}")]
    Ignore(#[from] ignore::Error),

    #[error("Glob Pattern Error: {0}")]
    Glob(String),

    #[error("Regex Error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid Argument: {0}")]
    InvalidArgument(String),

    #[error("Data Loading Error: {0}")]
    DataLoading(String),

    #[error("Duration Parsing Error: {0}")]
    DurationParse(String),
}

impl AppError {
    /// True for errors raised before traversal because the run was
    /// configured incorrectly.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            AppError::Config(_)
                | AppError::TomlParse(_)
                | AppError::Glob(_)
                | AppError::Regex(_)
                | AppError::InvalidArgument(_)
                | AppError::DurationParse(_)
        )
    }
}

#[cfg(feature = "serde_support")]
impl From<quick_xml::se::SeError> for AppError {
    fn from(err: quick_xml::se::SeError) -> Self {
        AppError::XmlSerialize(err.to_string())
    }
}

impl From<globset::Error> for AppError {
    fn from(err: globset::Error) -> Self {
        AppError::Glob(format!("Globset error: {}", err))
    }
}

impl From<walkdir::Error> for AppError {
    fn from(err: walkdir::Error) -> Self {
        AppError::WalkDir(err.to_string())
    }
}

impl From<parse_duration::parse::Error> for AppError {
    fn from(err: parse_duration::parse::Error) -> Self {
        AppError::DurationParse(err.to_string())
    }
}

/// Category of a recoverable, per-file problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Entry could not be listed or read.
    Access,
    /// Bytes were not valid text under UTF-8.
    Decode,
    /// A dependency manifest could not be parsed.
    ManifestParse,
    /// A configured file-count or time limit stopped traversal early.
    Limit,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IssueKind::Access => "access_error",
            IssueKind::Decode => "decode_error",
            IssueKind::ManifestParse => "manifest_parse_error",
            IssueKind::Limit => "limit_reached",
        };
        f.write_str(label)
    }
}

/// Non-fatal problem recorded during a run and surfaced in the run summary.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FileIssue {
    pub path: String,
    pub kind: IssueKind,
    pub message: String,
}

impl FileIssue {
    pub fn new(path: impl Into<String>, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FileIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.path, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issues_display_with_kind_labels() {
        let issue = FileIssue::new("pkg/package.json", IssueKind::ManifestParse, "bad json");
        assert_eq!(
            issue.to_string(),
            "[manifest_parse_error] pkg/package.json: bad json"
        );
        assert_eq!(IssueKind::Limit.to_string(), "limit_reached");
    }

    #[test]
    fn only_setup_problems_are_configuration_errors() {
        assert!(AppError::Glob("[".into()).is_configuration_error());
        assert!(AppError::DurationParse("soon".into()).is_configuration_error());
        assert!(!AppError::Io(std::io::Error::other("disk")).is_configuration_error());
    }
}
