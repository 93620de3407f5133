use crate::error::{AppError, Result};
use crate::languages::{LanguageSpec, LanguageTable};
use log;
use parse_duration::parse;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CONFIG_DIR: &str = ".xtools/xmark";
pub const DEFAULT_CONFIG_FILENAME: &str = "xmark.toml";
pub const DEFAULT_MAX_BYTES_PER_FILE: u64 = 300_000;
pub const DEFAULT_TOP_N: usize = 12;
pub const DEFAULT_HEADING_OFFSET: usize = 3;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<LanguageSpec>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub use_builtin_ignores: bool,
    #[serde(default)]
    pub respect_gitignore: bool,
    #[serde(default)]
    pub follow_symlinks: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    #[serde(default)]
    pub exclude_hidden: bool,
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default)]
    pub only_extensions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ContentConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes_per_file: u64,
    #[serde(default)]
    pub md_policy: MdPolicy,
    #[serde(default = "default_todo_markers")]
    pub todo_markers: Vec<String>,
    #[serde(default = "default_heading_offset")]
    pub render_heading_offset: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    #[serde(default = "default_true")]
    pub show_metrics: bool,
    #[serde(default = "default_true")]
    pub show_summaries: bool,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default)]
    pub import_graph: bool,
    #[serde(default = "default_true")]
    pub include_timestamp: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_files: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_budget: Option<String>,
}

/// How project Markdown files are embedded in the report.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MdPolicy {
    #[default]
    Fence,
    Render,
    Skip,
}

impl FromStr for MdPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fence" => Ok(MdPolicy::Fence),
            "render" => Ok(MdPolicy::Render),
            "skip" => Ok(MdPolicy::Skip),
            other => Err(AppError::InvalidArgument(format!(
                "Unknown md policy '{}'. Expected one of: fence, render, skip.",
                other
            ))),
        }
    }
}

impl fmt::Display for MdPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MdPolicy::Fence => "fence",
            MdPolicy::Render => "render",
            MdPolicy::Skip => "skip",
        })
    }
}

fn default_true() -> bool {
    true
}
fn default_max_bytes() -> u64 {
    DEFAULT_MAX_BYTES_PER_FILE
}
fn default_top_n() -> usize {
    DEFAULT_TOP_N
}
fn default_heading_offset() -> usize {
    DEFAULT_HEADING_OFFSET
}
fn default_todo_markers() -> Vec<String> {
    vec!["TODO".to_string(), "FIXME".to_string(), "XXX".to_string()]
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            max_bytes_per_file: default_max_bytes(),
            md_policy: MdPolicy::default(),
            todo_markers: default_todo_markers(),
            render_heading_offset: default_heading_offset(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            show_metrics: default_true(),
            show_summaries: default_true(),
            top_n: default_top_n(),
            import_graph: false,
            include_timestamp: default_true(),
        }
    }
}

impl Config {
    pub fn determine_project_root(cli_project_root: Option<&PathBuf>) -> Result<PathBuf> {
        let path_str_opt = cli_project_root
            .map(|p| p.to_string_lossy().to_string())
            .or_else(|| env::var("PROJECT_ROOT").ok().filter(|s| !s.is_empty()));

        let path_to_resolve = match path_str_opt {
            Some(p_str) => PathBuf::from(shellexpand::tilde(&p_str).as_ref()),
            None => env::current_dir().map_err(AppError::Io)?,
        };

        let resolved = path_to_resolve.canonicalize().map_err(|e| {
            AppError::Config(format!(
                "Root not found or not accessible '{}': {}",
                path_to_resolve.display(),
                e
            ))
        })?;
        if !resolved.is_dir() {
            return Err(AppError::Config(format!(
                "Root is not a directory: {}",
                resolved.display()
            )));
        }
        Ok(resolved)
    }

    pub fn resolve_config_path(
        project_root: &Path,
        cli_config_file: Option<&String>,
        cli_disable_config: bool,
    ) -> Result<Option<PathBuf>> {
        if cli_disable_config {
            log::debug!("Config file loading disabled via CLI flag.");
            return Ok(None);
        }

        let path_to_check = match cli_config_file {
            Some(p_str) => {
                let expanded_path_cow = shellexpand::tilde(p_str);
                let mut path = PathBuf::from(expanded_path_cow.as_ref());
                let looks_like_path = path.is_absolute()
                    || path.components().count() > 1
                    || p_str.contains(['/', '\\']);

                if looks_like_path {
                    if !path.exists() && path.extension().is_none() {
                        path.set_extension("toml");
                    }
                    if !path.exists() {
                        return Err(AppError::Config(format!(
                            "Specified config file not found at path: {}",
                            path.display()
                        )));
                    }
                    log::debug!("Using specified config file path: {}", path.display());
                    Some(path)
                } else {
                    let filename = if path.extension().is_none_or(|e| e != "toml") {
                        format!("{}.toml", path.to_string_lossy())
                    } else {
                        path.to_string_lossy().to_string()
                    };
                    let full_path = project_root.join(DEFAULT_CONFIG_DIR).join(filename);
                    if !full_path.exists() {
                        return Err(AppError::Config(format!(
                            "Specified config file '{}' not found in default directory: {}",
                            path.display(),
                            project_root.join(DEFAULT_CONFIG_DIR).display()
                        )));
                    }
                    log::debug!(
                        "Using specified config filename in default directory: {}",
                        full_path.display()
                    );
                    Some(full_path)
                }
            }
            None => {
                let default_path = project_root
                    .join(DEFAULT_CONFIG_DIR)
                    .join(DEFAULT_CONFIG_FILENAME);
                if default_path.exists() {
                    log::debug!("Using default config file path: {}", default_path.display());
                    Some(default_path)
                } else {
                    log::debug!(
                        "No config file specified and default not found at: {}",
                        default_path.display()
                    );
                    None
                }
            }
        };
        Ok(path_to_check)
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        log::info!("Loading configuration from: {}", config_path.display());
        let toml_content = fs::read_to_string(config_path).map_err(|e| AppError::FileRead {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&toml_content).map_err(|e| match e {
            AppError::TomlParse(msg) => AppError::TomlParse(format!(
                "Error parsing config file '{}': {}",
                config_path.display(),
                msg
            )),
            other => other,
        })
    }

    pub fn from_toml_str(toml_content: &str) -> Result<Self> {
        toml::from_str::<Config>(toml_content).map_err(|e| {
            AppError::TomlParse(format!("{}. Check TOML syntax and structure.", e))
        })
    }

    /// Rejects settings that would make the run meaningless. Called before
    /// any traversal happens.
    pub fn validate(&self) -> Result<()> {
        self.time_budget()?;
        if self.content.todo_markers.is_empty() {
            return Err(AppError::Config(
                "content.todo_markers must list at least one marker".to_string(),
            ));
        }
        if self.content.todo_markers.iter().any(|m| m.trim().is_empty()) {
            return Err(AppError::Config(
                "content.todo_markers must not contain empty markers".to_string(),
            ));
        }
        if self.general.threads == Some(0) {
            return Err(AppError::Config(
                "general.threads must be at least 1".to_string(),
            ));
        }
        crate::filter::build_glob_set_from_vec(&self.filters.ignore)?;
        LanguageTable::with_extras(&self.languages)?;
        Ok(())
    }

    pub fn time_budget(&self) -> Result<Option<Duration>> {
        match self.limits.time_budget.as_deref() {
            None => Ok(None),
            Some(raw) => parse(raw).map(Some).map_err(|e| {
                AppError::DurationParse(format!(
                    "Invalid time budget '{}': {}. Use format like '500ms', '30s'.",
                    raw, e
                ))
            }),
        }
    }

    pub fn effective_title(&self, project_root: &Path) -> String {
        self.general.title.clone().unwrap_or_else(|| {
            format!("Project Export: {}", project_display_name(project_root))
        })
    }
}

pub fn project_display_name(project_root: &Path) -> String {
    project_root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "project".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.content.max_bytes_per_file, 300_000);
        assert_eq!(config.content.md_policy, MdPolicy::Fence);
        assert_eq!(config.report.top_n, 12);
        assert!(config.report.show_metrics);
        assert!(config.report.show_summaries);
        assert!(!config.report.import_graph);
        assert!(!config.filters.exclude_hidden);
        assert!(!config.general.use_builtin_ignores);
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn toml_sections_override_defaults() {
        let config = Config::from_toml_str(
            r#"
            [filters]
            exclude_hidden = true
            ignore = ["**/node_modules/**"]

            [content]
            max_bytes_per_file = 100
            md_policy = "render"

            [limits]
            time_budget = "2s"
            "#,
        )
        .unwrap();
        assert!(config.filters.exclude_hidden);
        assert_eq!(config.filters.ignore, vec!["**/node_modules/**"]);
        assert_eq!(config.content.max_bytes_per_file, 100);
        assert_eq!(config.content.md_policy, MdPolicy::Render);
        assert_eq!(config.time_budget().unwrap(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn negative_byte_cap_is_a_parse_error() {
        let err = Config::from_toml_str("[content]\nmax_bytes_per_file = -1\n").unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::from_toml_str("[report]\nbogus = 1\n").is_err());
    }

    #[test]
    fn validate_rejects_bad_duration_and_markers() {
        let mut config = Config::default();
        config.limits.time_budget = Some("soon".to_string());
        assert!(config.validate().unwrap_err().is_configuration_error());

        let mut config = Config::default();
        config.content.todo_markers = vec!["  ".to_string()];
        assert!(config.validate().is_err());

        config.content.todo_markers = vec![];
        let err = config.validate().unwrap_err();
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("at least one marker"));
    }

    #[test]
    fn md_policy_parses_case_insensitively() {
        assert_eq!("Render".parse::<MdPolicy>().unwrap(), MdPolicy::Render);
        assert_eq!("skip".parse::<MdPolicy>().unwrap(), MdPolicy::Skip);
        assert!("inline".parse::<MdPolicy>().is_err());
    }

    #[test]
    fn root_must_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        fs::write(&file, "x").unwrap();
        let err = Config::determine_project_root(Some(&file)).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        let missing = dir.path().join("missing");
        assert!(Config::determine_project_root(Some(&missing)).is_err());
        assert!(Config::determine_project_root(Some(&dir.path().to_path_buf())).is_ok());
    }

    #[test]
    fn title_falls_back_to_root_name() {
        let config = Config::default();
        assert_eq!(
            config.effective_title(Path::new("/tmp/demo")),
            "Project Export: demo"
        );
    }
}
