//! Best-effort dependency sniffing from well-known manifest files.
//!
//! Only declared names are extracted. Versions, extras, markers and sources
//! are dropped and nothing is resolved against a lockfile.

use log;
use serde_json::Value as JsonValue;
use toml::Value as TomlValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    Requirements,
    Pyproject,
    PackageJson,
    Cargo,
}

impl ManifestKind {
    /// Matches by file name at any depth.
    pub fn from_path(rel_path: &str) -> Option<Self> {
        match rel_path.rsplit('/').next().unwrap_or(rel_path) {
            "requirements.txt" => Some(ManifestKind::Requirements),
            "pyproject.toml" => Some(ManifestKind::Pyproject),
            "package.json" => Some(ManifestKind::PackageJson),
            "Cargo.toml" => Some(ManifestKind::Cargo),
            _ => None,
        }
    }

    pub fn parse(self, content: &str) -> Result<Vec<String>, String> {
        let mut names = match self {
            ManifestKind::Requirements => Ok(parse_requirements(content)),
            ManifestKind::Pyproject => parse_pyproject(content),
            ManifestKind::PackageJson => parse_package_json(content),
            ManifestKind::Cargo => parse_cargo(content),
        }?;
        names.sort();
        names.dedup();
        log::trace!("{:?} manifest declares {} dependencies", self, names.len());
        Ok(names)
    }
}

/// Bare distribution name of a PEP 508 style requirement, if it has one.
pub fn requirement_name(spec: &str) -> Option<String> {
    let name: String = spec
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    let name = name.trim_end_matches('.');
    (!name.is_empty()).then(|| name.to_string())
}

fn parse_requirements(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        })
        .map(str::trim)
        // -r, -e, --index-url and friends
        .filter(|line| !line.is_empty() && !line.starts_with('-'))
        .filter(|line| !line.contains("://"))
        .filter_map(requirement_name)
        .collect()
}

fn parse_pyproject(content: &str) -> Result<Vec<String>, String> {
    let doc: TomlValue = toml::from_str(content).map_err(|e| e.to_string())?;
    let mut names = Vec::new();

    if let Some(project) = doc.get("project") {
        if let Some(deps) = project.get("dependencies").and_then(TomlValue::as_array) {
            names.extend(deps.iter().filter_map(|d| d.as_str()).filter_map(requirement_name));
        }
        if let Some(groups) = project
            .get("optional-dependencies")
            .and_then(TomlValue::as_table)
        {
            for deps in groups.values().filter_map(TomlValue::as_array) {
                names.extend(deps.iter().filter_map(|d| d.as_str()).filter_map(requirement_name));
            }
        }
    }

    if let Some(poetry) = doc.get("tool").and_then(|t| t.get("poetry")) {
        for key in ["dependencies", "dev-dependencies"] {
            names.extend(table_keys(poetry.get(key)));
        }
        if let Some(groups) = poetry.get("group").and_then(TomlValue::as_table) {
            for group in groups.values() {
                names.extend(table_keys(group.get("dependencies")));
            }
        }
        names.retain(|n| n != "python");
    }
    Ok(names)
}

fn parse_package_json(content: &str) -> Result<Vec<String>, String> {
    let doc: JsonValue = serde_json::from_str(content).map_err(|e| e.to_string())?;
    if !doc.is_object() {
        return Err("top-level value is not an object".to_string());
    }
    let mut names = Vec::new();
    for key in [
        "dependencies",
        "devDependencies",
        "peerDependencies",
        "optionalDependencies",
    ] {
        if let Some(map) = doc.get(key).and_then(JsonValue::as_object) {
            names.extend(map.keys().cloned());
        }
    }
    Ok(names)
}

fn parse_cargo(content: &str) -> Result<Vec<String>, String> {
    let doc: TomlValue = toml::from_str(content).map_err(|e| e.to_string())?;
    let mut names = Vec::new();
    for key in ["dependencies", "dev-dependencies", "build-dependencies"] {
        names.extend(table_keys(doc.get(key)));
    }
    names.extend(table_keys(
        doc.get("workspace").and_then(|w| w.get("dependencies")),
    ));
    Ok(names)
}

fn table_keys(value: Option<&TomlValue>) -> Vec<String> {
    value
        .and_then(TomlValue::as_table)
        .map(|t| t.keys().cloned().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_file_names_at_any_depth() {
        assert_eq!(
            ManifestKind::from_path("requirements.txt"),
            Some(ManifestKind::Requirements)
        );
        assert_eq!(
            ManifestKind::from_path("web/package.json"),
            Some(ManifestKind::PackageJson)
        );
        assert_eq!(ManifestKind::from_path("crates/a/Cargo.toml"), Some(ManifestKind::Cargo));
        assert_eq!(ManifestKind::from_path("requirements-dev.txt"), None);
    }

    #[test]
    fn requirements_strip_pins_extras_and_markers() {
        let content = "\
# pinned deps
requests==2.31.0
uvicorn[standard]>=0.20 ; python_version > '3.8'
-r base.txt
--index-url https://example.invalid/simple
git+https://example.invalid/repo.git
Django  # web
requests
";
        assert_eq!(
            ManifestKind::Requirements.parse(content).unwrap(),
            vec!["Django", "requests", "uvicorn"]
        );
    }

    #[test]
    fn pyproject_reads_pep621_and_poetry_tables() {
        let content = r#"
[project]
name = "demo"
dependencies = ["httpx>=0.27", "rich"]

[project.optional-dependencies]
test = ["pytest"]

[tool.poetry.dependencies]
python = "^3.11"
click = "^8"

[tool.poetry.group.dev.dependencies]
ruff = "*"
"#;
        assert_eq!(
            ManifestKind::Pyproject.parse(content).unwrap(),
            vec!["click", "httpx", "pytest", "rich", "ruff"]
        );
    }

    #[test]
    fn package_json_collects_all_dependency_maps() {
        let content = r#"{
  "name": "web",
  "dependencies": {"react": "^18"},
  "devDependencies": {"vite": "^5", "react": "^18"},
  "peerDependencies": {"react-dom": "^18"}
}"#;
        assert_eq!(
            ManifestKind::PackageJson.parse(content).unwrap(),
            vec!["react", "react-dom", "vite"]
        );
    }

    #[test]
    fn cargo_reads_dependency_sections() {
        let content = r#"
[package]
name = "demo"

[dependencies]
serde = { version = "1", features = ["derive"] }
log = "0.4"

[dev-dependencies]
tempfile = "3"

[workspace.dependencies]
anyhow = "1"
"#;
        assert_eq!(
            ManifestKind::Cargo.parse(content).unwrap(),
            vec!["anyhow", "log", "serde", "tempfile"]
        );
    }

    #[test]
    fn malformed_manifests_are_errors() {
        assert!(ManifestKind::PackageJson.parse("{ not json").is_err());
        assert!(ManifestKind::PackageJson.parse("[1, 2]").is_err());
        assert!(ManifestKind::Pyproject.parse("[project\nname=").is_err());
    }
}
