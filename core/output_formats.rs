use crate::error::{AppError, Result};
use once_cell::sync::Lazy;
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};

#[derive(RustEmbed)]
#[folder = "../data/"]
struct BuiltinData;

#[derive(Debug, Default, Deserialize)]
pub struct BuiltinIgnores {
    #[serde(default)]
    pub patterns: Vec<String>,
}

static BUILTIN_IGNORE_PATTERNS: Lazy<BuiltinIgnores> = Lazy::new(|| {
    let yaml_content = load_embedded_text("builtin_ignores.yaml")
        .expect("Embedded data/builtin_ignores.yaml is missing");
    serde_yml::from_str(&yaml_content).expect("Failed to parse embedded data/builtin_ignores.yaml")
});

pub fn get_builtin_ignore_patterns() -> &'static BuiltinIgnores {
    &BUILTIN_IGNORE_PATTERNS
}

pub fn load_embedded_text(name: &str) -> Result<String> {
    log::trace!("Loading embedded data file: {}", name);
    let asset = BuiltinData::get(name)
        .ok_or_else(|| AppError::DataLoading(format!("Embedded data file not found: {}", name)))?;
    let content = std::str::from_utf8(asset.data.as_ref()).map_err(|e| {
        AppError::DataLoading(format!("UTF-8 error in embedded data {}: {}", name, e))
    })?;
    Ok(content.to_string())
}

pub fn serialize_to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    if pretty {
        serde_json::to_string_pretty(value).map_err(AppError::JsonSerialize)
    } else {
        serde_json::to_string(value).map_err(AppError::JsonSerialize)
    }
}

pub fn serialize_to_yaml<T: Serialize>(value: &T) -> Result<String> {
    serde_yml::to_string(value).map_err(AppError::YamlError)
}

#[cfg(feature = "serde_support")]
pub fn serialize_to_xml<T: Serialize>(value: &T, root_name: &str) -> Result<String> {
    quick_xml::se::to_string_with_root(root_name, value)
        .map_err(|e| AppError::XmlSerialize(e.to_string()))
}
