use std::path::Path;

use tracing::info;

use crate::types::config::StoreSettings;


#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid settings: {0}")]
    Parse(#[from] serde_yaml::Error),
}


/// Returns sensible defaults for all settings fields.
pub fn default_settings() -> StoreSettings {
    StoreSettings::default()
}


/// Load settings from a YAML file. A missing file yields the defaults.
pub fn load(path: &Path) -> Result<StoreSettings, ConfigError> {
    if !path.exists() {
        return Ok(default_settings());
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let settings = parse(&content)?;
    info!(path = %path.display(), default_group = %settings.default_group, "settings loaded");
    Ok(settings)
}


/// Save settings to a YAML file, creating parent directories.
pub fn save(path: &Path, settings: &StoreSettings) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(path, serialize(settings)?).map_err(write_err)
}


/// Parse settings from YAML text. Blank text yields the defaults.
pub fn parse(content: &str) -> Result<StoreSettings, ConfigError> {
    if content.trim().is_empty() {
        return Ok(default_settings());
    }
    Ok(serde_yaml::from_str(content)?)
}


pub fn serialize(settings: &StoreSettings) -> Result<String, ConfigError> {
    Ok(serde_yaml::to_string(settings)?)
}
