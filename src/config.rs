//! Runtime configuration, read from an optional TOML file.
//!
//! Lookup order for the file: `KOLADA_CONFIG`, then `kolada.toml` in the
//! working directory. A missing file means defaults.

use crate::error::LoadError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "KOLADA_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "kolada.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DataPaths {
    pub kpis: PathBuf,
    pub municipalities: PathBuf,
    pub values: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        DataPaths {
            kpis: PathBuf::from("data/kpis.json"),
            municipalities: PathBuf::from("data/municipalities.csv"),
            values: PathBuf::from("data/values.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub gender: String,
    pub municipality_type: String,
    pub limit: usize,
    pub search_limit: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Defaults {
            gender: "T".to_string(),
            municipality_type: "K".to_string(),
            limit: 10,
            search_limit: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    pub output_dir: PathBuf,
    pub data: DataPaths,
    pub defaults: Defaults,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            log_level: "info".to_string(),
            output_dir: PathBuf::from("."),
            data: DataPaths::default(),
            defaults: Defaults::default(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, LoadError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn load() -> Result<Self, LoadError> {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        if !path.exists() {
            return Ok(AppConfig::default());
        }
        Self::from_file(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(AppConfig::from_toml_str("").unwrap(), AppConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = AppConfig::from_toml_str(
            r#"
            log_level = "debug"

            [data]
            values = "/tmp/values.json"

            [defaults]
            limit = 5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.data.values, PathBuf::from("/tmp/values.json"));
        assert_eq!(cfg.data.kpis, PathBuf::from("data/kpis.json"));
        assert_eq!(cfg.defaults.limit, 5);
        assert_eq!(cfg.defaults.gender, "T");
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = AppConfig::from_toml_str("limit = [").unwrap_err();
        assert!(matches!(err, LoadError::Config(_)));
    }
}
