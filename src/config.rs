// src/config.rs
use crate::store::DEFAULT_STORAGE_KEY;
use directories::ProjectDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use toml;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub storage_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>, // None: platform data directory
    pub pretty_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            data_dir: None,
            pretty_json: false,
        }
    }
}

impl Config {
    /// Directory holding the stored accounts; `override_dir` wins over the config file.
    pub fn resolve_data_dir(&self, override_dir: Option<&Path>) -> Option<PathBuf> {
        override_dir
            .map(Path::to_path_buf)
            .or_else(|| self.data_dir.clone())
            .or_else(|| project_dirs().map(|dirs| dirs.data_dir().to_path_buf()))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "AccountsRS", "AccountsRS")
}

fn get_config_path() -> Option<PathBuf> {
    project_dirs().map(|proj_dirs| proj_dirs.config_dir().join("accounts_config.toml"))
}

fn save_default_config(config_path: &Path, config: &Config) -> Result<(), String> {
    info!("Attempting to save default config to {:?}", config_path);
    if let Some(parent_dir) = config_path.parent() {
        if !parent_dir.exists() {
            fs::create_dir_all(parent_dir)
                .map_err(|e| format!("Failed to create config directory {:?}: {}", parent_dir, e))?;
            info!("Created config directory: {:?}", parent_dir);
        }
    }

    let toml_string = toml::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize default config to TOML: {}", e))?;

    let mut file = fs::File::create(config_path)
        .map_err(|e| format!("Failed to create default config file {:?}: {}", config_path, e))?;

    file.write_all(toml_string.as_bytes())
        .map_err(|e| format!("Failed to write default config to {:?}: {}", config_path, e))?;

    info!("Saved default configuration to {:?}", config_path);
    Ok(())
}

/// Reads the config at `config_path`, writing defaults there if it does not exist.
/// Unreadable or malformed files fall back to defaults.
pub fn load_config_from(config_path: &Path) -> Config {
    if !config_path.exists() {
        info!(
            "Config file not found at {:?}. Creating and using default configuration.",
            config_path
        );
        let default_config = Config::default();
        if let Err(e) = save_default_config(config_path, &default_config) {
            warn!("Failed to save default configuration: {}", e);
        }
        return default_config;
    }

    info!("Loading configuration from {:?}", config_path);
    match fs::read_to_string(config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(loaded_config) => {
                info!("Configuration loaded successfully.");
                loaded_config
            }
            Err(e) => {
                warn!(
                    "Failed to parse config file at {:?}: {}. Using default configuration.",
                    config_path, e
                );
                Config::default()
            }
        },
        Err(e) => {
            warn!(
                "Failed to read config file at {:?}: {}. Using default configuration.",
                config_path, e
            );
            Config::default()
        }
    }
}

pub fn load_config() -> Config {
    match get_config_path() {
        Some(config_path) => load_config_from(&config_path),
        None => {
            warn!("Could not determine config directory. Using default configuration.");
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage_key, "accounts");
        assert_eq!(config.data_dir, None);
        assert!(!config.pretty_json);
    }

    #[test]
    fn test_load_config_non_existent_creates_default() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("non_existent_dir").join("accounts_config.toml");

        let config = load_config_from(&config_path);
        assert_eq!(config, Config::default());
        assert!(config_path.exists());

        let content = fs::read_to_string(&config_path).unwrap();
        let saved: Config = toml::from_str(&content).unwrap();
        assert_eq!(saved, Config::default());
    }

    #[test]
    fn test_load_config_reads_existing_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("accounts_config.toml");
        fs::write(
            &config_path,
            r#"
storage_key = "team"
data_dir = "/tmp/accounts-data"
pretty_json = true
"#,
        )
        .unwrap();

        let config = load_config_from(&config_path);
        assert_eq!(config.storage_key, "team");
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/accounts-data")));
        assert!(config.pretty_json);
    }

    #[test]
    fn test_load_config_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("partial_config.toml");
        fs::write(&config_path, "pretty_json = true\n").unwrap();

        let config = load_config_from(&config_path);
        assert!(config.pretty_json);
        assert_eq!(config.storage_key, "accounts", "missing keys should take defaults");
        assert_eq!(config.data_dir, None);
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("invalid_config.toml");
        fs::write(&config_path, "this is not valid toml content = definitely_broken").unwrap();

        assert_eq!(load_config_from(&config_path), Config::default());
    }

    #[test]
    fn test_resolve_data_dir_precedence() {
        let config = Config {
            data_dir: Some(PathBuf::from("/from/config")),
            ..Config::default()
        };
        assert_eq!(
            config.resolve_data_dir(Some(Path::new("/from/flag"))),
            Some(PathBuf::from("/from/flag"))
        );
        assert_eq!(config.resolve_data_dir(None), Some(PathBuf::from("/from/config")));
    }
}
