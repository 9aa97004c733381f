use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

use crate::network::relationships::ColorMode;
use crate::scores::DEFAULT_SEPARATOR;
use crate::weights::WeightTable;

/// Application configuration loaded from TOML config file.
/// All fields have sensible defaults; the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Extra or overriding relationship weights, merged over the built-in table.
    pub weights: BTreeMap<String, i64>,
    pub network: NetworkConfig,
    pub scores: ScoreConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct NetworkConfig {
    /// Coloring mode used when `--color` is not given.
    pub color: ColorMode,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    /// Separator between tokens of an n-gram pattern.
    pub token_separator: String,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            token_separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/crimviz/config.toml`.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Load from an explicit path.
    /// Logs a warning if the file can't be read or parsed.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Built-in relationship weights with this config's overrides applied.
    pub fn weight_table(&self) -> WeightTable {
        WeightTable::builtin().with_overrides(&self.weights)
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
