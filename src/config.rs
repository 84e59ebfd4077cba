//! Calculator configuration, persisted as TOML in
//! `$XDG_CONFIG_HOME/cubecalc/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::enums::{Category, Cube, Region, Tier};
use crate::error::ConfigError;

/// Selectors used when a session never set its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDefaults {
    #[serde(default = "default_cube")]
    pub cube: Cube,
    #[serde(default = "default_tier")]
    pub tier: Tier,
    #[serde(default = "default_category")]
    pub category: Category,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default = "default_region")]
    pub region: Region,
}

fn default_cube() -> Cube {
    Cube::RED
}
fn default_tier() -> Tier {
    Tier::Legendary
}
fn default_category() -> Category {
    Category::WEAPON
}
fn default_level() -> u32 {
    200
}
fn default_region() -> Region {
    Region::Gms
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            cube: default_cube(),
            tier: default_tier(),
            category: default_category(),
            level: default_level(),
            region: default_region(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalcConfig {
    /// Start with the debug logger enabled.
    #[serde(default)]
    pub debug: bool,
    /// External line-table file; the built-in catalog when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<PathBuf>,
    /// Cap on enumerated combinations per calculation.
    #[serde(default = "default_max_combos")]
    pub max_combos: usize,
    /// Matching combinations printed by the CLI.
    #[serde(default = "default_max_display")]
    pub max_display: usize,
    #[serde(default)]
    pub defaults: SessionDefaults,
}

fn default_max_combos() -> usize {
    1_000_000
}
fn default_max_display() -> usize {
    50
}

impl Default for CalcConfig {
    fn default() -> Self {
        Self {
            debug: false,
            lines: None,
            max_combos: default_max_combos(),
            max_display: default_max_display(),
            defaults: SessionDefaults::default(),
        }
    }
}

impl CalcConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Load from `path`, or defaults if the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |e: std::io::Error| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(write_err)
    }
}
