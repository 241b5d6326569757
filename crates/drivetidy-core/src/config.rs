/// Engine configuration loaded from an optional TOML file.
///
/// Every field has a default, so a missing file or an empty one gives the
/// stock behaviour. When no path is given, the platform config directory
/// is checked for `drivetidy/drivetidy.toml`.
use crate::analysis::duplicates::DEFAULT_SIMILARITY_THRESHOLD;
use crate::analysis::structure::StructureConfig;
use crate::cache::DEFAULT_TTL_HOURS;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const APP_DIR: &str = "drivetidy";
const CONFIG_FILE: &str = "drivetidy.toml";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub duplicates: DuplicateConfig,
    pub structure: StructureConfig,
    pub stale: StaleConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Snapshot directory. Defaults to the platform cache dir.
    pub dir: Option<PathBuf>,
    /// TTL recorded with new snapshots.
    pub ttl_hours: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            ttl_hours: DEFAULT_TTL_HOURS,
        }
    }
}

impl CacheConfig {
    /// The configured directory, or `<platform cache dir>/drivetidy`.
    pub fn resolved_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::cache_dir()
                .map(|d| d.join(APP_DIR))
                .ok_or_else(|| invalid("no platform cache directory; set cache.dir")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DuplicateConfig {
    /// Minimum stem similarity for a same-size name match.
    pub similarity_threshold: f64,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaleConfig {
    /// Files untouched for at least this many days are stale.
    pub min_age_days: u32,
    /// Suggest archiving once more files than this are stale.
    pub archive_suggestion_threshold: usize,
    /// Cap on listed stale files.
    pub max_results: usize,
}

impl Default for StaleConfig {
    fn default() -> Self {
        Self {
            min_age_days: 365,
            archive_suggestion_threshold: 50,
            max_results: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    /// Entries in the largest-files list.
    pub largest_files: usize,
    /// Folders in the summary outline.
    pub outline_limit: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            largest_files: 20,
            outline_limit: 100,
        }
    }
}

impl EngineConfig {
    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load `path` when given (it must exist), else the default config file
    /// when present, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ttl = self.cache.ttl_hours;
        if !ttl.is_finite() || ttl < 0.0 {
            return Err(invalid(format!(
                "cache.ttl_hours must be a non-negative number, got {ttl}"
            )));
        }
        let threshold = self.duplicates.similarity_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(invalid(format!(
                "duplicates.similarity_threshold must be in (0, 1], got {threshold}"
            )));
        }
        if self.structure.max_depth == 0 {
            return Err(invalid("structure.max_depth must be at least 1"));
        }
        if self.structure.scatter_min_folders < 2 {
            return Err(invalid("structure.scatter_min_folders must be at least 2"));
        }
        Ok(())
    }
}

/// `<platform config dir>/drivetidy/drivetidy.toml`, when the platform has
/// a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.into(),
    }
}
