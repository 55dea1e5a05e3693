use crate::breeds::{BreedCatalog, Round};
use crate::dog_api::{ThumbnailSize, DEFAULT_API_BASE};
use crate::image_pool::PreloadPlan;
use crate::progression::ProgressionThresholds;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("progression thresholds must not decrease: {0:?}")]
    Thresholds(ProgressionThresholds),

    #[error("{0} has no breeds")]
    EmptyRound(Round),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    pub preload: PreloadPlan,
    pub thresholds: ProgressionThresholds,
    pub catalog: BreedCatalog,
    pub log_level: String,
    pub record_history: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE.to_string(),
            request_timeout_secs: 8,
            thumbnail_width: 48,
            thumbnail_height: 24,
            preload: PreloadPlan::default(),
            thresholds: ProgressionThresholds::default(),
            catalog: BreedCatalog::default(),
            log_level: "info".to_string(),
            record_history: true,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.thresholds.is_non_decreasing() {
            return Err(ConfigError::Thresholds(self.thresholds));
        }
        for round in Round::ALL {
            if self.catalog.breeds_for_round(round).is_empty() {
                return Err(ConfigError::EmptyRound(round));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Thumbnails are rendered with half-block cells, two pixels per row
    pub fn thumbnail_size(&self) -> ThumbnailSize {
        ThumbnailSize {
            width: self.thumbnail_width,
            height: self.thumbnail_height * 2,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "breedblink") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("breedblink_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Strict load: surfaces missing files, bad JSON and invalid tables
    pub fn try_load(&self) -> Result<Config, ConfigError> {
        let bytes = fs::read(&self.path)?;
        let cfg: Config = serde_json::from_slice(&bytes)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match self.try_load() {
            Ok(cfg) => cfg,
            Err(ConfigError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                Config::default()
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "ignoring config, using defaults");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}
