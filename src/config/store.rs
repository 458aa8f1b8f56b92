//! JSON configuration file persistence

use crate::{
    error::{AppError, Result},
    models::Config,
};
use std::path::{Path, PathBuf};

/// Reads and writes a [`Config`] as pretty-printed JSON
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the file, writing the defaults first when it does not exist yet
    pub fn load_or_init(&self) -> Result<Config> {
        if !self.path.exists() {
            let config = Config::default();
            self.save(&config)?;
            return Ok(config);
        }

        self.load()
    }

    pub fn load(&self) -> Result<Config> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| AppError::config(format!("Failed to read {}: {}", self.path.display(), e)))?;

        serde_json::from_str(&content)
            .map_err(|e| AppError::config(format!("Invalid config file {}: {}", self.path.display(), e)))
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::config(format!("Failed to create {}: {}", parent.display(), e)))?;
        }

        let body = serde_json::to_string_pretty(config)?;
        std::fs::write(&self.path, body)
            .map_err(|e| AppError::config(format!("Failed to write {}: {}", self.path.display(), e)))
    }
}
