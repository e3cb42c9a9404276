// tapfetch-common/src/cache.rs
// Default location for fetched artifacts

use std::fs;
use std::path::{Path, PathBuf};

use super::error::Result;
use crate::Config;

/// Cache struct to manage the download directory
pub struct Cache {
    cache_dir: PathBuf,
}

impl Cache {
    /// Create a new Cache using the config's cache_dir
    pub fn new(config: &Config) -> Result<Self> {
        let cache_dir = config.cache_dir();
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir)?;
        }
        Ok(Self { cache_dir })
    }

    /// Gets the cache directory path
    pub fn get_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path an artifact named `file_name` is stored at
    pub fn artifact_path(&self, file_name: &str) -> PathBuf {
        self.cache_dir.join(file_name)
    }

    /// Removes a cached artifact, if present
    pub fn clear_file(&self, file_name: &str) -> Result<()> {
        let path = self.artifact_path(file_name);
        if path.exists() {
            tracing::debug!("Removing cached artifact {}", path.display());
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}
