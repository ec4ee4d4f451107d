//! File path utilities for organizing data files.

use crate::config::Config;
use std::path::{Path, PathBuf};

/// File path manager for data files
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
    logs: PathBuf,
    cache_db: PathBuf,
}

impl DataPaths {
    /// Paths as configured; relative entries resolve against the data root
    pub fn from_config(config: &Config) -> Self {
        Self {
            root: config.data_dir(),
            logs: config.log_dir(),
            cache_db: config.cache_database_path(),
        }
    }

    /// Get the root data directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get logs directory
    pub fn logs_dir(&self) -> &Path {
        &self.logs
    }

    /// Get the cache database file
    pub fn cache_database(&self) -> &Path {
        &self.cache_db
    }

    /// Create all necessary directories
    pub fn create_dirs(&self) -> std::io::Result<()> {
        let mut dirs = vec![self.root.as_path(), self.logs.as_path()];
        if let Some(parent) = self.cache_db.parent().filter(|p| !p.as_os_str().is_empty()) {
            dirs.push(parent);
        }

        for dir in dirs {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
