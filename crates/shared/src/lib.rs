//! Shared library for the anime-browser workspace.
//!
//! This crate provides common functionality used by the browser crate:
//! - Configuration management
//! - Database connection and schema
//! - Persistent key-value storage
//! - File path utilities
//! - Logging infrastructure

pub mod config;
pub mod db;
pub mod logging;
pub mod paths;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use logging::LogConfig;
pub use paths::DataPaths;
pub use storage::{KeyValueStore, MemoryStore, SqliteStore, StoreError};

/// Common result type using anyhow::Error
pub type Result<T> = anyhow::Result<T>;
