//! Configuration management for wxvoice
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use wxvoice::config::Config;
//!
//! let config = Config::load(None).expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `WXVOICE__<section>__<key>`
//!
//! Examples:
//! - `WXVOICE__SERVER__BIND_ADDR=0.0.0.0:80`
//! - `WXVOICE__STORAGE__DIR=/srv/wxvoice/voice`
//! - `WXVOICE__STORAGE__PUBLIC_BASE_URL=https://voice.example.com`
//!
//! The handshake token is read from `WXVOICE_TOKEN` and never from the file.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/wxvoice.toml`.
//! This can be overridden using the `WXVOICE_CONFIG` environment variable or
//! the `--config` flag.

mod models;
mod sources;
mod validation;

pub use models::{Config, DownloaderConfig, ServerConfig, StorageConfig, WechatConfig};
pub use validation::ValidationError;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// `path` takes precedence over `WXVOICE_CONFIG` and the default path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed or validation fails.
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, without the token lookup
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
