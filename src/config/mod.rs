//! Configuration module
//!
//! Handles user settings and the installation-wide deploy file.

pub mod deploy;
pub mod settings;

use std::path::PathBuf;

pub use deploy::DeployConfig;
pub use settings::{ControlMethod, EmulatorSettings, ScreenshotMethod, Settings};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid deploy TOML: {0}")]
    Toml(#[from] toml::de::Error),
}
