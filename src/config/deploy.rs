//! Deployment configuration
//!
//! Installation-level options shared by every user config, read from
//! `config/deploy.toml`.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Default location of the deploy file, relative to the working directory
pub const DEPLOY_CONFIG: &str = "./config/deploy.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Custom adb executable, may use Windows separators
    #[serde(rename = "AdbExecutable", default)]
    pub adb_executable: Option<String>,
}

impl DeployConfig {
    /// Read the deploy file, a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("No deploy config at {}", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(DEPLOY_CONFIG)
    }
}
