//! Device connection module
//!
//! Turns the configured serial into a reachable ADB endpoint and hands out
//! the ADB client and device handles for it.

pub mod adb;
pub mod connection;
pub mod hyperv;
pub mod registry;
pub mod resolve;
pub mod serial;

pub use adb::{AdbClient, AdbDevice, DeviceInfo};
pub use connection::Connection;
pub use registry::{Registry, RegistryValue, SystemRegistry};
pub use resolve::{resolve, validate, Resolution};
pub use serial::Classification;

use std::path::PathBuf;

use crate::config::{ConfigError, ControlMethod, ScreenshotMethod};

/// Conditions that retrying cannot fix. The run must stop and a human must
/// change the setup.
#[derive(Debug, thiserror::Error)]
pub enum RequestHumanTakeover {
    #[error("Serial {serial} is not supported, please use \"{instead}\" or others instead")]
    UnsupportedSerial {
        serial: String,
        instead: &'static str,
    },
    #[error("Emulator instance not found: {serial}")]
    InstanceNotFound { serial: String },
    #[error("Registry value HKEY_LOCAL_MACHINE\\{key}\\{name} not found")]
    RegistryKeyMissing { key: String, name: String },
    #[error("Failed to read emulator config {path}: {source}")]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid adb port {port:?} for {serial}")]
    InvalidPort { serial: String, port: String },
    #[error(
        "When connecting a device over http: {serial} ScreenshotMethod must be \"uiautomator2\" \
         and ControlMethod must be \"uiautomator2\" or \"minitouch\", \
         got {screenshot_method} and {control_method}"
    )]
    IncompatibleMethods {
        serial: String,
        screenshot_method: ScreenshotMethod,
        control_method: ControlMethod,
    },
}

/// Device errors
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Request human takeover: {0}")]
    HumanTakeover(#[from] RequestHumanTakeover),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Connection already initialized for {current}, refusing {requested}")]
    SerialChanged { current: String, requested: String },
    #[error("ADB I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ADB protocol error: {0}")]
    Protocol(String),
    #[error("ADB server refused request: {0}")]
    Fail(String),
    #[error("Failed to decode screenshot: {0}")]
    Image(#[from] image::ImageError),
}

impl DeviceError {
    /// True for errors that must end the run instead of being retried
    pub fn is_human_takeover(&self) -> bool {
        matches!(self, DeviceError::HumanTakeover(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_takeover_is_distinguished() {
        let err: DeviceError = RequestHumanTakeover::InstanceNotFound {
            serial: "bluestacks5-hyperv-3".into(),
        }
        .into();
        assert!(err.is_human_takeover());
        assert!(err.to_string().contains("bluestacks5-hyperv-3"));

        let err = DeviceError::Protocol("short read".into());
        assert!(!err.is_human_takeover());
    }

    #[test]
    fn test_incompatible_methods_message() {
        let err = RequestHumanTakeover::IncompatibleMethods {
            serial: "http://127.0.0.1:7912".into(),
            screenshot_method: ScreenshotMethod::Adb,
            control_method: ControlMethod::MaaTouch,
        };
        let msg = err.to_string();
        assert!(msg.contains("\"uiautomator2\""));
        assert!(msg.contains("\"minitouch\""));
        assert!(msg.contains("MaaTouch"));
    }
}
