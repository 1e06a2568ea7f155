//! User settings
//!
//! Defines the emulator options read by the connection resolver.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Main settings structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Emulator connection settings
    #[serde(default)]
    pub emulator: EmulatorSettings,
}

impl Settings {
    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write settings back as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Emulator connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmulatorSettings {
    /// Device serial, network address, URL or emulator alias
    pub serial: String,
    /// How screenshots are taken
    pub screenshot_method: ScreenshotMethod,
    /// How touches are sent
    pub control_method: ControlMethod,
}

impl Default for EmulatorSettings {
    fn default() -> Self {
        Self {
            serial: "127.0.0.1:5555".to_string(),
            screenshot_method: ScreenshotMethod::Adb,
            control_method: ControlMethod::Adb,
        }
    }
}

impl EmulatorSettings {
    /// Force both methods to uiautomator2
    ///
    /// Returns true if anything changed.
    pub fn force_uiautomator2(&mut self) -> bool {
        if self.screenshot_method == ScreenshotMethod::Uiautomator2
            && self.control_method == ControlMethod::Uiautomator2
        {
            return false;
        }
        self.screenshot_method = ScreenshotMethod::Uiautomator2;
        self.control_method = ControlMethod::Uiautomator2;
        true
    }
}

/// Screenshot mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScreenshotMethod {
    #[serde(rename = "ADB")]
    Adb,
    #[serde(rename = "ADB_nc")]
    AdbNc,
    #[serde(rename = "uiautomator2")]
    Uiautomator2,
    #[serde(rename = "aScreenCap")]
    AScreenCap,
    #[serde(rename = "aScreenCap_nc")]
    AScreenCapNc,
    #[serde(rename = "DroidCast")]
    DroidCast,
    #[serde(rename = "DroidCast_raw")]
    DroidCastRaw,
    #[serde(rename = "scrcpy")]
    Scrcpy,
}

impl ScreenshotMethod {
    /// Name as written in the settings file
    pub fn as_str(&self) -> &'static str {
        match self {
            ScreenshotMethod::Adb => "ADB",
            ScreenshotMethod::AdbNc => "ADB_nc",
            ScreenshotMethod::Uiautomator2 => "uiautomator2",
            ScreenshotMethod::AScreenCap => "aScreenCap",
            ScreenshotMethod::AScreenCapNc => "aScreenCap_nc",
            ScreenshotMethod::DroidCast => "DroidCast",
            ScreenshotMethod::DroidCastRaw => "DroidCast_raw",
            ScreenshotMethod::Scrcpy => "scrcpy",
        }
    }
}

impl fmt::Display for ScreenshotMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Touch control mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMethod {
    #[serde(rename = "ADB")]
    Adb,
    #[serde(rename = "uiautomator2")]
    Uiautomator2,
    #[serde(rename = "minitouch")]
    Minitouch,
    #[serde(rename = "Hermit")]
    Hermit,
    #[serde(rename = "MaaTouch")]
    MaaTouch,
    #[serde(rename = "scrcpy")]
    Scrcpy,
}

impl ControlMethod {
    /// Name as written in the settings file
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlMethod::Adb => "ADB",
            ControlMethod::Uiautomator2 => "uiautomator2",
            ControlMethod::Minitouch => "minitouch",
            ControlMethod::Hermit => "Hermit",
            ControlMethod::MaaTouch => "MaaTouch",
            ControlMethod::Scrcpy => "scrcpy",
        }
    }
}

impl fmt::Display for ControlMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.emulator.serial, "127.0.0.1:5555");
        assert_eq!(settings.emulator.screenshot_method, ScreenshotMethod::Adb);
        assert_eq!(settings.emulator.control_method, ControlMethod::Adb);
    }

    #[test]
    fn test_method_names_in_json() {
        let json = r#"{
            "emulator": {
                "serial": "wsa-0",
                "screenshot_method": "DroidCast_raw",
                "control_method": "MaaTouch"
            }
        }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.emulator.screenshot_method, ScreenshotMethod::DroidCastRaw);
        assert_eq!(settings.emulator.control_method, ControlMethod::MaaTouch);

        let out = serde_json::to_string(&settings).unwrap();
        assert!(out.contains("\"DroidCast_raw\""));
        assert!(out.contains("\"MaaTouch\""));
    }

    #[test]
    fn test_force_uiautomator2() {
        let mut emulator = EmulatorSettings::default();
        assert!(emulator.force_uiautomator2());
        assert!(!emulator.force_uiautomator2());
        assert_eq!(emulator.screenshot_method, ScreenshotMethod::Uiautomator2);
        assert_eq!(emulator.control_method, ControlMethod::Uiautomator2);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("alas.json");

        let mut settings = Settings::default();
        settings.emulator.serial = "bluestacks5-hyperv-1".to_string();
        settings.emulator.control_method = ControlMethod::Minitouch;
        settings.save(&path).unwrap();

        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Settings::load("/nonexistent/devlink/alas.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
