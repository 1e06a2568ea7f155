//! Connection to the configured device
//!
//! Built once per run. Construction checks the serial and the configured
//! methods, the adb client and device are only created when first used.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::adb::{
    locate_adb_binary, server_port_from_env, AdbClient, AdbDevice, ADB_SERVER_HOST,
    ADB_SERVER_PORT_ENV,
};
use super::registry::{Registry, SystemRegistry};
use super::resolve::{resolve, validate, Resolution};
use super::serial::Classification;
use super::DeviceError;
use crate::config::{DeployConfig, Settings};

/// A resolved, validated device connection
#[derive(Debug)]
pub struct Connection {
    settings: Settings,
    configured_serial: String,
    settings_changed: bool,
    serial: String,
    classification: Classification,
    adb_binary: PathBuf,
    adb_client: OnceCell<Arc<AdbClient>>,
    adb: OnceCell<Arc<AdbDevice>>,
}

impl Connection {
    /// Connect using `./config/deploy.toml` and the system registry
    pub fn new(settings: Settings) -> Result<Self, DeviceError> {
        let deploy = DeployConfig::load_default()?;
        Self::with_registry(settings, &deploy, &SystemRegistry)
    }

    pub fn with_registry(
        mut settings: Settings,
        deploy: &DeployConfig,
        registry: &dyn Registry,
    ) -> Result<Self, DeviceError> {
        log::info!("{:=^60}", " Device ");

        let adb_binary = locate_adb_binary(deploy);
        log::info!("AdbBinary: {}", adb_binary.display());

        // Device traffic must not go through a proxy
        remove_proxy_env();

        let raw = settings.emulator.serial.trim().to_string();
        let classification = Classification::of(&raw);
        let Resolution {
            serial,
            settings_changed,
        } = resolve(&raw, &classification, &mut settings.emulator, registry)?;

        let classification = if serial == raw {
            classification
        } else {
            Classification::of(&serial)
        };
        validate(&serial, &classification, &settings.emulator)?;
        log::info!("Serial: {serial}");

        Ok(Self {
            settings,
            configured_serial: raw,
            settings_changed,
            serial,
            classification,
            adb_binary,
            adb_client: OnceCell::new(),
            adb: OnceCell::new(),
        })
    }

    /// Resolved serial, never an alias
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Serial as configured, trimmed, before resolution
    pub fn configured_serial(&self) -> &str {
        &self.configured_serial
    }

    /// Classification of the resolved serial
    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    /// Settings after resolution
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Whether resolution rewrote the settings, so they should be saved
    pub fn settings_changed(&self) -> bool {
        self.settings_changed
    }

    pub fn adb_binary(&self) -> &Path {
        &self.adb_binary
    }

    /// The adb server client, created on first call
    pub fn adb_client(&self) -> &Arc<AdbClient> {
        self.adb_client.get_or_init(|| {
            let port = server_port_from_env(env::var(ADB_SERVER_PORT_ENV).ok().as_deref());
            log::info!("AdbClient: AdbClient({ADB_SERVER_HOST}, {port})");
            Arc::new(AdbClient::new(
                ADB_SERVER_HOST,
                port,
                self.adb_binary.clone(),
            ))
        })
    }

    /// The device handle for the resolved serial, created on first call
    pub fn adb(&self) -> &Arc<AdbDevice> {
        self.adb.get_or_init(|| {
            Arc::new(AdbDevice::new(
                Arc::clone(self.adb_client()),
                self.serial.clone(),
            ))
        })
    }
}

/// Drop every `*_proxy` variable from the process environment. Not restored.
fn remove_proxy_env() {
    let keys: Vec<_> = env::vars_os()
        .map(|(key, _)| key)
        .filter(|key| key.to_string_lossy().to_lowercase().ends_with("_proxy"))
        .collect();
    for key in keys {
        log::debug!("Removing proxy variable {}", key.to_string_lossy());
        env::remove_var(&key);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Mutex, MutexGuard};

    use super::*;
    use crate::config::{ControlMethod, ScreenshotMethod};
    use crate::device::hyperv::tests::FakeRegistry;
    use crate::device::registry::RegistryValue;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Serializes tests that read or modify the process environment
    pub(crate) fn env_lock() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn settings(serial: &str) -> Settings {
        let mut settings = Settings::default();
        settings.emulator.serial = serial.to_string();
        settings
    }

    fn connect(settings: Settings, registry: &FakeRegistry) -> Result<Connection, DeviceError> {
        let _env = env_lock();
        Connection::with_registry(settings, &DeployConfig::default(), registry)
    }

    #[test]
    fn test_handles_are_memoized() {
        let conn = connect(settings("emulator-5554"), &FakeRegistry::default()).unwrap();

        let _env = env_lock();
        let client = conn.adb_client();
        assert!(Arc::ptr_eq(client, conn.adb_client()));

        let device = conn.adb();
        assert!(Arc::ptr_eq(device, conn.adb()));
        assert!(Arc::ptr_eq(device.client(), client));
        assert_eq!(device.serial(), "emulator-5554");
    }

    #[test]
    fn test_configured_serial_is_kept() {
        let conn = connect(settings(" wsa-0 "), &FakeRegistry::default()).unwrap();
        assert_eq!(conn.configured_serial(), "wsa-0");
        assert_eq!(conn.serial(), "127.0.0.1:58526");
    }

    #[test]
    fn test_device_uses_resolved_serial() {
        let registry = FakeRegistry::default().with(
            r"SOFTWARE\BlueStacks_bgp64_hyperv\Guests\Android_1\Config",
            "BstAdbPort",
            RegistryValue::Dword(5575),
        );
        let conn = connect(settings(" bluestacks4-hyperv-1 "), &registry).unwrap();

        assert_eq!(conn.serial(), "127.0.0.1:5575");
        assert!(conn.classification().emulator);
        assert!(!conn.classification().is_bluestacks_hyperv());
        let _env = env_lock();
        assert_eq!(conn.adb().serial(), "127.0.0.1:5575");
        assert!(!conn.settings_changed());
    }

    #[test]
    fn test_wsa_rewrites_settings() {
        let conn = connect(settings("wsa-0"), &FakeRegistry::default()).unwrap();

        assert_eq!(conn.serial(), "127.0.0.1:58526");
        assert!(conn.settings_changed());
        let emulator = &conn.settings().emulator;
        assert_eq!(emulator.screenshot_method, ScreenshotMethod::Uiautomator2);
        assert_eq!(emulator.control_method, ControlMethod::Uiautomator2);
        // The configured alias is kept, only the connection holds the address
        assert_eq!(emulator.serial, "wsa-0");
    }

    #[test]
    fn test_fatal_conditions_request_human_takeover() {
        let registry = FakeRegistry::default();
        for serial in [
            "127.0.0.1:58526",
            "bluestacks5-hyperv-1",
            "http://127.0.0.1:7912",
        ] {
            let err = connect(settings(serial), &registry).unwrap_err();
            assert!(err.is_human_takeover(), "{serial}: {err}");
        }
    }

    #[test]
    fn test_http_with_uiautomator2() {
        let mut settings = settings("http://127.0.0.1:7912");
        settings.emulator.screenshot_method = ScreenshotMethod::Uiautomator2;
        settings.emulator.control_method = ControlMethod::Minitouch;

        let conn = connect(settings, &FakeRegistry::default()).unwrap();
        assert!(conn.classification().over_http);
        assert_eq!(conn.serial(), "http://127.0.0.1:7912");
    }

    #[test]
    fn test_proxy_variables_are_removed() {
        let _env = env_lock();
        env::set_var("DEVLINK_TEST_PROXY", "http://127.0.0.1:8080");
        env::set_var("devlink_test_proxy_keep", "1");

        Connection::with_registry(
            settings("emulator-5554"),
            &DeployConfig::default(),
            &FakeRegistry::default(),
        )
        .unwrap();

        assert!(env::var_os("DEVLINK_TEST_PROXY").is_none());
        assert!(env::var_os("devlink_test_proxy_keep").is_some());
        env::remove_var("devlink_test_proxy_keep");
    }
}
