//! Dynamic adb ports of BlueStacks Hyper-V instances
//!
//! Hyper-V builds of BlueStacks pick a new adb port on every boot. BlueStacks 4
//! writes it to the registry, BlueStacks 5 writes it to `bluestacks.conf` in a
//! directory that the registry points to.

use std::fs;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;

use super::registry::Registry;
use super::RequestHumanTakeover;

const BLUESTACKS4_GUESTS_KEY: &str = r"SOFTWARE\BlueStacks_bgp64_hyperv\Guests";
const BLUESTACKS4_PORT_VALUE: &str = "BstAdbPort";
const BLUESTACKS5_KEY: &str = r"SOFTWARE\BlueStacks_nxt";
const BLUESTACKS5_DIR_VALUE: &str = "UserDefinedDir";
const BLUESTACKS5_CONF: &str = "bluestacks.conf";

/// `bst.instance.Nougat64<suffix>.status.adb_port="<port>"`
static CONF_ADB_PORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"bst\.instance\.Nougat64(_[^.]+)?\.status\.adb_port="(\d+)""#).unwrap()
});

/// Something that knows the current adb port of an emulator instance
pub trait DynamicPortSource {
    /// `instance` is whatever the source keys instances by: the guest folder
    /// for BlueStacks 4, the parameter suffix for BlueStacks 5.
    fn read_dynamic_port(&self, instance: &str) -> Result<u16, RequestHumanTakeover>;
}

/// BlueStacks 4 Hyper-V Beta, port stored in the registry
pub struct Bluestacks4Registry<'a> {
    registry: &'a dyn Registry,
}

impl<'a> Bluestacks4Registry<'a> {
    pub fn new(registry: &'a dyn Registry) -> Self {
        Self { registry }
    }
}

impl DynamicPortSource for Bluestacks4Registry<'_> {
    fn read_dynamic_port(&self, instance: &str) -> Result<u16, RequestHumanTakeover> {
        log::info!("Use BlueStacks4 Hyper-V Beta");
        log::info!("Reading Realtime adb port");

        let key = format!(r"{BLUESTACKS4_GUESTS_KEY}\{instance}\Config");
        let value = self
            .registry
            .query_value(&key, BLUESTACKS4_PORT_VALUE)
            .ok_or_else(|| {
                log::warn!("Registry value {key}\\{BLUESTACKS4_PORT_VALUE} not found");
                RequestHumanTakeover::RegistryKeyMissing {
                    key: key.clone(),
                    name: BLUESTACKS4_PORT_VALUE.to_string(),
                }
            })?;

        let port = value.as_port().ok_or_else(|| RequestHumanTakeover::InvalidPort {
            serial: instance.to_string(),
            port: value.as_string(),
        })?;
        log::info!("New adb port: {port}");
        Ok(port)
    }
}

/// BlueStacks 5 Hyper-V, port stored in `bluestacks.conf`
pub struct Bluestacks5Conf<'a> {
    registry: &'a dyn Registry,
}

impl<'a> Bluestacks5Conf<'a> {
    pub fn new(registry: &'a dyn Registry) -> Self {
        Self { registry }
    }

    fn conf_path(&self) -> Result<PathBuf, RequestHumanTakeover> {
        let directory = self
            .registry
            .query_value(BLUESTACKS5_KEY, BLUESTACKS5_DIR_VALUE)
            .ok_or_else(|| {
                log::warn!("Registry value {BLUESTACKS5_KEY}\\{BLUESTACKS5_DIR_VALUE} not found");
                RequestHumanTakeover::RegistryKeyMissing {
                    key: BLUESTACKS5_KEY.to_string(),
                    name: BLUESTACKS5_DIR_VALUE.to_string(),
                }
            })?
            .as_string();
        log::info!("Configuration file directory: {directory}");
        Ok(PathBuf::from(directory).join(BLUESTACKS5_CONF))
    }
}

impl DynamicPortSource for Bluestacks5Conf<'_> {
    fn read_dynamic_port(&self, suffix: &str) -> Result<u16, RequestHumanTakeover> {
        log::info!("Use BlueStacks5 Hyper-V");
        log::info!("Reading Realtime adb port");

        let path = self.conf_path()?;
        let content = fs::read_to_string(&path)
            .map_err(|source| RequestHumanTakeover::ConfigUnreadable { path, source })?;

        let serial = format!("bluestacks5-hyperv{}", suffix.replacen('_', "-", 1));
        let port = find_conf_port(&content, suffix).ok_or_else(|| {
            log::warn!("Did not match the result: {serial}.");
            RequestHumanTakeover::InstanceNotFound {
                serial: serial.clone(),
            }
        })?;
        log::info!("Match to dynamic port: {port}");

        port.parse().map_err(|_| RequestHumanTakeover::InvalidPort {
            serial,
            port: port.to_string(),
        })
    }
}

/// Value of `bst.instance.Nougat64<suffix>.status.adb_port="..."`
///
/// A missing line and a file in some other format look the same here.
fn find_conf_port<'c>(content: &'c str, suffix: &str) -> Option<&'c str> {
    CONF_ADB_PORT
        .captures_iter(content)
        .find(|caps| caps.get(1).map_or("", |m| m.as_str()) == suffix)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str())
}
