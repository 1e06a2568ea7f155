//! Serial resolution and method validation
//!
//! `resolve` turns an alias into the address adb should talk to, `validate`
//! refuses method combinations that cannot work for the target.

use crate::config::{ControlMethod, EmulatorSettings, ScreenshotMethod};

use super::hyperv::{Bluestacks4Registry, Bluestacks5Conf, DynamicPortSource};
use super::registry::Registry;
use super::serial::Classification;
use super::RequestHumanTakeover;

/// Fixed loopback address of Windows Subsystem for Android
pub const WSA_SERIAL: &str = "127.0.0.1:58526";
/// Alias users should write instead of [`WSA_SERIAL`]
pub const WSA_ALIAS: &str = "wsa-0";

/// Outcome of [`resolve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Address to build the adb device from
    pub serial: String,
    /// Whether the method selectors were rewritten
    pub settings_changed: bool,
}

/// Resolve `serial` into a connectable address
///
/// May rewrite the screenshot and control methods in `emulator`.
pub fn resolve(
    serial: &str,
    classification: &Classification,
    emulator: &mut EmulatorSettings,
    registry: &dyn Registry,
) -> Result<Resolution, RequestHumanTakeover> {
    let mut serial = serial.to_string();
    let mut settings_changed = false;

    if let Some(instance) = &classification.bluestacks4_hyperv {
        let port = Bluestacks4Registry::new(registry).read_dynamic_port(instance)?;
        serial = format!("127.0.0.1:{port}");
    }
    if let Some(suffix) = &classification.bluestacks5_hyperv {
        let port = Bluestacks5Conf::new(registry).read_dynamic_port(suffix)?;
        serial = format!("127.0.0.1:{port}");
    }
    if serial.contains(WSA_SERIAL) {
        log::warn!("Serial {WSA_SERIAL} seems to be WSA, please use \"{WSA_ALIAS}\" or others instead");
        return Err(RequestHumanTakeover::UnsupportedSerial {
            serial,
            instead: WSA_ALIAS,
        });
    }
    if classification.wsa {
        serial = WSA_SERIAL.to_string();
        settings_changed = emulator.force_uiautomator2();
        if settings_changed {
            log::info!("WSA only works with uiautomator2, screenshot and control methods changed");
        }
    }

    Ok(Resolution {
        serial,
        settings_changed,
    })
}

/// Check that the configured methods can work with the target
pub fn validate(
    serial: &str,
    classification: &Classification,
    emulator: &EmulatorSettings,
) -> Result<(), RequestHumanTakeover> {
    if classification.over_http
        && (emulator.screenshot_method != ScreenshotMethod::Uiautomator2
            || !matches!(
                emulator.control_method,
                ControlMethod::Uiautomator2 | ControlMethod::Minitouch
            ))
    {
        let err = RequestHumanTakeover::IncompatibleMethods {
            serial: serial.to_string(),
            screenshot_method: emulator.screenshot_method,
            control_method: emulator.control_method,
        };
        log::warn!("{err}");
        return Err(err);
    }
    Ok(())
}
