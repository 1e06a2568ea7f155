//! devlink - Android device connection resolver for game automation
//!
//! This library turns the serial a user configured (an adb serial, a network
//! address, an http endpoint or an emulator alias such as
//! `bluestacks5-hyperv-1` or `wsa-0`) into an address adb can reach, checks
//! that the configured screenshot and control methods can work with it, and
//! provides the adb client and device handles used by screen automation.
//!
//! ## Human takeover
//!
//! Unreachable, unknown or misconfigured targets fail with
//! [`device::RequestHumanTakeover`]. Retrying does not help with any of them,
//! the run should stop and report.

pub mod config;
pub mod device;

use once_cell::sync::OnceCell;

use crate::config::Settings;
use crate::device::{Connection, DeviceError};

/// Global connection, one per process
static CONNECTION: OnceCell<Connection> = OnceCell::new();

/// Initialize the global connection
///
/// Only the first successful call resolves anything. Later calls with the same
/// serial return the existing connection, a different serial is refused.
pub fn init_connection(settings: Settings) -> Result<&'static Connection, DeviceError> {
    let requested = settings.emulator.serial.trim().to_string();
    let conn = CONNECTION.get_or_try_init(|| Connection::new(settings))?;
    if conn.configured_serial() != requested {
        log::warn!(
            "Connection already initialized for {}, ignoring serial {requested}",
            conn.configured_serial()
        );
        return Err(DeviceError::SerialChanged {
            current: conn.configured_serial().to_string(),
            requested,
        });
    }
    Ok(conn)
}

/// Get the global connection, if initialized
pub fn get_connection() -> Option<&'static Connection> {
    CONNECTION.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::connection::tests::env_lock;

    fn settings(serial: &str) -> Settings {
        let mut settings = Settings::default();
        settings.emulator.serial = serial.to_string();
        settings
    }

    #[test]
    fn test_init_connection_refuses_other_serial() {
        let _env = env_lock();

        let first = init_connection(settings("emulator-5554")).unwrap();
        assert_eq!(first.serial(), "emulator-5554");

        let again = init_connection(settings(" emulator-5554 ")).unwrap();
        assert!(std::ptr::eq(first, again));

        let err = init_connection(settings("wsa-0")).unwrap_err();
        match err {
            DeviceError::SerialChanged { current, requested } => {
                assert_eq!(current, "emulator-5554");
                assert_eq!(requested, "wsa-0");
            }
            other => panic!("Expected SerialChanged, got {other:?}"),
        }
        assert!(std::ptr::eq(get_connection().unwrap(), first));
    }
}
