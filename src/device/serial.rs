//! Serial classification
//!
//! Derives what kind of target a serial names, purely from its text.

use once_cell::sync::Lazy;
use regex::Regex;

/// BlueStacks 4 Hyper-V Beta alias
pub const BLUESTACKS4_HYPERV: &str = "bluestacks4-hyperv";
/// BlueStacks 5 Hyper-V alias
pub const BLUESTACKS5_HYPERV: &str = "bluestacks5-hyperv";

static NETWORK_DEVICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d+\.\d+\.\d+:\d+").unwrap());
static OVER_HTTP: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://").unwrap());

/// Facts about a serial. Several may hold at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// BlueStacks 4 Hyper-V instance key, e.g. `Android_2`
    pub bluestacks4_hyperv: Option<String>,
    /// BlueStacks 5 Hyper-V parameter suffix, `Some("")` for the default instance
    pub bluestacks5_hyperv: Option<String>,
    /// Windows Subsystem for Android alias such as `wsa-0`
    pub wsa: bool,
    /// `emulator-5554` or `127.0.0.1:<port>`
    pub emulator: bool,
    /// Bare `ip:port`
    pub network_device: bool,
    /// `http://` or `https://` endpoint, e.g. an ATX agent
    pub over_http: bool,
}

impl Classification {
    /// Classify a serial
    pub fn of(serial: &str) -> Self {
        let over_http = OVER_HTTP.is_match(serial);

        // A URL is never a hypervisor alias, whatever its path says
        let (bluestacks4_hyperv, bluestacks5_hyperv) = if over_http {
            (None, None)
        } else {
            (
                alias_suffix(serial, BLUESTACKS4_HYPERV).map(|suffix| match suffix {
                    "" => "Android".to_string(),
                    n => format!("Android_{n}"),
                }),
                alias_suffix(serial, BLUESTACKS5_HYPERV).map(|suffix| match suffix {
                    "" => String::new(),
                    n => format!("_{n}"),
                }),
            )
        };

        Self {
            bluestacks4_hyperv,
            bluestacks5_hyperv,
            wsa: !over_http && serial.contains("wsa"),
            emulator: serial.starts_with("emulator-") || serial.starts_with("127.0.0.1:"),
            network_device: NETWORK_DEVICE.is_match(serial),
            over_http,
        }
    }

    pub fn is_bluestacks4_hyperv(&self) -> bool {
        self.bluestacks4_hyperv.is_some()
    }

    pub fn is_bluestacks5_hyperv(&self) -> bool {
        self.bluestacks5_hyperv.is_some()
    }

    pub fn is_bluestacks_hyperv(&self) -> bool {
        self.is_bluestacks4_hyperv() || self.is_bluestacks5_hyperv()
    }
}

/// Text after `<alias>-`, or `""` for the bare alias
fn alias_suffix<'a>(serial: &'a str, alias: &str) -> Option<&'a str> {
    let start = serial.find(alias)? + alias.len();
    let rest = &serial[start..];
    Some(rest.strip_prefix('-').unwrap_or(rest))
}
