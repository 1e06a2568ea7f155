//! ADB client and device handles
//!
//! Talks to the local adb server with its smart-socket protocol: every
//! request is a 4-digit hex length followed by the payload, every reply
//! starts with `OKAY` or `FAIL`.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use image::{ImageFormat, RgbaImage};

use super::DeviceError;
use crate::config::DeployConfig;

/// Host of the adb server
pub const ADB_SERVER_HOST: &str = "127.0.0.1";
/// Port of the adb server unless `ANDROID_ADB_SERVER_PORT` says otherwise
pub const DEFAULT_ADB_SERVER_PORT: u16 = 5037;
/// Environment variable overriding the adb server port
pub const ADB_SERVER_PORT_ENV: &str = "ANDROID_ADB_SERVER_PORT";

/// Bundled adb locations, tried in order
pub const ADB_BINARY_LIST: [&str; 3] = [
    "./bin/adb/adb.exe",
    "./toolkit/Lib/site-packages/adbutils/binaries/adb.exe",
    "/usr/bin/adb",
];

#[cfg(target_os = "windows")]
const ADB_IN_PATH: &str = "adb.exe";
#[cfg(not(target_os = "windows"))]
const ADB_IN_PATH: &str = "adb";

/// Find the adb executable
///
/// Order: `AdbExecutable` from the deploy config, the bundled list, then a
/// bare name left for the system PATH. The last one is not checked, a missing
/// adb shows up when it is first run.
pub fn locate_adb_binary(deploy: &DeployConfig) -> PathBuf {
    locate_adb_binary_in(deploy, &ADB_BINARY_LIST)
}

fn locate_adb_binary_in(deploy: &DeployConfig, candidates: &[&str]) -> PathBuf {
    if let Some(file) = &deploy.adb_executable {
        let file = PathBuf::from(file.replace('\\', "/"));
        if file.exists() {
            return absolute(&file);
        }
        log::debug!("AdbExecutable {} does not exist", file.display());
    }

    candidates
        .iter()
        .map(Path::new)
        .find(|file| file.exists())
        .map(absolute)
        .unwrap_or_else(|| PathBuf::from(ADB_IN_PATH))
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Adb server port from the value of `ANDROID_ADB_SERVER_PORT`
pub fn server_port_from_env(value: Option<&str>) -> u16 {
    match value {
        None => DEFAULT_ADB_SERVER_PORT,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            log::warn!(
                "Invalid environ variable {ADB_SERVER_PORT_ENV}={value}, using default port"
            );
            DEFAULT_ADB_SERVER_PORT
        }),
    }
}

/// A device as listed by `adb devices`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub serial: String,
    /// `device`, `offline`, `unauthorized`, ...
    pub state: String,
}

/// Connection to the local adb server
#[derive(Debug)]
pub struct AdbClient {
    host: String,
    port: u16,
    binary: PathBuf,
}

impl AdbClient {
    pub fn new(host: impl Into<String>, port: u16, binary: impl Into<PathBuf>) -> Self {
        Self {
            host: host.into(),
            port,
            binary: binary.into(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn open(&self) -> Result<AdbStream, DeviceError> {
        let stream = TcpStream::connect((self.host.as_str(), self.port))?;
        Ok(AdbStream { stream })
    }

    /// Start the adb server with the located binary
    pub fn start_server(&self) -> Result<(), DeviceError> {
        log::info!("Starting adb server: {} -P {}", self.binary.display(), self.port);
        let status = Command::new(&self.binary)
            .args(["-P", &self.port.to_string(), "start-server"])
            .status()?;
        if !status.success() {
            return Err(DeviceError::Fail(format!("adb start-server exited with {status}")));
        }
        Ok(())
    }

    /// Internal version number of the server
    pub fn server_version(&self) -> Result<u32, DeviceError> {
        let mut conn = self.open()?;
        conn.send("host:version")?;
        let version = conn.read_block()?;
        u32::from_str_radix(version.trim(), 16)
            .map_err(|_| DeviceError::Protocol(format!("bad server version {version:?}")))
    }

    /// Devices known to the server
    pub fn devices(&self) -> Result<Vec<DeviceInfo>, DeviceError> {
        let mut conn = self.open()?;
        conn.send("host:devices")?;
        let body = conn.read_block()?;
        Ok(body
            .lines()
            .filter_map(|line| {
                let mut parts = line.split_whitespace();
                Some(DeviceInfo {
                    serial: parts.next()?.to_string(),
                    state: parts.next()?.to_string(),
                })
            })
            .collect())
    }

    /// `adb connect <addr>`
    pub fn connect(&self, addr: &str) -> Result<String, DeviceError> {
        let mut conn = self.open()?;
        conn.send(&format!("host:connect:{addr}"))?;
        let msg = conn.read_block()?;
        if msg.contains("failed") || msg.contains("cannot") {
            return Err(DeviceError::Fail(msg));
        }
        log::info!("{msg}");
        Ok(msg)
    }

    /// `adb disconnect <addr>`
    pub fn disconnect(&self, addr: &str) -> Result<String, DeviceError> {
        let mut conn = self.open()?;
        conn.send(&format!("host:disconnect:{addr}"))?;
        let msg = conn.read_block()?;
        log::info!("{msg}");
        Ok(msg)
    }
}

/// One device reachable through an [`AdbClient`]
#[derive(Debug)]
pub struct AdbDevice {
    client: Arc<AdbClient>,
    serial: String,
}

impl AdbDevice {
    pub fn new(client: Arc<AdbClient>, serial: impl Into<String>) -> Self {
        Self {
            client,
            serial: serial.into(),
        }
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn client(&self) -> &Arc<AdbClient> {
        &self.client
    }

    fn open_service(&self, service: &str) -> Result<AdbStream, DeviceError> {
        let mut conn = self.client.open()?;
        conn.send(&format!("host:transport:{}", self.serial))?;
        conn.send(service)?;
        Ok(conn)
    }

    /// Run a shell command and collect its output
    pub fn shell(&self, cmd: &str) -> Result<String, DeviceError> {
        let mut conn = self.open_service(&format!("shell:{cmd}"))?;
        let output = conn.read_to_end()?;
        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    /// Capture the screen with `screencap -p`
    pub fn screenshot(&self) -> Result<RgbaImage, DeviceError> {
        let mut conn = self.open_service("exec:screencap -p")?;
        let data = conn.read_to_end()?;
        if data.is_empty() {
            return Err(DeviceError::Protocol("empty screenshot".to_string()));
        }
        Ok(image::load_from_memory_with_format(&data, ImageFormat::Png)?.to_rgba8())
    }

    /// Tap at screen coordinates
    pub fn tap(&self, x: i32, y: i32) -> Result<(), DeviceError> {
        self.shell(&format!("input tap {x} {y}"))?;
        Ok(())
    }

    /// Swipe from one point to another
    pub fn swipe(
        &self,
        start_x: i32,
        start_y: i32,
        end_x: i32,
        end_y: i32,
        duration_ms: u32,
    ) -> Result<(), DeviceError> {
        self.shell(&format!(
            "input swipe {start_x} {start_y} {end_x} {end_y} {duration_ms}"
        ))?;
        Ok(())
    }
}

/// A socket to the adb server
struct AdbStream {
    stream: TcpStream,
}

impl AdbStream {
    /// Send a request and wait for `OKAY`
    fn send(&mut self, request: &str) -> Result<(), DeviceError> {
        let message = format!("{:04x}{}", request.len(), request);
        self.stream.write_all(message.as_bytes())?;
        self.check_okay()
    }

    fn check_okay(&mut self) -> Result<(), DeviceError> {
        let mut status = [0u8; 4];
        self.stream.read_exact(&mut status)?;
        match &status {
            b"OKAY" => Ok(()),
            b"FAIL" => Err(DeviceError::Fail(self.read_block()?)),
            other => Err(DeviceError::Protocol(format!(
                "unexpected status {:?}",
                String::from_utf8_lossy(other)
            ))),
        }
    }

    /// Read a hex length-prefixed string
    fn read_block(&mut self) -> Result<String, DeviceError> {
        let mut header = [0u8; 4];
        self.stream.read_exact(&mut header)?;
        let header = String::from_utf8_lossy(&header);
        let len = usize::from_str_radix(&header, 16)
            .map_err(|_| DeviceError::Protocol(format!("bad length prefix {header:?}")))?;
        let mut body = vec![0u8; len];
        self.stream.read_exact(&mut body)?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    fn read_to_end(&mut self) -> Result<Vec<u8>, DeviceError> {
        let mut data = Vec::new();
        self.stream.read_to_end(&mut data)?;
        Ok(data)
    }
}
