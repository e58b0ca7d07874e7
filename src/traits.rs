//! Platform seams consumed by the remote core.
//!
//! The core never touches esp-hal or esp-wifi directly. The firmware provides
//! implementations of these traits in [`crate::board`]; host tests use the ones
//! in [`crate::mock`].

use core::fmt;

use alloc::vec::Vec;
use heapless::Vec as BoundedVec;

use crate::debounce::Button;
use crate::http_client::CameraEndpoint;
use crate::wifi::{IpInfo, LinkStatus, StaticIpConfig};

/// Monotonic millisecond clock.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Falling-edge delivery for the button lines.
#[allow(async_fn_in_trait)]
pub trait EdgeSource {
    /// Arm edge detection for `button`, wired to GPIO `pin`.
    fn register(&mut self, button: Button, pin: u8);

    /// Next edge in arrival order, or `None` once `idle_ms` passes without one.
    async fn next_edge(&mut self, idle_ms: u32) -> Option<ButtonEvent>;
}

/// A falling edge on one of the button lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub button: Button,
    /// Clock time of the edge
    pub at_ms: u64,
}

/// Maximum SSID length in bytes (802.11)
pub const SSID_MAX_LEN: usize = 32;

/// One access point seen by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    /// Raw SSID bytes as broadcast
    pub ssid: BoundedVec<u8, SSID_MAX_LEN>,
    pub channel: u8,
    pub rssi: i8,
}

impl ScanEntry {
    pub fn new(ssid: &str, channel: u8, rssi: i8) -> Self {
        let mut raw = BoundedVec::new();
        for &b in ssid.as_bytes().iter().take(SSID_MAX_LEN) {
            let _ = raw.push(b);
        }
        Self {
            ssid: raw,
            channel,
            rssi,
        }
    }

    /// SSID decoded as text, `None` when it is not valid UTF-8
    pub fn name(&self) -> Option<&str> {
        core::str::from_utf8(&self.ssid).ok()
    }
}

/// Errors reported by the WiFi driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    /// Driver call failed
    Driver,
    /// ESSID or password rejected by the driver (too long, bad characters)
    InvalidConfig,
    /// Operation needs an active station interface
    NotStarted,
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadioError::Driver => f.write_str("driver error"),
            RadioError::InvalidConfig => f.write_str("invalid station configuration"),
            RadioError::NotStarted => f.write_str("station interface not started"),
        }
    }
}

/// Station-mode WiFi interface.
#[allow(async_fn_in_trait)]
pub trait WifiRadio {
    /// Create (if needed) and start the station interface.
    async fn activate(&mut self) -> Result<(), RadioError>;

    /// Stop the station interface.
    async fn deactivate(&mut self) -> Result<(), RadioError>;

    /// Drop the current association, if any.
    async fn disconnect(&mut self) -> Result<(), RadioError>;

    /// Scan for access points.
    async fn scan(&mut self) -> Result<Vec<ScanEntry>, RadioError>;

    /// Start associating; progress is observed through [`WifiRadio::status`].
    async fn connect(&mut self, essid: &str, password: &str) -> Result<(), RadioError>;

    /// Current association status.
    fn status(&mut self) -> LinkStatus;

    /// Associated and holding an address.
    fn is_connected(&mut self) -> bool;

    /// Replace the DHCP configuration with a fixed one.
    fn apply_static_ip(&mut self, config: &StaticIpConfig) -> Result<(), RadioError>;

    /// Current address configuration, when available.
    fn ip_info(&self) -> Option<IpInfo>;
}

/// Socket level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// TCP connect failed or timed out
    Connect,
    /// Writing the request failed
    Write,
    /// Peer closed the connection
    Closed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Connect => f.write_str("connect failed"),
            TransportError::Write => f.write_str("write failed"),
            TransportError::Closed => f.write_str("connection closed by peer"),
        }
    }
}

/// Opens TCP connections to the camera.
#[allow(async_fn_in_trait)]
pub trait Connector {
    type Connection<'c>: Connection
    where
        Self: 'c;

    /// Open a fresh connection. The connection borrows the connector, so at
    /// most one socket exists at a time.
    async fn connect(
        &mut self,
        endpoint: CameraEndpoint,
    ) -> Result<Self::Connection<'_>, TransportError>;
}

/// One open TCP connection.
#[allow(async_fn_in_trait)]
pub trait Connection: Sized {
    async fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Close the connection; errors are irrelevant at this point.
    async fn close(self);
}
