#![cfg_attr(not(test), no_std)]

//! ESP32-C3 Action Camera Remote Board Library
//!
//! This library provides the modules for a WiFi camera remote: it debounces the
//! shutter and mode-wheel buttons, tracks the camera mode, keeps the board
//! associated with the camera's access point and fires HTTP GET commands at the
//! camera's control API.
//!
//! Everything outside [`board`] is hardware independent and runs on the host
//! against the `mock` seams (feature `mock`).

extern crate alloc;

pub mod camera;
pub mod controller;
pub mod debounce;
pub mod http_client;
pub mod led_control;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod state_machine;
pub mod traits;
pub mod wifi;

#[cfg(feature = "esp32c3")]
pub mod board;

use core::fmt;

use crate::http_client::CommandError;
use crate::traits::{RadioError, TransportError};
use crate::wifi::ConnectError;

/// Project version information
pub const VERSION: &str = "0.1.0-dev";

/// Default configuration constants
pub mod config {
    use crate::camera::CameraModel;
    use crate::http_client::CameraEndpoint;
    use crate::wifi::StaticIpConfig;

    /// WiFi configuration
    /// Read from environment variables at compile time
    pub const WIFI_SSID: &str = env!("WIFI_SSID");
    pub const WIFI_PASSWORD: &str = env!("WIFI_PASSWORD");

    /// Whether debug messages are logged (`DEBUG_LOG=1`)
    pub const DEBUG: bool = matches!(env!("DEBUG_LOG").as_bytes(), b"1");

    /// Camera command variant (`CAMERA_MODEL=hero5` or `hero5-session`)
    pub const CAMERA_MODEL: CameraModel = if matches!(env!("CAMERA_MODEL").as_bytes(), b"hero5") {
        CameraModel::Hero5
    } else {
        CameraModel::Hero5Session
    };

    /// The camera always serves its control API here on its own access point
    pub const CAMERA_IP: [u8; 4] = [10, 5, 5, 9];
    pub const CAMERA_PORT: u16 = 80;

    /// GPIO assignments
    pub const TRIGGER_PIN: u8 = 4;
    pub const NEXT_MODE_PIN: Option<u8> = Some(5);
    pub const PREV_MODE_PIN: Option<u8> = Some(6);
    pub const STATUS_LED_PIN: Option<u8> = Some(2);

    /// Minimum time between two accepted shutter presses
    pub const SHUTTER_INTERVAL_MS: u64 = 1000;

    /// Minimum time between two accepted mode-wheel presses
    pub const MODE_BTN_INTERVAL_MS: u64 = 400;

    /// Idle loop tick
    pub const MAIN_LOOP_SLEEP_INTERVAL_MS: u32 = 20;

    /// Delay before bring-up starts after reset
    pub const BOOT_DELAY_MS: u32 = 1000;

    /// Extra attempts after the first failed camera command
    pub const COMMAND_RETRIES: u8 = 5;

    /// Time the camera gets to act on a command before the socket is closed
    pub const COMMAND_SETTLE_MS: u32 = 500;

    /// Radio off time between two scans that did not see the camera
    pub const WIFI_RESCAN_DELAY_MS: u32 = 1000;

    /// Association status polling interval
    pub const WIFI_STATUS_POLL_MS: u32 = 500;

    /// Pause before retrying a failed association
    pub const WIFI_CONNECT_RETRY_MS: u32 = 1000;

    /// Status LED pulse length (on and off)
    pub const LED_PULSE_MS: u32 = 100;

    /// Pending button edges kept while a command is in flight
    pub const BUTTON_QUEUE_DEPTH: usize = 8;

    /// Station configuration
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WifiConfig {
        pub essid: &'static str,
        pub password: &'static str,
        /// Replaces the DHCP lease once associated when set
        pub static_ip: Option<StaticIpConfig>,
    }

    /// Button and LED pin numbers
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PinConfig {
        pub trigger: u8,
        pub next_mode: Option<u8>,
        pub prev_mode: Option<u8>,
        pub status_led: Option<u8>,
    }

    /// Complete board configuration, fixed for the lifetime of the firmware
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RemoteConfig {
        pub wifi: WifiConfig,
        pub pins: PinConfig,
        pub camera: CameraEndpoint,
        pub model: CameraModel,
        pub debug: bool,
    }

    impl RemoteConfig {
        /// Configuration baked in by `build.rs`
        pub const fn from_build_env() -> Self {
            Self {
                wifi: WifiConfig {
                    essid: WIFI_SSID,
                    password: WIFI_PASSWORD,
                    static_ip: None,
                },
                pins: PinConfig {
                    trigger: TRIGGER_PIN,
                    next_mode: NEXT_MODE_PIN,
                    prev_mode: PREV_MODE_PIN,
                    status_led: STATUS_LED_PIN,
                },
                camera: CameraEndpoint {
                    ip: CAMERA_IP,
                    port: CAMERA_PORT,
                },
                model: CAMERA_MODEL,
                debug: DEBUG,
            }
        }
    }
}

/// Error types for the camera remote board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardError {
    /// WiFi driver or radio error
    WiFiError(RadioError),
    /// Association loop was cancelled
    ConnectError(ConnectError),
    /// Camera command could not be delivered
    CommandError(CommandError),
    /// Socket level error
    TransportError(TransportError),
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardError::WiFiError(e) => write!(f, "wifi: {}", e),
            BoardError::ConnectError(e) => write!(f, "connect: {}", e),
            BoardError::CommandError(e) => write!(f, "command: {}", e),
            BoardError::TransportError(e) => write!(f, "transport: {}", e),
        }
    }
}

impl From<RadioError> for BoardError {
    fn from(e: RadioError) -> Self {
        BoardError::WiFiError(e)
    }
}

impl From<ConnectError> for BoardError {
    fn from(e: ConnectError) -> Self {
        BoardError::ConnectError(e)
    }
}

impl From<CommandError> for BoardError {
    fn from(e: CommandError) -> Self {
        BoardError::CommandError(e)
    }
}

impl From<TransportError> for BoardError {
    fn from(e: TransportError) -> Self {
        BoardError::TransportError(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn board_error_wraps_sources() {
        let err: BoardError = CommandError::Exhausted {
            attempts: 6,
            last: TransportError::Connect,
        }
        .into();
        assert_eq!(err.to_string(), "command: gave up after 6 attempts (connect failed)");

        let err = BoardError::from(ConnectError::Cancelled);
        assert_eq!(err.to_string(), "connect: association cancelled");
    }
}
