//! ESP32-C3 implementations of the platform seams
//!
//! esp-wifi drives the radio, embassy-net carries the TCP connections and
//! embassy-time provides the clock. Button lines are watched by one task each
//! and their edges are funnelled through [`BUTTON_EVENTS`] to the controller.

use alloc::vec::Vec;
use embassy_net::tcp::TcpSocket;
use embassy_net::{ConfigV4, IpAddress, IpEndpoint, Ipv4Address, Ipv4Cidr, Stack, StaticConfigV4};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Instant, with_timeout};
use esp_hal::gpio::Input;
use esp_wifi::wifi::{
    AuthMethod, ClientConfiguration, Configuration, ScanConfig, WifiController, WifiState,
};
use log::{debug, info, warn};

use crate::config;
use crate::debounce::{ArmedButtons, Button};
use crate::http_client::CameraEndpoint;
use crate::traits::{
    ButtonEvent, Clock, Connection, Connector, EdgeSource, RadioError, ScanEntry, TransportError,
    WifiRadio,
};
use crate::wifi::{IpInfo, LinkStatus, StaticIpConfig};

/// Socket buffer size; requests are a few hundred bytes and responses are
/// never read
const SOCKET_BUFFER_SIZE: usize = 1024;

/// Upper bound for one TCP connect or write
const SOCKET_TIMEOUT_SECS: u64 = 10;

/// Monotonic clock backed by embassy-time
#[derive(Clone, Copy, Default)]
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now_ms(&self) -> u64 {
        Instant::now().as_millis()
    }
}

/// esp-wifi station plus the embassy-net stack running on top of it
pub struct EspRadio {
    controller: WifiController<'static>,
    stack: Stack<'static>,
    configured: bool,
    last_failure: Option<LinkStatus>,
}

impl EspRadio {
    pub fn new(controller: WifiController<'static>, stack: Stack<'static>) -> Self {
        Self {
            controller,
            stack,
            configured: false,
            last_failure: None,
        }
    }
}

impl WifiRadio for EspRadio {
    async fn activate(&mut self) -> Result<(), RadioError> {
        if !self.configured {
            // The driver refuses to start without a mode
            self.controller
                .set_configuration(&Configuration::Client(ClientConfiguration::default()))
                .map_err(|e| {
                    warn!("[WIFI] Failed to set station mode: {:?}", e);
                    RadioError::Driver
                })?;
            self.configured = true;
        }
        if matches!(self.controller.is_started(), Ok(true)) {
            return Ok(());
        }
        self.controller.start_async().await.map_err(|e| {
            warn!("[WIFI] Failed to start station: {:?}", e);
            RadioError::Driver
        })
    }

    async fn deactivate(&mut self) -> Result<(), RadioError> {
        self.controller.stop_async().await.map_err(|e| {
            debug!("[WIFI] Stop failed: {:?}", e);
            RadioError::Driver
        })
    }

    async fn disconnect(&mut self) -> Result<(), RadioError> {
        if !matches!(self.controller.is_connected(), Ok(true)) {
            return Ok(());
        }
        self.controller.disconnect_async().await.map_err(|e| {
            debug!("[WIFI] Disconnect failed: {:?}", e);
            RadioError::Driver
        })
    }

    async fn scan(&mut self) -> Result<Vec<ScanEntry>, RadioError> {
        let found = self
            .controller
            .scan_with_config_async(ScanConfig::default())
            .await
            .map_err(|e| {
                debug!("[WIFI] Scan failed: {:?}", e);
                RadioError::NotStarted
            })?;

        Ok(found
            .iter()
            .map(|ap| ScanEntry::new(ap.ssid.as_str(), ap.channel, ap.signal_strength))
            .collect())
    }

    async fn connect(&mut self, essid: &str, password: &str) -> Result<(), RadioError> {
        let client_config = ClientConfiguration {
            ssid: essid.try_into().map_err(|_| RadioError::InvalidConfig)?,
            password: password.try_into().map_err(|_| RadioError::InvalidConfig)?,
            auth_method: if password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        };

        self.controller
            .set_configuration(&Configuration::Client(client_config))
            .map_err(|_| RadioError::InvalidConfig)?;

        self.last_failure = None;
        self.controller.connect_async().await.map_err(|e| {
            debug!("[WIFI] Association failed: {:?}", e);
            self.last_failure = Some(LinkStatus::ConnectFailOther);
            RadioError::Driver
        })
    }

    fn status(&mut self) -> LinkStatus {
        match esp_wifi::wifi::sta_state() {
            // Associated but still waiting for the DHCP lease
            WifiState::StaConnected if self.stack.is_config_up() => LinkStatus::GotIp,
            WifiState::StaConnected => LinkStatus::Connecting,
            WifiState::StaDisconnected => self
                .last_failure
                .unwrap_or(LinkStatus::NoAccessPointFound),
            _ => LinkStatus::Idle,
        }
    }

    fn is_connected(&mut self) -> bool {
        matches!(self.controller.is_connected(), Ok(true)) && self.stack.is_config_up()
    }

    fn apply_static_ip(&mut self, config: &StaticIpConfig) -> Result<(), RadioError> {
        let mut dns_servers = heapless::Vec::new();
        let [a, b, c, d] = config.dns;
        let _ = dns_servers.push(Ipv4Address::new(a, b, c, d));

        let [a, b, c, d] = config.address;
        let address = Ipv4Cidr::new(Ipv4Address::new(a, b, c, d), config.prefix_len);
        let [a, b, c, d] = config.gateway;

        self.stack.set_config_v4(ConfigV4::Static(StaticConfigV4 {
            address,
            gateway: Some(Ipv4Address::new(a, b, c, d)),
            dns_servers,
        }));
        Ok(())
    }

    fn ip_info(&self) -> Option<IpInfo> {
        let config = self.stack.config_v4()?;
        Some(IpInfo {
            address: config.address.address().octets(),
            prefix_len: config.address.prefix_len(),
            gateway: config.gateway.map(|gw| gw.octets()),
        })
    }
}

/// Opens one embassy-net TCP socket per command
pub struct TcpConnector {
    stack: Stack<'static>,
    rx_buffer: [u8; SOCKET_BUFFER_SIZE],
    tx_buffer: [u8; SOCKET_BUFFER_SIZE],
}

impl TcpConnector {
    pub fn new(stack: Stack<'static>) -> Self {
        Self {
            stack,
            rx_buffer: [0; SOCKET_BUFFER_SIZE],
            tx_buffer: [0; SOCKET_BUFFER_SIZE],
        }
    }
}

impl Connector for TcpConnector {
    type Connection<'c> = TcpConnection<'c>;

    async fn connect(
        &mut self,
        endpoint: CameraEndpoint,
    ) -> Result<Self::Connection<'_>, TransportError> {
        let mut socket = TcpSocket::new(self.stack, &mut self.rx_buffer, &mut self.tx_buffer);
        socket.set_timeout(Some(Duration::from_secs(SOCKET_TIMEOUT_SECS)));

        let [a, b, c, d] = endpoint.ip;
        let remote = IpEndpoint::new(IpAddress::Ipv4(Ipv4Address::new(a, b, c, d)), endpoint.port);
        if let Err(e) = socket.connect(remote).await {
            debug!("[HTTP] Connect to {}:{} failed: {:?}", endpoint, endpoint.port, e);
            socket.abort();
            return Err(TransportError::Connect);
        }
        Ok(TcpConnection { socket })
    }
}

pub struct TcpConnection<'c> {
    socket: TcpSocket<'c>,
}

impl Connection for TcpConnection<'_> {
    async fn write_all(&mut self, mut data: &[u8]) -> Result<(), TransportError> {
        while !data.is_empty() {
            match self.socket.write(data).await {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => data = &data[n..],
                Err(e) => {
                    debug!("[HTTP] Write failed: {:?}", e);
                    return Err(TransportError::Write);
                }
            }
        }
        self.socket.flush().await.map_err(|_| TransportError::Write)
    }

    async fn close(mut self) {
        self.socket.close();
        let _ = self.socket.flush().await;
        self.socket.abort();
    }
}

/// Button edges waiting for the controller
pub static BUTTON_EVENTS: Channel<CriticalSectionRawMutex, ButtonEvent, { config::BUTTON_QUEUE_DEPTH }> =
    Channel::new();

static ARMED_BUTTONS: ArmedButtons = ArmedButtons::new();

/// Watches one button line. Edges that arrive before the board is configured are
/// dropped.
#[embassy_executor::task(pool_size = 3)]
pub async fn button_task(mut input: Input<'static>, button: Button) -> ! {
    loop {
        input.wait_for_falling_edge().await;
        if !ARMED_BUTTONS.is_armed(button) {
            continue;
        }
        let event = ButtonEvent {
            button,
            at_ms: Instant::now().as_millis(),
        };
        if BUTTON_EVENTS.try_send(event).is_err() {
            warn!("[BUTTON] Queue full, {:?} press dropped", button);
        }
    }
}

/// Controller side of [`BUTTON_EVENTS`]
#[derive(Default)]
pub struct QueuedEdges;

impl EdgeSource for QueuedEdges {
    fn register(&mut self, button: Button, pin: u8) {
        debug!("[BUTTON] Arming {:?} on GPIO{}", button, pin);
        ARMED_BUTTONS.arm(button);
    }

    async fn next_edge(&mut self, idle_ms: u32) -> Option<ButtonEvent> {
        with_timeout(
            Duration::from_millis(u64::from(idle_ms)),
            BUTTON_EVENTS.receive(),
        )
        .await
        .ok()
    }
}

/// Install esp-println as the `log` backend
pub fn init_logger(debug: bool) {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    esp_println::logger::init_logger(level);
    info!("[MAIN] Log level {:?}", level);
}
