//! WiFi module for the camera remote
//!
//! Keeps the board associated with the camera's access point. The camera only
//! raises its access point once it is switched on, so the connection manager
//! waits for it indefinitely: scan, and if the ESSID is missing power-cycle the
//! radio and scan again.

use core::fmt;
use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use embedded_hal_async::delay::DelayNs;
use log::{debug, info, warn};

use crate::config::{self, WifiConfig};
use crate::led_control::{LedStatus, StatusIndicator};
use crate::traits::{Clock, WifiRadio};

/// Link state as seen by the rest of the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiLinkState {
    Disconnected,
    ScanningForSsid,
    Associating,
    Connected,
}

/// Driver association status. Only used for diagnostics and for the
/// "still connecting" poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Idle,
    Connecting,
    WrongPassword,
    NoAccessPointFound,
    ConnectFailOther,
    GotIp,
}

impl LinkStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            LinkStatus::Idle => "STAT_IDLE - no connection and no activity",
            LinkStatus::Connecting => "STAT_CONNECTING - connecting in progress",
            LinkStatus::WrongPassword => "STAT_WRONG_PASSWORD - failed due to incorrect password",
            LinkStatus::NoAccessPointFound => {
                "STAT_NO_AP_FOUND - failed because no access point replied"
            }
            LinkStatus::ConnectFailOther => "STAT_CONNECT_FAIL - failed due to other problems",
            LinkStatus::GotIp => "STAT_GOT_IP - connection successful",
        }
    }
}

/// Fixed address used instead of DHCP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticIpConfig {
    pub address: [u8; 4],
    pub prefix_len: u8,
    pub gateway: [u8; 4],
    pub dns: [u8; 4],
}

impl StaticIpConfig {
    /// The address plan of the camera's own access point
    pub const CAMERA_AP: StaticIpConfig = StaticIpConfig {
        address: [10, 5, 5, 8],
        prefix_len: 24,
        gateway: [10, 5, 5, 1],
        dns: [8, 8, 8, 8],
    };
}

/// Address configuration reported by the network stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpInfo {
    pub address: [u8; 4],
    pub prefix_len: u8,
    pub gateway: Option<[u8; 4]>,
}

impl fmt::Display for IpInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = self.address;
        write!(f, "{}.{}.{}.{}/{}", a[0], a[1], a[2], a[3], self.prefix_len)?;
        if let Some(gw) = self.gateway {
            write!(f, " gw {}.{}.{}.{}", gw[0], gw[1], gw[2], gw[3])?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct LinkFields {
    state: WifiLinkState,
    waiting_since_ms: Option<u64>,
    toggle_cycles: u32,
    cancel: bool,
}

/// Shared view of the link.
///
/// Written only by the [`ConnectionManager`]; the command client and the
/// controller read it. Besides the state it records since when the manager
/// has been waiting for the camera, how many radio power cycles that took,
/// and carries a cancellation request for the association loop.
pub struct LinkState {
    inner: Mutex<CriticalSectionRawMutex, Cell<LinkFields>>,
}

impl LinkState {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(LinkFields {
                state: WifiLinkState::Disconnected,
                waiting_since_ms: None,
                toggle_cycles: 0,
                cancel: false,
            })),
        }
    }

    fn read(&self) -> LinkFields {
        self.inner.lock(|fields| fields.get())
    }

    fn update<T>(&self, f: impl FnOnce(&mut LinkFields) -> T) -> T {
        self.inner.lock(|cell| {
            let mut fields = cell.get();
            let result = f(&mut fields);
            cell.set(fields);
            result
        })
    }

    pub fn state(&self) -> WifiLinkState {
        self.read().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == WifiLinkState::Connected
    }

    /// Record a new state. Entering a waiting state starts the wait clock,
    /// `Connected` and `Disconnected` clear it.
    pub fn set_state(&self, state: WifiLinkState, now_ms: u64) {
        self.update(|fields| {
            match state {
                WifiLinkState::ScanningForSsid | WifiLinkState::Associating => {
                    if fields.waiting_since_ms.is_none() {
                        fields.waiting_since_ms = Some(now_ms);
                    }
                }
                WifiLinkState::Connected | WifiLinkState::Disconnected => {
                    fields.waiting_since_ms = None;
                }
            }
            fields.state = state;
        });
    }

    /// Clock time the current wait started, if waiting
    pub fn waiting_since_ms(&self) -> Option<u64> {
        self.read().waiting_since_ms
    }

    /// Radio power cycles performed while waiting for the ESSID to appear
    pub fn toggle_cycles(&self) -> u32 {
        self.read().toggle_cycles
    }

    fn record_toggle(&self) {
        self.update(|fields| fields.toggle_cycles = fields.toggle_cycles.saturating_add(1));
    }

    fn reset_toggles(&self) {
        self.update(|fields| fields.toggle_cycles = 0);
    }

    /// Ask a running association loop to give up at its next cycle.
    ///
    /// The request is consumed by the loop that sees it. It ends that one
    /// wait; the controller starts a fresh wait on its next step, with the
    /// link `Disconnected` and the toggle count reset.
    pub fn request_cancel(&self) {
        self.update(|fields| fields.cancel = true);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.read().cancel
    }

    fn take_cancel(&self) -> bool {
        self.update(|fields| core::mem::replace(&mut fields.cancel, false))
    }
}

impl Default for LinkState {
    fn default() -> Self {
        Self::new()
    }
}

/// Association can only stop early when asked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectError {
    Cancelled,
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectError::Cancelled => f.write_str("association cancelled"),
        }
    }
}

/// Result of [`ConnectionManager::monitor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Unchanged,
    Lost,
    Restored,
}

/// WiFi manager for the camera access point
pub struct ConnectionManager<'a, R, D, C> {
    radio: R,
    delay: D,
    clock: C,
    link: &'a LinkState,
    config: WifiConfig,
    interface_up: bool,
}

impl<'a, R, D, C> ConnectionManager<'a, R, D, C>
where
    R: WifiRadio,
    D: DelayNs,
    C: Clock,
{
    /// Create a new WiFi manager instance
    pub fn new(radio: R, delay: D, clock: C, link: &'a LinkState, config: WifiConfig) -> Self {
        Self {
            radio,
            delay,
            clock,
            link,
            config,
            interface_up: false,
        }
    }

    pub fn link(&self) -> &'a LinkState {
        self.link
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Block until associated with the configured ESSID.
    ///
    /// Never gives up on its own: a missing access point or a failed
    /// association is retried forever. Only a cancellation request on the
    /// [`LinkState`] ends the loop early.
    pub async fn ensure_connected<L: StatusIndicator>(
        &mut self,
        indicator: &mut L,
    ) -> Result<(), ConnectError> {
        info!("[WIFI] Setting up WiFi");

        if !self.interface_up {
            self.bring_interface_up().await;
        }

        self.link
            .set_state(WifiLinkState::ScanningForSsid, self.clock.now_ms());
        self.link.reset_toggles();

        while !self.essid_seen().await {
            self.check_cancel()?;
            indicator.show(LedStatus::CameraNotFound).await;
            self.power_cycle_radio().await;
            self.link.record_toggle();
        }

        self.link
            .set_state(WifiLinkState::Associating, self.clock.now_ms());
        self.associate(indicator).await?;

        if let Some(static_ip) = self.config.static_ip {
            match self.radio.apply_static_ip(&static_ip) {
                Ok(()) => info!(
                    "[WIFI] Static IP {}.{}.{}.{}/{} applied",
                    static_ip.address[0],
                    static_ip.address[1],
                    static_ip.address[2],
                    static_ip.address[3],
                    static_ip.prefix_len
                ),
                Err(e) => warn!("[WIFI] Failed to apply static IP: {}", e),
            }
        }

        match self.radio.ip_info() {
            Some(ip) => info!("[WIFI] Interface config: {}", ip),
            None => info!("[WIFI] Interface config not yet available"),
        }

        self.link
            .set_state(WifiLinkState::Connected, self.clock.now_ms());
        info!("[WIFI] Connected to {}", self.config.essid);
        Ok(())
    }

    /// Compare the cached link flag with the radio and update it
    pub fn monitor(&mut self) -> LinkEvent {
        let radio_connected = self.radio.is_connected();
        let was_connected = self.link.is_connected();

        if was_connected && !radio_connected {
            warn!("[WIFI] WiFi connection lost!");
            self.link
                .set_state(WifiLinkState::Disconnected, self.clock.now_ms());
            LinkEvent::Lost
        } else if !was_connected
            && radio_connected
            && self.link.state() == WifiLinkState::Disconnected
        {
            info!("[WIFI] WiFi connection restored!");
            self.link
                .set_state(WifiLinkState::Connected, self.clock.now_ms());
            LinkEvent::Restored
        } else {
            LinkEvent::Unchanged
        }
    }

    /// Check if WiFi is connected
    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    async fn bring_interface_up(&mut self) {
        loop {
            match self.radio.activate().await {
                Ok(()) => {
                    self.interface_up = true;
                    return;
                }
                Err(e) => {
                    warn!("[WIFI] Failed to start station interface: {}", e);
                    self.delay.delay_ms(config::WIFI_CONNECT_RETRY_MS).await;
                }
            }
        }
    }

    async fn essid_seen(&mut self) -> bool {
        match self.radio.scan().await {
            Ok(entries) => {
                let seen = entries
                    .iter()
                    .any(|entry| entry.name() == Some(self.config.essid));
                if seen {
                    debug!("[WIFI] ESSID {} found!", self.config.essid);
                } else {
                    debug!(
                        "[WIFI] ESSID {} not found among {} networks",
                        self.config.essid,
                        entries.len()
                    );
                }
                seen
            }
            Err(e) => {
                warn!("[WIFI] Scan failed: {}", e);
                false
            }
        }
    }

    /// Radio off, wait, radio on
    async fn power_cycle_radio(&mut self) {
        if let Err(e) = self.radio.disconnect().await {
            debug!("[WIFI] Disconnect before power cycle failed: {}", e);
        }
        if let Err(e) = self.radio.deactivate().await {
            debug!("[WIFI] Deactivate failed: {}", e);
        }
        self.delay.delay_ms(config::WIFI_RESCAN_DELAY_MS).await;
        if let Err(e) = self.radio.activate().await {
            warn!("[WIFI] Reactivate failed: {}", e);
        }
    }

    async fn associate<L: StatusIndicator>(&mut self, indicator: &mut L) -> Result<(), ConnectError> {
        loop {
            self.check_cancel()?;
            indicator.show(LedStatus::Associating).await;
            debug!(
                "[WIFI] Trying to connect to {} (password length {})",
                self.config.essid,
                self.config.password.len()
            );
            if let Err(e) = self
                .radio
                .connect(self.config.essid, self.config.password)
                .await
            {
                warn!("[WIFI] Connect request failed: {}", e);
            }

            while self.radio.status() == LinkStatus::Connecting {
                debug!("[WIFI] Status: {}", LinkStatus::Connecting.as_str());
                self.delay.delay_ms(config::WIFI_STATUS_POLL_MS).await;
                indicator.show(LedStatus::ConnectionPending).await;
            }
            debug!("[WIFI] Status: {}", self.radio.status().as_str());

            if self.radio.is_connected() {
                return Ok(());
            }
            self.delay.delay_ms(config::WIFI_CONNECT_RETRY_MS).await;
        }
    }

    fn check_cancel(&mut self) -> Result<(), ConnectError> {
        if self.link.take_cancel() {
            warn!("[WIFI] Association cancelled");
            self.link
                .set_state(WifiLinkState::Disconnected, self.clock.now_ms());
            return Err(ConnectError::Cancelled);
        }
        Ok(())
    }
}
