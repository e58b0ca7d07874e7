//! Host-side implementations of the platform seams.
//!
//! All mocks are cheap to clone and clones share state, so a test can hand
//! one copy to the code under test and inspect another. Time only moves when
//! a [`MockDelay`] sleeps or a [`MockEdges`] waits.

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};
use embedded_hal_async::delay::DelayNs;

use crate::debounce::Button;
use crate::http_client::CameraEndpoint;
use crate::led_control::StatusIndicator;
use crate::traits::{
    ButtonEvent, Clock, Connection, Connector, EdgeSource, RadioError, ScanEntry, TransportError,
    WifiRadio,
};
use crate::wifi::{IpInfo, LinkStatus, StaticIpConfig};

/// Manually advanced clock with microsecond resolution
#[derive(Clone, Default)]
pub struct MockClock {
    now_us: Rc<Cell<u64>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance_us(ms * 1000);
    }

    pub fn advance_us(&self, us: u64) {
        self.now_us.set(self.now_us.get() + us);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.now_us.get() / 1000
    }
}

/// Delay that returns immediately after moving the clock forward
#[derive(Clone)]
pub struct MockDelay {
    clock: MockClock,
}

impl MockDelay {
    pub fn new(clock: &MockClock) -> Self {
        Self {
            clock: clock.clone(),
        }
    }
}

impl DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.clock.advance_us(u64::from(ns) / 1000);
    }

    async fn delay_us(&mut self, us: u32) {
        self.clock.advance_us(u64::from(us));
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.clock.advance_ms(u64::from(ms));
    }
}

#[derive(Default)]
struct ConnectorState {
    fail_next: u32,
    fail_always: bool,
    failure: Option<TransportError>,
    link_drop_after: Option<usize>,
    link: Option<Rc<MockRadioState>>,
    attempts: u32,
    closed: u32,
    endpoints: Vec<CameraEndpoint>,
    requests: Vec<String>,
}

impl ConnectorState {
    fn failure_due(&mut self) -> Option<TransportError> {
        let failure = self.failure?;
        if self.fail_always {
            return Some(failure);
        }
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Some(failure);
        }
        None
    }
}

/// Records every request instead of talking to a camera
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Rc<RefCell<ConnectorState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` attempts with `error`
    pub fn fail_next(&self, count: u32, error: TransportError) {
        let mut state = self.state.borrow_mut();
        state.fail_next = count;
        state.fail_always = false;
        state.failure = Some(error);
    }

    pub fn fail_always(&self, error: TransportError) {
        let mut state = self.state.borrow_mut();
        state.fail_always = true;
        state.failure = Some(error);
    }

    /// Drop the radio's association once `requests` requests have been
    /// delivered, as if the camera went out of range right after.
    pub fn drop_link_after(&self, requests: usize, radio: &MockRadio) {
        let mut state = self.state.borrow_mut();
        state.link_drop_after = Some(requests);
        state.link = Some(radio.state.clone());
    }

    /// Connection attempts, failed ones included
    pub fn attempts(&self) -> u32 {
        self.state.borrow().attempts
    }

    pub fn closed(&self) -> u32 {
        self.state.borrow().closed
    }

    pub fn endpoints(&self) -> Vec<CameraEndpoint> {
        self.state.borrow().endpoints.clone()
    }

    /// Raw requests that were written successfully
    pub fn requests(&self) -> Vec<String> {
        self.state.borrow().requests.clone()
    }

    /// Request paths that were written successfully, in order
    pub fn paths(&self) -> Vec<String> {
        self.state
            .borrow()
            .requests
            .iter()
            .filter_map(|request| request.split(' ').nth(1))
            .map(ToString::to_string)
            .collect()
    }

    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.requests.clear();
        state.endpoints.clear();
        state.attempts = 0;
        state.closed = 0;
    }
}

impl Connector for MockConnector {
    type Connection<'c> = MockConnection;

    async fn connect(
        &mut self,
        endpoint: CameraEndpoint,
    ) -> Result<Self::Connection<'_>, TransportError> {
        let mut state = self.state.borrow_mut();
        state.attempts += 1;
        state.endpoints.push(endpoint);

        let failure = state.failure_due();
        if failure == Some(TransportError::Connect) {
            return Err(TransportError::Connect);
        }
        Ok(MockConnection {
            state: self.state.clone(),
            failure,
        })
    }
}

/// Connection handed out by [`MockConnector`]
pub struct MockConnection {
    state: Rc<RefCell<ConnectorState>>,
    failure: Option<TransportError>,
}

impl Connection for MockConnection {
    async fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if let Some(error) = self.failure {
            return Err(error);
        }
        let mut state = self.state.borrow_mut();
        state
            .requests
            .push(String::from_utf8_lossy(data).into_owned());

        let drop_now = matches!(state.link_drop_after, Some(limit) if state.requests.len() >= limit);
        if drop_now {
            state.link_drop_after = None;
            if let Some(link) = state.link.take() {
                link.connected.set(false);
            }
        }
        Ok(())
    }

    async fn close(self) {
        self.state.borrow_mut().closed += 1;
    }
}

type ScanResult = Result<Vec<String>, RadioError>;

#[derive(Default)]
struct MockRadioState {
    scans: RefCell<VecDeque<ScanResult>>,
    outcomes: RefCell<VecDeque<(Vec<LinkStatus>, bool)>>,
    pending_status: RefCell<VecDeque<LinkStatus>>,
    connected: Cell<bool>,
    active: Cell<bool>,
    scan_count: Cell<u32>,
    connect_count: Cell<u32>,
    deactivations: Cell<u32>,
    credentials: RefCell<Option<(String, String)>>,
    static_ip: Cell<Option<StaticIpConfig>>,
}

/// Scripted WiFi radio.
///
/// Scans return the queued results in order, then an empty air. Each
/// `connect` consumes one queued outcome: the listed statuses are reported
/// first, then the association succeeds or fails. Without a queued outcome
/// the association succeeds at once.
#[derive(Clone, Default)]
pub struct MockRadio {
    state: Rc<MockRadioState>,
}

impl MockRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_scan(&self, ssids: &[&str]) {
        self.state
            .scans
            .borrow_mut()
            .push_back(Ok(ssids.iter().map(|s| s.to_string()).collect()));
    }

    pub fn push_scan_error(&self) {
        self.state
            .scans
            .borrow_mut()
            .push_back(Err(RadioError::Driver));
    }

    pub fn connect_outcome(&self, statuses: &[LinkStatus], connects: bool) {
        self.state
            .outcomes
            .borrow_mut()
            .push_back((statuses.to_vec(), connects));
    }

    /// Force the association state, e.g. to simulate the camera going away
    pub fn set_connected(&self, connected: bool) {
        self.state.connected.set(connected);
    }

    pub fn scans(&self) -> u32 {
        self.state.scan_count.get()
    }

    pub fn connects(&self) -> u32 {
        self.state.connect_count.get()
    }

    pub fn deactivations(&self) -> u32 {
        self.state.deactivations.get()
    }

    pub fn is_active(&self) -> bool {
        self.state.active.get()
    }

    pub fn last_credentials(&self) -> Option<(String, String)> {
        self.state.credentials.borrow().clone()
    }

    pub fn static_ip(&self) -> Option<StaticIpConfig> {
        self.state.static_ip.get()
    }
}

impl WifiRadio for MockRadio {
    async fn activate(&mut self) -> Result<(), RadioError> {
        self.state.active.set(true);
        Ok(())
    }

    async fn deactivate(&mut self) -> Result<(), RadioError> {
        self.state.deactivations.set(self.state.deactivations.get() + 1);
        self.state.active.set(false);
        self.state.connected.set(false);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), RadioError> {
        self.state.connected.set(false);
        Ok(())
    }

    async fn scan(&mut self) -> Result<Vec<ScanEntry>, RadioError> {
        if !self.state.active.get() {
            return Err(RadioError::NotStarted);
        }
        self.state.scan_count.set(self.state.scan_count.get() + 1);
        let next = self.state.scans.borrow_mut().pop_front();
        match next {
            Some(Ok(ssids)) => Ok(ssids
                .iter()
                .enumerate()
                .map(|(i, ssid)| ScanEntry::new(ssid, 1 + i as u8, -40 - i as i8))
                .collect()),
            Some(Err(e)) => Err(e),
            None => Ok(Vec::new()),
        }
    }

    async fn connect(&mut self, essid: &str, password: &str) -> Result<(), RadioError> {
        if !self.state.active.get() {
            return Err(RadioError::NotStarted);
        }
        self.state
            .connect_count
            .set(self.state.connect_count.get() + 1);
        *self.state.credentials.borrow_mut() = Some((essid.to_string(), password.to_string()));

        let (statuses, connects) = self
            .state
            .outcomes
            .borrow_mut()
            .pop_front()
            .unwrap_or((Vec::new(), true));
        *self.state.pending_status.borrow_mut() = statuses.into();
        self.state.connected.set(connects);
        Ok(())
    }

    fn status(&mut self) -> LinkStatus {
        if let Some(status) = self.state.pending_status.borrow_mut().pop_front() {
            return status;
        }
        if self.state.connected.get() {
            LinkStatus::GotIp
        } else {
            LinkStatus::ConnectFailOther
        }
    }

    fn is_connected(&mut self) -> bool {
        self.state.pending_status.borrow().is_empty() && self.state.connected.get()
    }

    fn apply_static_ip(&mut self, config: &StaticIpConfig) -> Result<(), RadioError> {
        self.state.static_ip.set(Some(*config));
        Ok(())
    }

    fn ip_info(&self) -> Option<IpInfo> {
        if !self.state.connected.get() {
            return None;
        }
        Some(match self.state.static_ip.get() {
            Some(config) => IpInfo {
                address: config.address,
                prefix_len: config.prefix_len,
                gateway: Some(config.gateway),
            },
            None => IpInfo {
                address: [10, 5, 5, 100],
                prefix_len: 24,
                gateway: Some([10, 5, 5, 9]),
            },
        })
    }
}

/// Records blink bursts
#[derive(Clone, Default)]
pub struct MockIndicator {
    blinks: Rc<RefCell<Vec<u8>>>,
}

impl MockIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blinks(&self) -> Vec<u8> {
        self.blinks.borrow().clone()
    }
}

impl StatusIndicator for MockIndicator {
    async fn blink(&mut self, times: u8) {
        self.blinks.borrow_mut().push(times);
    }
}

/// Output pin that remembers every level written
#[derive(Clone, Default)]
pub struct MockPin {
    levels: Rc<RefCell<Vec<bool>>>,
}

impl MockPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn levels(&self) -> Vec<bool> {
        self.levels.borrow().clone()
    }
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.levels.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.levels.borrow_mut().push(true);
        Ok(())
    }
}

#[derive(Default)]
struct EdgeState {
    pending: VecDeque<ButtonEvent>,
    registered: Vec<(Button, u8)>,
}

/// Scripted button edges.
///
/// Waiting for an edge moves the clock to the edge's timestamp; waiting with
/// nothing queued moves it by the idle timeout.
#[derive(Clone)]
pub struct MockEdges {
    clock: MockClock,
    state: Rc<RefCell<EdgeState>>,
}

impl MockEdges {
    pub fn new(clock: &MockClock) -> Self {
        Self {
            clock: clock.clone(),
            state: Rc::default(),
        }
    }

    pub fn press(&self, button: Button, at_ms: u64) {
        self.state
            .borrow_mut()
            .pending
            .push_back(ButtonEvent { button, at_ms });
    }

    pub fn pending(&self) -> usize {
        self.state.borrow().pending.len()
    }

    pub fn registered(&self) -> Vec<(Button, u8)> {
        self.state.borrow().registered.clone()
    }
}

impl EdgeSource for MockEdges {
    fn register(&mut self, button: Button, pin: u8) {
        self.state.borrow_mut().registered.push((button, pin));
    }

    async fn next_edge(&mut self, idle_ms: u32) -> Option<ButtonEvent> {
        let next = self.state.borrow_mut().pending.pop_front();
        match next {
            Some(event) => {
                let now = self.clock.now_ms();
                if event.at_ms > now {
                    self.clock.advance_ms(event.at_ms - now);
                }
                Some(event)
            }
            None => {
                self.clock.advance_ms(u64::from(idle_ms));
                None
            }
        }
    }
}
