//! Button handling and orchestration.
//!
//! [`TriggerController`] owns every piece of the remote and runs the
//! [`SystemStateMachine`]: it executes the actions of the current state and
//! feeds the outcomes back as events. Once the camera is configured it serves
//! button presses one at a time, in arrival order.

use log::{debug, error, info, warn};

use crate::BoardError;
use crate::camera::{CameraModeModel, Direction, PAIR_COMPLETE};
use crate::config::{self, PinConfig, RemoteConfig};
use crate::debounce::{Button, DebounceTimer};
use crate::http_client::{CommandClient, CommandError};
use crate::led_control::StatusIndicator;
use crate::state_machine::{Action, SystemEvent, SystemState, SystemStateMachine};
use crate::traits::{ButtonEvent, Clock, Connector, EdgeSource, WifiRadio};
use crate::wifi::{ConnectionManager, LinkEvent};

use embedded_hal_async::delay::DelayNs;

/// What became of one button press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Press {
    /// Accepted and the commands were delivered
    Accepted,
    /// Dropped by the debounce window
    Suppressed,
}

pub struct TriggerController<'a, R, K, D, C, E, L> {
    wifi: ConnectionManager<'a, R, D, C>,
    client: CommandClient<'a, K, D>,
    edges: E,
    indicator: L,
    pins: PinConfig,
    debounce: DebounceTimer,
    camera: CameraModeModel,
    state: SystemStateMachine,
}

impl<'a, R, K, D, C, E, L> TriggerController<'a, R, K, D, C, E, L>
where
    R: WifiRadio,
    K: Connector,
    D: DelayNs,
    C: Clock,
    E: EdgeSource,
    L: StatusIndicator,
{
    /// Debounce windows start now, so presses right after construction are
    /// dropped.
    pub fn new(
        wifi: ConnectionManager<'a, R, D, C>,
        client: CommandClient<'a, K, D>,
        edges: E,
        indicator: L,
        config: &RemoteConfig,
    ) -> Self {
        let now = wifi.clock().now_ms();
        Self {
            wifi,
            client,
            edges,
            indicator,
            pins: config.pins,
            debounce: DebounceTimer::new(now),
            camera: CameraModeModel::new(config.model),
            state: SystemStateMachine::new(),
        }
    }

    pub fn camera(&self) -> &CameraModeModel {
        &self.camera
    }

    pub fn system_state(&self) -> SystemState {
        self.state.current_state()
    }

    pub fn is_connected(&self) -> bool {
        self.wifi.is_connected()
    }

    /// Arm falling-edge detection on the configured button pins
    pub fn configure_board(&mut self) {
        info!("[BOARD] Trigger button on GPIO{}", self.pins.trigger);
        self.edges.register(Button::Trigger, self.pins.trigger);

        if let Some(pin) = self.pins.next_mode {
            info!("[BOARD] Next-mode button on GPIO{}", pin);
            self.edges.register(Button::NextMode, pin);
        }
        if let Some(pin) = self.pins.prev_mode {
            info!("[BOARD] Prev-mode button on GPIO{}", pin);
            self.edges.register(Button::PrevMode, pin);
        }
    }

    /// Pair with the camera, then put it in the tracked mode
    pub async fn configure_camera(&mut self) -> Result<(), CommandError> {
        info!("[CAMERA] Pairing with camera at {}", self.client.endpoint());
        self.client.send(PAIR_COMPLETE).await?;
        self.send_current_mode().await
    }

    async fn send_current_mode(&mut self) -> Result<(), CommandError> {
        let mode = self.camera.command_for_current();
        info!("[CAMERA] Switching to {}", mode.mode.name());
        for &command in mode.commands {
            self.client.send(command).await?;
        }
        Ok(())
    }

    /// Shutter press at `at_ms`.
    ///
    /// In video mode this toggles recording, otherwise it takes a picture.
    pub async fn on_trigger_edge(&mut self, at_ms: u64) -> Result<Press, CommandError> {
        if !self.debounce.should_accept(Button::Trigger, at_ms) {
            return Ok(Press::Suppressed);
        }
        let command = self.camera.shutter_command();
        info!("[BUTTON] Trigger in {} mode", self.camera.current().name());
        self.client.send(command).await?;
        Ok(Press::Accepted)
    }

    /// Mode-wheel press at `at_ms`. Both mode buttons share one window.
    pub async fn on_mode_wheel_edge(
        &mut self,
        direction: Direction,
        at_ms: u64,
    ) -> Result<Press, CommandError> {
        let button = match direction {
            Direction::Next => Button::NextMode,
            Direction::Prev => Button::PrevMode,
        };
        if !self.debounce.should_accept(button, at_ms) {
            return Ok(Press::Suppressed);
        }
        self.camera.advance(direction);
        self.send_current_mode().await?;
        Ok(Press::Accepted)
    }

    pub async fn handle_event(&mut self, event: ButtonEvent) -> Result<Press, CommandError> {
        match event.button {
            Button::Trigger => self.on_trigger_edge(event.at_ms).await,
            Button::NextMode => self.on_mode_wheel_edge(Direction::Next, event.at_ms).await,
            Button::PrevMode => self.on_mode_wheel_edge(Direction::Prev, event.at_ms).await,
        }
    }

    /// Serve at most one pending press, or idle for one loop tick.
    ///
    /// Delivery failures are logged and the loop carries on; the press is
    /// not replayed.
    pub async fn process_buttons(&mut self) {
        let Some(event) = self
            .edges
            .next_edge(config::MAIN_LOOP_SLEEP_INTERVAL_MS)
            .await
        else {
            return;
        };

        match self.handle_event(event).await {
            Ok(Press::Accepted) => debug!("[BUTTON] {:?} handled", event.button),
            Ok(Press::Suppressed) => {}
            Err(CommandError::LinkDown) => {
                warn!("[BUTTON] {:?} dropped, wifi not connected", event.button)
            }
            Err(e) => error!("[BUTTON] {:?} failed: {}", event.button, e),
        }
    }

    /// Run the actions of the current state once.
    ///
    /// Stops early when an action changed the state; the new state's actions
    /// run on the next call.
    pub async fn step(&mut self) {
        let state = self.state.current_state();
        for action in self.state.update() {
            if let Err(e) = self.execute(action).await {
                error!("[STATE] {:?} failed: {}", action, e);
            }
            if self.state.current_state() != state {
                break;
            }
        }
    }

    /// Drive bring-up until the camera is configured.
    pub async fn bring_up(&mut self) {
        if self.state.current_state() == SystemState::SystemInit {
            self.state.handle_event(SystemEvent::SystemStarted);
        }
        while !self.state.is_operational() {
            self.step().await;
        }
    }

    /// Bring up, then serve buttons forever, recovering as needed
    pub async fn run(&mut self) -> ! {
        self.bring_up().await;
        loop {
            self.step().await;
        }
    }

    async fn execute(&mut self, action: Action) -> Result<(), BoardError> {
        match action {
            Action::Blink(times) => self.indicator.blink(times).await,
            Action::ConfigureBoard => {
                self.configure_board();
                self.state.handle_event(SystemEvent::BoardConfigured);
            }
            Action::ConnectWiFi => {
                self.wifi.ensure_connected(&mut self.indicator).await?;
                self.state.handle_event(SystemEvent::WiFiConnected);
            }
            Action::ConfigureCamera => match self.configure_camera().await {
                Ok(()) => {
                    info!("[CAMERA] Camera configured");
                    self.state.handle_event(SystemEvent::CameraConfigured);
                }
                Err(CommandError::LinkDown) => {
                    warn!("[CAMERA] Link lost before the camera was configured");
                    self.state.handle_event(SystemEvent::WiFiDisconnected);
                }
                Err(e) => {
                    self.state.handle_event(SystemEvent::CameraConfigFailed);
                    return Err(e.into());
                }
            },
            Action::MonitorConnection => {
                if self.wifi.monitor() == LinkEvent::Lost {
                    self.state.handle_event(SystemEvent::WiFiDisconnected);
                }
            }
            Action::ProcessButtons => self.process_buttons().await,
            Action::SystemRecover => {
                info!(
                    "[STATE] Initiating system recovery (attempt {})",
                    self.state.recovery_count() + 1
                );
                self.state.handle_event(SystemEvent::RecoveryRequested);
            }
            Action::LogError(state) => error!("[STATE] Error logged: {:?}", state),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraMode, CameraModel, SHUTTER_OFF, SHUTTER_ON};
    use crate::config::WifiConfig;
    use crate::http_client::CameraEndpoint;
    use crate::mock::{MockClock, MockConnector, MockDelay, MockEdges, MockIndicator, MockRadio};
    use crate::traits::TransportError;
    use crate::wifi::{LinkState, WifiLinkState};
    use embassy_futures::block_on;

    const CONFIG: RemoteConfig = RemoteConfig {
        wifi: WifiConfig {
            essid: "GP12345678",
            password: "secret",
            static_ip: None,
        },
        pins: PinConfig {
            trigger: 4,
            next_mode: Some(5),
            prev_mode: None,
            status_led: None,
        },
        camera: CameraEndpoint::new([10, 5, 5, 9], 80),
        model: CameraModel::Hero5Session,
        debug: false,
    };

    struct Rig {
        clock: MockClock,
        radio: MockRadio,
        connector: MockConnector,
        edges: MockEdges,
        indicator: MockIndicator,
    }

    type Controller<'a> = TriggerController<
        'a,
        MockRadio,
        MockConnector,
        MockDelay,
        MockClock,
        MockEdges,
        MockIndicator,
    >;

    impl Rig {
        fn new() -> Self {
            let clock = MockClock::new();
            let radio = MockRadio::new();
            radio.push_scan(&["GP12345678"]);
            Self {
                edges: MockEdges::new(&clock),
                clock,
                radio,
                connector: MockConnector::new(),
                indicator: MockIndicator::new(),
            }
        }

        fn controller<'a>(&self, link: &'a LinkState) -> Controller<'a> {
            let wifi = ConnectionManager::new(
                self.radio.clone(),
                MockDelay::new(&self.clock),
                self.clock.clone(),
                link,
                CONFIG.wifi,
            );
            let client = CommandClient::new(
                self.connector.clone(),
                MockDelay::new(&self.clock),
                link,
                CONFIG.camera,
            );
            TriggerController::new(
                wifi,
                client,
                self.edges.clone(),
                self.indicator.clone(),
                &CONFIG,
            )
        }
    }

    #[test]
    fn bring_up_registers_pins_and_pairs() {
        let rig = Rig::new();
        let link = LinkState::new();
        let mut controller = rig.controller(&link);

        block_on(controller.bring_up());

        assert_eq!(controller.system_state(), SystemState::Idle);
        assert_eq!(
            rig.edges.registered(),
            [(Button::Trigger, 4), (Button::NextMode, 5)]
        );
        assert_eq!(
            rig.connector.paths(),
            [
                PAIR_COMPLETE.path,
                "/gp/gpControl/setting/2/1",
                "/gp/gpControl/command/sub_mode?mode=1&sub_mode=1",
            ]
        );
        // Board configured, one association attempt, associated
        assert_eq!(rig.indicator.blinks(), [2, 2, 3]);
    }

    #[test]
    fn shutter_toggles_in_video_only() {
        let rig = Rig::new();
        let link = LinkState::new();
        let mut controller = rig.controller(&link);
        block_on(controller.bring_up());
        rig.connector.clear();

        let t = 10_000;
        assert_eq!(block_on(controller.on_trigger_edge(t)), Ok(Press::Accepted));
        assert_eq!(
            block_on(controller.on_mode_wheel_edge(Direction::Next, t)),
            Ok(Press::Accepted)
        );
        assert_eq!(controller.camera().current(), CameraMode::Video);
        assert_eq!(block_on(controller.on_trigger_edge(t + 2000)), Ok(Press::Accepted));
        assert_eq!(block_on(controller.on_trigger_edge(t + 4000)), Ok(Press::Accepted));

        assert_eq!(
            rig.connector.paths(),
            [
                SHUTTER_ON.path,
                "/gp/gpControl/setting/2/1",
                "/gp/gpControl/command/mode?p=0",
                SHUTTER_ON.path,
                SHUTTER_OFF.path,
            ]
        );
    }

    #[test]
    fn presses_inside_the_window_are_suppressed() {
        let rig = Rig::new();
        let link = LinkState::new();
        let mut controller = rig.controller(&link);
        block_on(controller.bring_up());
        rig.connector.clear();

        let t = 10_000;
        assert_eq!(block_on(controller.on_trigger_edge(t)), Ok(Press::Accepted));
        assert_eq!(block_on(controller.on_trigger_edge(t + 999)), Ok(Press::Suppressed));
        assert_eq!(block_on(controller.on_trigger_edge(t + 1000)), Ok(Press::Suppressed));
        assert_eq!(rig.connector.attempts(), 1);
    }

    #[test]
    fn exhausted_send_during_buttons_keeps_running() {
        let rig = Rig::new();
        let link = LinkState::new();
        let mut controller = rig.controller(&link);
        block_on(controller.bring_up());

        rig.connector.fail_always(TransportError::Connect);
        rig.edges.press(Button::Trigger, 20_000);
        block_on(controller.step());

        assert_eq!(controller.system_state(), SystemState::Idle);
        assert_eq!(rig.edges.pending(), 0);
    }

    #[test]
    fn failed_pairing_restarts_bring_up() {
        let rig = Rig::new();
        rig.radio.push_scan(&["GP12345678"]);
        let link = LinkState::new();
        let mut controller = rig.controller(&link);

        rig.connector.fail_next(6, TransportError::Connect);
        block_on(controller.bring_up());

        assert_eq!(controller.system_state(), SystemState::Idle);
        assert_eq!(rig.radio.connects(), 2);
        assert_eq!(rig.connector.paths()[0], PAIR_COMPLETE.path);
    }

    #[test]
    fn link_loss_reconfigures_camera() {
        let rig = Rig::new();
        rig.radio.push_scan(&["GP12345678"]);
        let link = LinkState::new();
        let mut controller = rig.controller(&link);
        block_on(controller.bring_up());
        rig.connector.clear();

        rig.radio.set_connected(false);
        block_on(controller.step());
        assert_eq!(controller.system_state(), SystemState::Reconnecting);
        assert!(!controller.is_connected());

        while controller.system_state() != SystemState::Idle {
            block_on(controller.step());
        }
        assert_eq!(rig.connector.paths()[0], PAIR_COMPLETE.path);
        assert_eq!(rig.connector.paths().len(), 3);
    }

    #[test]
    fn cancelled_wait_starts_over_on_next_step() {
        let rig = Rig::new();
        rig.radio.push_scan(&["GP12345678"]);
        let link = LinkState::new();
        let mut controller = rig.controller(&link);

        link.request_cancel();
        block_on(controller.bring_up());

        assert_eq!(controller.system_state(), SystemState::Idle);
        assert!(!link.is_cancel_requested());
        // The first wait saw the camera but stopped before associating
        assert_eq!(rig.radio.scans(), 2);
        assert_eq!(rig.radio.connects(), 1);
        assert_eq!(link.state(), WifiLinkState::Connected);
    }
}
