//! End-to-end runs of the remote against the host mocks.

use camera_remote_rs::camera::{
    BURST_SUB_MODE, CameraMode, CameraModel, Direction, FORCE_4K_RESOLUTION, PAIR_COMPLETE,
    SHUTTER_OFF, SHUTTER_ON, SINGLE_PHOTO_SUB_MODE, VIDEO_MODE,
};
use camera_remote_rs::config::{PinConfig, RemoteConfig, WifiConfig};
use camera_remote_rs::controller::{Press, TriggerController};
use camera_remote_rs::debounce::Button;
use camera_remote_rs::http_client::{CameraEndpoint, CommandClient, CommandError};
use camera_remote_rs::mock::{
    MockClock, MockConnector, MockDelay, MockEdges, MockIndicator, MockRadio,
};
use camera_remote_rs::state_machine::SystemState;
use camera_remote_rs::wifi::{ConnectionManager, LinkState, WifiLinkState};
use embassy_futures::block_on;

const ESSID: &str = "GP54812345";

const CONFIG: RemoteConfig = RemoteConfig {
    wifi: WifiConfig {
        essid: ESSID,
        password: "goprohero",
        static_ip: None,
    },
    pins: PinConfig {
        trigger: 4,
        next_mode: Some(5),
        prev_mode: Some(6),
        status_led: Some(2),
    },
    camera: CameraEndpoint::new([10, 5, 5, 9], 80),
    model: CameraModel::Hero5Session,
    debug: true,
};

type Remote<'a> = TriggerController<
    'a,
    MockRadio,
    MockConnector,
    MockDelay,
    MockClock,
    MockEdges,
    MockIndicator,
>;

struct Bench {
    clock: MockClock,
    radio: MockRadio,
    camera: MockConnector,
    edges: MockEdges,
    led: MockIndicator,
}

impl Bench {
    fn new() -> Self {
        let clock = MockClock::new();
        Self {
            edges: MockEdges::new(&clock),
            clock,
            radio: MockRadio::new(),
            camera: MockConnector::new(),
            led: MockIndicator::new(),
        }
    }

    fn remote<'a>(&self, link: &'a LinkState) -> Remote<'a> {
        let wifi = ConnectionManager::new(
            self.radio.clone(),
            MockDelay::new(&self.clock),
            self.clock.clone(),
            link,
            CONFIG.wifi,
        );
        let client = CommandClient::new(
            self.camera.clone(),
            MockDelay::new(&self.clock),
            link,
            CONFIG.camera,
        );
        TriggerController::new(wifi, client, self.edges.clone(), self.led.clone(), &CONFIG)
    }
}

#[test]
fn prev_from_photo_selects_burst() {
    let bench = Bench::new();
    bench.radio.push_scan(&[ESSID]);
    let link = LinkState::new();
    let mut remote = bench.remote(&link);

    block_on(remote.bring_up());
    assert_eq!(
        bench.camera.paths(),
        [
            PAIR_COMPLETE.path,
            FORCE_4K_RESOLUTION.path,
            SINGLE_PHOTO_SUB_MODE.path
        ]
    );
    assert_eq!(remote.camera().current(), CameraMode::Photo);

    bench.camera.clear();
    let result = block_on(remote.on_mode_wheel_edge(Direction::Prev, 10_000));
    assert_eq!(result, Ok(Press::Accepted));
    assert_eq!(remote.camera().current(), CameraMode::Burst);
    assert_eq!(
        bench.camera.paths(),
        [FORCE_4K_RESOLUTION.path, BURST_SUB_MODE.path]
    );
    assert_eq!(
        bench.camera.requests()[1],
        "GET /gp/gpControl/command/sub_mode?mode=2&sub_mode=0 HTTP/1.1\r\nHost: 10.5.5.9\r\n\r\n"
    );
}

#[test]
fn waits_for_camera_to_switch_on() {
    let bench = Bench::new();
    bench.radio.push_scan(&[]);
    bench.radio.push_scan(&["HomeNetwork"]);
    bench.radio.push_scan(&["HomeNetwork", ESSID]);
    let link = LinkState::new();
    let mut remote = bench.remote(&link);

    block_on(remote.bring_up());

    assert_eq!(remote.system_state(), SystemState::Idle);
    assert_eq!(link.state(), WifiLinkState::Connected);
    assert_eq!(link.toggle_cycles(), 2);
    assert_eq!(bench.radio.deactivations(), 2);
    // board, two missed scans, one attempt, associated
    assert_eq!(bench.led.blinks(), [2, 1, 1, 2, 3]);
}

#[test]
fn queued_presses_are_served_in_order() {
    let bench = Bench::new();
    bench.radio.push_scan(&[ESSID]);
    let link = LinkState::new();
    let mut remote = bench.remote(&link);
    block_on(remote.bring_up());
    bench.camera.clear();

    bench.edges.press(Button::Trigger, 20_000);
    bench.edges.press(Button::Trigger, 20_400); // bounce
    bench.edges.press(Button::NextMode, 21_000);
    bench.edges.press(Button::PrevMode, 21_200); // same window as NextMode
    bench.edges.press(Button::Trigger, 22_000);
    bench.edges.press(Button::Trigger, 23_500);

    while bench.edges.pending() > 0 {
        block_on(remote.step());
    }

    assert_eq!(remote.camera().current(), CameraMode::Video);
    assert!(!remote.camera().is_recording());
    assert_eq!(
        bench.camera.paths(),
        [
            SHUTTER_ON.path,
            FORCE_4K_RESOLUTION.path,
            VIDEO_MODE.path,
            SHUTTER_ON.path,
            SHUTTER_OFF.path,
        ]
    );
}

#[test]
fn commands_are_dropped_while_link_is_down() {
    let bench = Bench::new();
    bench.radio.push_scan(&[ESSID]);
    let link = LinkState::new();
    let mut remote = bench.remote(&link);
    block_on(remote.bring_up());
    bench.camera.clear();

    bench.radio.set_connected(false);
    block_on(remote.step());
    assert_eq!(remote.system_state(), SystemState::Reconnecting);

    assert_eq!(
        block_on(remote.on_trigger_edge(30_000)),
        Err(CommandError::LinkDown)
    );
    assert_eq!(bench.camera.attempts(), 0);
}

#[test]
fn camera_lost_mid_session_is_paired_again() {
    let bench = Bench::new();
    bench.radio.push_scan(&[ESSID]);
    bench.radio.push_scan(&[]);
    bench.radio.push_scan(&[ESSID]);
    let link = LinkState::new();
    let mut remote = bench.remote(&link);
    block_on(remote.bring_up());
    bench.camera.clear();

    // The camera powers off right after taking the picture
    bench.camera.drop_link_after(1, &bench.radio);
    bench.edges.press(Button::Trigger, 40_000);
    block_on(remote.step());
    assert_eq!(remote.system_state(), SystemState::Idle);

    while remote.system_state() != SystemState::Idle || bench.camera.paths().len() < 4 {
        block_on(remote.step());
    }
    assert_eq!(
        bench.camera.paths(),
        [
            SHUTTER_ON.path,
            PAIR_COMPLETE.path,
            FORCE_4K_RESOLUTION.path,
            SINGLE_PHOTO_SUB_MODE.path
        ]
    );
    assert_eq!(link.toggle_cycles(), 1);
    assert!(bench.radio.is_active());
}
