#![no_std]
#![no_main]

use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;

extern crate alloc;

use esp_wifi::wifi;

use embassy_net::{Config, Ipv4Address, Ipv4Cidr, Stack, StackResources, StaticConfigV4};
use embassy_time::{Delay, Duration, Timer};
use esp_hal_embassy::Executor;
use log::{error, info};
use static_cell::StaticCell;

use camera_remote_rs::board::{self, EmbassyClock, EspRadio, QueuedEdges, TcpConnector};
use camera_remote_rs::config::{self, RemoteConfig};
use camera_remote_rs::controller::TriggerController;
use camera_remote_rs::debounce::Button;
use camera_remote_rs::http_client::CommandClient;
use camera_remote_rs::led_control::StatusLed;
use camera_remote_rs::wifi::{ConnectionManager, LinkState, StaticIpConfig};

// Add app descriptor for espflash compatibility
esp_bootloader_esp_idf::esp_app_desc!();

/// Board configuration baked in at build time
const REMOTE: RemoteConfig = RemoteConfig::from_build_env();

// The peripherals below are wired by hand; keep them in step with the config
const _: () = assert!(REMOTE.pins.trigger == 4);
const _: () = assert!(matches!(REMOTE.pins.next_mode, Some(5)));
const _: () = assert!(matches!(REMOTE.pins.prev_mode, Some(6)));
const _: () = assert!(matches!(REMOTE.pins.status_led, Some(2)));

static WIFI_INIT_CELL: StaticCell<esp_wifi::EspWifiController<'static>> = StaticCell::new();
static STACK_RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();
static LINK_STATE: LinkState = LinkState::new();
static EXECUTOR: StaticCell<Executor> = StaticCell::new();

type Remote = TriggerController<
    'static,
    EspRadio,
    TcpConnector,
    Delay,
    EmbassyClock,
    QueuedEdges,
    Option<StatusLed<Output<'static>, Delay>>,
>;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    esp_println::println!("[MAIN] Panic: {}", info);
    loop {}
}

// Embassy task to run the network stack
#[embassy_executor::task]
async fn net_task(
    mut runner: embassy_net::Runner<'static, esp_wifi::wifi::WifiDevice<'static>>,
) -> ! {
    runner.run().await
}

/// Bring-up, then button handling, forever
#[embassy_executor::task]
async fn controller_task(mut remote: Remote) -> ! {
    Timer::after(Duration::from_millis(u64::from(config::BOOT_DELAY_MS))).await;
    info!("[MAIN] Camera remote {} starting", camera_remote_rs::VERSION);
    remote.run().await
}

fn net_config(static_ip: Option<StaticIpConfig>) -> Config {
    let Some(ip) = static_ip else {
        return Config::dhcpv4(Default::default());
    };
    let [a, b, c, d] = ip.address;
    let address = Ipv4Cidr::new(Ipv4Address::new(a, b, c, d), ip.prefix_len);
    let [a, b, c, d] = ip.gateway;
    let gateway = Some(Ipv4Address::new(a, b, c, d));
    let mut dns_servers = heapless::Vec::new();
    let [a, b, c, d] = ip.dns;
    let _ = dns_servers.push(Ipv4Address::new(a, b, c, d));
    Config::ipv4_static(StaticConfigV4 {
        address,
        gateway,
        dns_servers,
    })
}

#[esp_hal::main]
fn main() -> ! {
    board::init_logger(REMOTE.debug);

    let hal_config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(hal_config);

    // Initialize heap allocator for WiFi (72KB)
    esp_alloc::heap_allocator!(size: 72 * 1024);

    // Initialize embassy time system
    let timer_group0 = TimerGroup::new(peripherals.TIMG0);
    esp_hal_embassy::init(timer_group0.timer0);

    // Initialize WiFi driver
    let timer_group1 = TimerGroup::new(peripherals.TIMG1);
    let mut rng = Rng::new(peripherals.RNG);
    let seed = u64::from(rng.random()) << 32 | u64::from(rng.random());
    let wifi_init = match esp_wifi::init(timer_group1.timer0, rng, peripherals.RADIO_CLK) {
        Ok(init) => init,
        Err(e) => {
            error!("[WIFI] Driver init failed: {:?}", e);
            panic!("esp-wifi initialization failed");
        }
    };
    let wifi_init_ref = WIFI_INIT_CELL.init(wifi_init);

    let (wifi_controller, wifi_interfaces) = match wifi::new(wifi_init_ref, peripherals.WIFI) {
        Ok(parts) => parts,
        Err(e) => {
            error!("[WIFI] Controller creation failed: {:?}", e);
            panic!("esp-wifi controller creation failed");
        }
    };
    info!("[WIFI] WiFi driver initialized");

    let stack_resources = STACK_RESOURCES.init(StackResources::new());
    let (stack, runner): (Stack<'static>, _) = embassy_net::new(
        wifi_interfaces.sta,
        net_config(REMOTE.wifi.static_ip),
        stack_resources,
        seed,
    );

    // Buttons pull the line low when pressed
    let pull_up = InputConfig::default().with_pull(Pull::Up);
    let trigger = Input::new(peripherals.GPIO4, pull_up);
    let next_mode = Input::new(peripherals.GPIO5, pull_up);
    let prev_mode = Input::new(peripherals.GPIO6, pull_up);

    let led_pin = Output::new(peripherals.GPIO2, Level::Low, OutputConfig::default());
    let status_led = Some(StatusLed::new(led_pin, Delay));

    let wifi = ConnectionManager::new(
        EspRadio::new(wifi_controller, stack),
        Delay,
        EmbassyClock,
        &LINK_STATE,
        REMOTE.wifi,
    );
    let client = CommandClient::new(TcpConnector::new(stack), Delay, &LINK_STATE, REMOTE.camera);
    let remote = TriggerController::new(wifi, client, QueuedEdges, status_led, &REMOTE);

    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        info!("[MAIN] Spawning network task...");
        spawner.spawn(net_task(runner)).ok();

        info!("[MAIN] Spawning button tasks...");
        for (input, button) in [
            (trigger, Button::Trigger),
            (next_mode, Button::NextMode),
            (prev_mode, Button::PrevMode),
        ] {
            if let Err(e) = spawner.spawn(board::button_task(input, button)) {
                error!("[MAIN] Failed to spawn {:?} task: {:?}", button, e);
            }
        }

        info!("[MAIN] Spawning controller task...");
        if let Err(e) = spawner.spawn(controller_task(remote)) {
            error!("[MAIN] Failed to spawn controller task: {:?}", e);
        }
    });
}
