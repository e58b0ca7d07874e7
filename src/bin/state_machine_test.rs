//! On-device self test
//!
//! Walks the bring-up state machine, the mode wheel and the debounce windows
//! on the target and prints the results. Nothing touches the radio.

#![no_std]
#![no_main]

extern crate alloc;

use camera_remote_rs::camera::{CameraMode, CameraModeModel, Direction, SHUTTER_OFF, SHUTTER_ON};
use camera_remote_rs::config;
use camera_remote_rs::debounce::{Button, DebounceTimer};
use camera_remote_rs::state_machine::{Action, SystemEvent, SystemState, SystemStateMachine};
use esp_hal::clock::CpuClock;
use esp_println::println;

// Add app descriptor for espflash compatibility
esp_bootloader_esp_idf::esp_app_desc!();

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    println!("❌ Self test failed: {}", info);
    loop {}
}

#[esp_hal::main]
fn main() -> ! {
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let _peripherals = esp_hal::init(config);

    // Initialize heap allocator
    esp_alloc::heap_allocator!(size: 32 * 1024);

    println!("=== Camera remote self test ===");

    println!("\n1. Bring-up sequence");
    let mut sm = SystemStateMachine::new();
    assert_eq!(sm.current_state(), SystemState::SystemInit);

    sm.handle_event(SystemEvent::SystemStarted);
    assert_eq!(sm.update().as_slice(), [Action::ConfigureBoard]);
    sm.handle_event(SystemEvent::BoardConfigured);
    assert_eq!(sm.update().as_slice(), [Action::Blink(2), Action::ConnectWiFi]);
    sm.handle_event(SystemEvent::WiFiConnected);
    assert_eq!(sm.update().as_slice(), [Action::Blink(3), Action::ConfigureCamera]);
    sm.handle_event(SystemEvent::CameraConfigured);
    assert!(sm.is_operational());
    println!("✅ Reached {:?}", sm.current_state());

    println!("\n2. Recovery paths");
    sm.handle_event(SystemEvent::WiFiDisconnected);
    assert_eq!(sm.current_state(), SystemState::Reconnecting);
    sm.handle_event(SystemEvent::WiFiConnected);
    sm.handle_event(SystemEvent::CameraConfigFailed);
    assert!(sm.is_error_state());
    sm.handle_event(SystemEvent::RecoveryRequested);
    assert_eq!(sm.current_state(), SystemState::WiFiConnecting);
    assert_eq!(sm.recovery_count(), 1);
    println!("✅ Link loss and camera failure recover");

    println!("\n3. Mode wheel ({:?})", config::CAMERA_MODEL);
    let mut camera = CameraModeModel::new(config::CAMERA_MODEL);
    assert_eq!(camera.advance(Direction::Prev), CameraMode::Burst);
    assert_eq!(camera.advance(Direction::Next), CameraMode::Photo);
    assert_eq!(camera.advance(Direction::Next), CameraMode::Video);
    assert_eq!(camera.shutter_command(), SHUTTER_ON);
    assert_eq!(camera.shutter_command(), SHUTTER_OFF);
    for command in camera.command_for_current().commands {
        println!("   GET {}", command.path);
    }
    println!("✅ Mode wheel and recording toggle");

    println!("\n4. Debounce windows");
    let mut debounce = DebounceTimer::new(0);
    let t = config::SHUTTER_INTERVAL_MS + 1;
    assert!(debounce.should_accept(Button::Trigger, t));
    assert!(!debounce.should_accept(Button::Trigger, t + config::SHUTTER_INTERVAL_MS));
    assert!(debounce.should_accept(Button::NextMode, t));
    assert!(!debounce.should_accept(Button::PrevMode, t + config::MODE_BTN_INTERVAL_MS));
    println!("✅ Presses inside the window are dropped");

    println!("\n=== All self tests passed ===");
    loop {
        core::hint::spin_loop();
    }
}
