//! Button identities and time-window debouncing.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::debug;

use crate::config;

/// Logical buttons on the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    /// Shutter
    Trigger,
    NextMode,
    PrevMode,
}

impl Button {
    /// Debounce window this button belongs to. Both mode-wheel buttons share one.
    pub const fn class(self) -> ButtonClass {
        match self {
            Button::Trigger => ButtonClass::Shutter,
            Button::NextMode | Button::PrevMode => ButtonClass::ModeWheel,
        }
    }
}

/// Buttons whose edges are forwarded to the controller.
///
/// Button tasks check it from interrupt-driven wakeups while the controller
/// arms lines during board configuration.
pub struct ArmedButtons {
    mask: Mutex<CriticalSectionRawMutex, Cell<u8>>,
}

impl ArmedButtons {
    pub const fn new() -> Self {
        Self {
            mask: Mutex::new(Cell::new(0)),
        }
    }

    const fn bit(button: Button) -> u8 {
        match button {
            Button::Trigger => 1 << 0,
            Button::NextMode => 1 << 1,
            Button::PrevMode => 1 << 2,
        }
    }

    pub fn arm(&self, button: Button) {
        self.mask
            .lock(|mask| mask.set(mask.get() | Self::bit(button)));
    }

    pub fn is_armed(&self, button: Button) -> bool {
        self.mask.lock(|mask| mask.get() & Self::bit(button) != 0)
    }
}

impl Default for ArmedButtons {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonClass {
    Shutter,
    ModeWheel,
}

/// Last accepted press and minimum spacing for one button class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceWindow {
    pub last_accepted_ms: u64,
    pub min_interval_ms: u64,
}

impl DebounceWindow {
    pub const fn new(min_interval_ms: u64, now_ms: u64) -> Self {
        Self {
            last_accepted_ms: now_ms,
            min_interval_ms,
        }
    }
}

/// Suppresses presses that arrive too soon after the previous accepted one.
///
/// Suppressed presses are dropped, not queued. Windows start at construction
/// time, so presses during the first interval after boot are ignored as well.
pub struct DebounceTimer {
    shutter: DebounceWindow,
    mode_wheel: DebounceWindow,
}

impl DebounceTimer {
    /// Windows with the board's shutter and mode-wheel intervals
    pub fn new(now_ms: u64) -> Self {
        Self::with_intervals(
            config::SHUTTER_INTERVAL_MS,
            config::MODE_BTN_INTERVAL_MS,
            now_ms,
        )
    }

    pub fn with_intervals(shutter_ms: u64, mode_wheel_ms: u64, now_ms: u64) -> Self {
        Self {
            shutter: DebounceWindow::new(shutter_ms, now_ms),
            mode_wheel: DebounceWindow::new(mode_wheel_ms, now_ms),
        }
    }

    /// Accept the press iff strictly more than the window's interval has
    /// elapsed since the last accepted press of the same class.
    pub fn should_accept(&mut self, button: Button, now_ms: u64) -> bool {
        let window = self.window_mut(button.class());
        let elapsed = now_ms.wrapping_sub(window.last_accepted_ms);

        if elapsed > window.min_interval_ms {
            window.last_accepted_ms = now_ms;
            true
        } else {
            debug!("[BUTTON] {:?} triggered too soon ({} ms)", button, elapsed);
            false
        }
    }

    pub fn window(&self, class: ButtonClass) -> DebounceWindow {
        match class {
            ButtonClass::Shutter => self.shutter,
            ButtonClass::ModeWheel => self.mode_wheel,
        }
    }

    fn window_mut(&mut self, class: ButtonClass) -> &mut DebounceWindow {
        match class {
            ButtonClass::Shutter => &mut self.shutter,
            ButtonClass::ModeWheel => &mut self.mode_wheel,
        }
    }
}
