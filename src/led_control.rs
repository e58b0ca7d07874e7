//! Status LED feedback
//!
//! The board has a single status LED. Progress is signalled by short bursts
//! of blinks, one burst per [`LedStatus`].

use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use log::debug;

use crate::config;

/// LED status states for visual feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedStatus {
    /// A scan did not see the camera
    CameraNotFound,
    /// An association attempt is starting
    Associating,
    /// Still waiting for the association to finish
    ConnectionPending,
    /// Pins are configured
    BoardConfigured,
    /// Associated with the camera access point
    WiFiConnected,
}

impl LedStatus {
    /// Number of blinks in the burst for this status
    pub const fn blink_count(self) -> u8 {
        match self {
            LedStatus::CameraNotFound | LedStatus::ConnectionPending => 1,
            LedStatus::Associating | LedStatus::BoardConfigured => 2,
            LedStatus::WiFiConnected => 3,
        }
    }
}

/// Something that can blink.
///
/// Blinking blocks the caller for the whole burst.
#[allow(async_fn_in_trait)]
pub trait StatusIndicator {
    async fn blink(&mut self, times: u8);

    async fn show(&mut self, status: LedStatus) {
        self.blink(status.blink_count()).await;
    }
}

/// A board without a status LED simply skips the feedback.
impl<T: StatusIndicator> StatusIndicator for Option<T> {
    async fn blink(&mut self, times: u8) {
        if let Some(indicator) = self {
            indicator.blink(times).await;
        }
    }
}

impl<T: StatusIndicator + ?Sized> StatusIndicator for &mut T {
    async fn blink(&mut self, times: u8) {
        (**self).blink(times).await;
    }
}

/// LED on a GPIO, driven high for "on".
pub struct StatusLed<P, D> {
    pin: P,
    delay: D,
    pulse_ms: u32,
}

impl<P, D> StatusLed<P, D>
where
    P: OutputPin,
    D: DelayNs,
{
    /// Create a new LED driver; the LED is switched off
    pub fn new(mut pin: P, delay: D) -> Self {
        let _ = pin.set_low();
        Self {
            pin,
            delay,
            pulse_ms: config::LED_PULSE_MS,
        }
    }

    pub fn with_pulse_ms(mut self, pulse_ms: u32) -> Self {
        self.pulse_ms = pulse_ms;
        self
    }
}

impl<P, D> StatusIndicator for StatusLed<P, D>
where
    P: OutputPin,
    D: DelayNs,
{
    async fn blink(&mut self, times: u8) {
        debug!("[LED] Blink x{}", times);
        for _ in 0..times {
            // A failing GPIO write only costs us the feedback
            let _ = self.pin.set_high();
            self.delay.delay_ms(self.pulse_ms).await;
            let _ = self.pin.set_low();
            self.delay.delay_ms(self.pulse_ms).await;
        }
    }
}
