use crate::gpio::DigitalPort;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error};

/// Capture indicator LED with its last commanded state
pub struct CaptureLed {
    output: Option<(Arc<dyn DigitalPort>, u8)>,
    on: Mutex<bool>,
}

impl CaptureLed {
    pub fn new(port: Arc<dyn DigitalPort>, pin: u8) -> Self {
        Self {
            output: Some((port, pin)),
            on: Mutex::new(false),
        }
    }

    /// An LED that is not wired up
    pub fn absent() -> Self {
        Self {
            output: None,
            on: Mutex::new(false),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.output.is_some()
    }

    pub fn is_on(&self) -> bool {
        *self.on.lock()
    }

    /// Switch the LED. Logs and does nothing when no LED is configured.
    pub fn set(&self, on: bool) {
        let Some((port, pin)) = &self.output else {
            error!("No capture LED configured");
            return;
        };

        let mut state = self.on.lock();
        match port.write(*pin, on) {
            Ok(()) => {
                *state = on;
                debug!("Capture LED {}", if on { "on" } else { "off" });
            }
            Err(e) => error!("Failed to switch capture LED: {}", e),
        }
    }

    /// Flip the LED and return the new state
    pub fn toggle(&self) -> bool {
        let next = !self.is_on();
        self.set(next);
        self.is_on()
    }
}
