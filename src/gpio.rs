//! Digital I/O port abstraction.
//!
//! Devices (buzzer, capture LED, PIR sensor) talk to pins through the
//! [`DigitalPort`] trait. On a Raspberry Pi the `gpio` feature provides
//! [`RppalPort`]; tests and hardware-less hosts use [`MockPort`].

use crate::error::{PicamError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Logical pin access used by every device component
pub trait DigitalPort: Send + Sync {
    /// Configure `pin` as an output, initially low
    fn configure_output(&self, pin: u8) -> Result<()>;

    /// Configure `pin` as an input
    fn configure_input(&self, pin: u8) -> Result<()>;

    /// Drive an output pin high or low
    fn write(&self, pin: u8, high: bool) -> Result<()>;

    /// Read the level of an input pin
    fn read(&self, pin: u8) -> Result<bool>;

    /// Release all pins
    fn release(&self) -> Result<()>;
}

/// Build the hardware port for this platform
#[cfg(all(feature = "gpio", target_os = "linux"))]
pub fn open_hardware_port() -> Result<Arc<dyn DigitalPort>> {
    Ok(Arc::new(RppalPort::new()?))
}

/// Build the hardware port for this platform
#[cfg(not(all(feature = "gpio", target_os = "linux")))]
pub fn open_hardware_port() -> Result<Arc<dyn DigitalPort>> {
    Err(PicamError::Gpio(
        "GPIO support not compiled in (enable the `gpio` feature on Linux)".to_string(),
    ))
}

#[cfg(all(feature = "gpio", target_os = "linux"))]
pub use hardware::RppalPort;

#[cfg(all(feature = "gpio", target_os = "linux"))]
mod hardware {
    use super::DigitalPort;
    use crate::error::{PicamError, Result};
    use parking_lot::Mutex;
    use rppal::gpio::{Gpio, InputPin, OutputPin};
    use std::collections::HashMap;
    use tracing::info;

    /// GPIO port backed by rppal, BCM pin numbering
    pub struct RppalPort {
        gpio: Gpio,
        outputs: Mutex<HashMap<u8, OutputPin>>,
        inputs: Mutex<HashMap<u8, InputPin>>,
    }

    impl RppalPort {
        pub fn new() -> Result<Self> {
            let gpio = Gpio::new().map_err(|e| PicamError::Gpio(e.to_string()))?;
            info!("GPIO port opened");
            Ok(Self {
                gpio,
                outputs: Mutex::new(HashMap::new()),
                inputs: Mutex::new(HashMap::new()),
            })
        }
    }

    impl DigitalPort for RppalPort {
        fn configure_output(&self, pin: u8) -> Result<()> {
            let mut output = self
                .gpio
                .get(pin)
                .map_err(|e| PicamError::Gpio(format!("pin {}: {}", pin, e)))?
                .into_output_low();
            output.set_reset_on_drop(true);
            self.outputs.lock().insert(pin, output);
            Ok(())
        }

        fn configure_input(&self, pin: u8) -> Result<()> {
            let input = self
                .gpio
                .get(pin)
                .map_err(|e| PicamError::Gpio(format!("pin {}: {}", pin, e)))?
                .into_input();
            self.inputs.lock().insert(pin, input);
            Ok(())
        }

        fn write(&self, pin: u8, high: bool) -> Result<()> {
            let mut outputs = self.outputs.lock();
            let output = outputs
                .get_mut(&pin)
                .ok_or_else(|| PicamError::Gpio(format!("pin {} is not an output", pin)))?;
            if high {
                output.set_high();
            } else {
                output.set_low();
            }
            Ok(())
        }

        fn read(&self, pin: u8) -> Result<bool> {
            let inputs = self.inputs.lock();
            let input = inputs
                .get(&pin)
                .ok_or_else(|| PicamError::Gpio(format!("pin {} is not an input", pin)))?;
            Ok(input.is_high())
        }

        fn release(&self) -> Result<()> {
            // Dropping the pins restores their previous mode
            self.outputs.lock().clear();
            self.inputs.lock().clear();
            info!("GPIO pins released");
            Ok(())
        }
    }
}

/// One recorded output change
#[derive(Debug, Clone, Copy)]
pub struct PinWrite {
    pub pin: u8,
    pub high: bool,
    pub at: Instant,
}

/// In-memory port recording every write, with scriptable input levels
#[derive(Default)]
pub struct MockPort {
    outputs: Mutex<HashMap<u8, bool>>,
    inputs: Mutex<HashMap<u8, bool>>,
    writes: Mutex<Vec<PinWrite>>,
    released: Mutex<bool>,
}

impl MockPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the level the next reads of `pin` will return
    pub fn set_input(&self, pin: u8, high: bool) {
        self.inputs.lock().insert(pin, high);
    }

    /// Current level of an output pin
    pub fn level(&self, pin: u8) -> Option<bool> {
        self.outputs.lock().get(&pin).copied()
    }

    /// All writes to `pin` in order
    pub fn writes_for(&self, pin: u8) -> Vec<PinWrite> {
        self.writes
            .lock()
            .iter()
            .filter(|w| w.pin == pin)
            .copied()
            .collect()
    }

    pub fn is_released(&self) -> bool {
        *self.released.lock()
    }
}

impl DigitalPort for MockPort {
    fn configure_output(&self, pin: u8) -> Result<()> {
        self.outputs.lock().insert(pin, false);
        debug!("Mock pin {} configured as output", pin);
        Ok(())
    }

    fn configure_input(&self, pin: u8) -> Result<()> {
        self.inputs.lock().entry(pin).or_insert(false);
        debug!("Mock pin {} configured as input", pin);
        Ok(())
    }

    fn write(&self, pin: u8, high: bool) -> Result<()> {
        let mut outputs = self.outputs.lock();
        match outputs.get_mut(&pin) {
            Some(level) => *level = high,
            None => return Err(PicamError::Gpio(format!("pin {} is not an output", pin))),
        }
        self.writes.lock().push(PinWrite {
            pin,
            high,
            at: Instant::now(),
        });
        Ok(())
    }

    fn read(&self, pin: u8) -> Result<bool> {
        self.inputs
            .lock()
            .get(&pin)
            .copied()
            .ok_or_else(|| PicamError::Gpio(format!("pin {} is not an input", pin)))
    }

    fn release(&self) -> Result<()> {
        *self.released.lock() = true;
        info!("Mock GPIO released");
        Ok(())
    }
}
