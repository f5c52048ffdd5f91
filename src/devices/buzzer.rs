use crate::gpio::DigitalPort;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Producer side of the buzzer queue. Cloneable, never blocks.
#[derive(Clone)]
pub struct BuzzerQueue {
    sender: mpsc::UnboundedSender<String>,
}

impl BuzzerQueue {
    /// Enqueue a sequence for playback. Empty sequences are ignored.
    pub fn put(&self, sequence: &str) {
        if sequence.is_empty() {
            return;
        }
        if self.sender.send(sequence.to_string()).is_err() {
            warn!("Buzzer playback stopped, dropping sequence {:?}", sequence);
        }
    }
}

/// Single consumer playing queued sequences on the buzzer pin
pub struct BuzzerPlayer {
    port: Arc<dyn DigitalPort>,
    pin: u8,
    pulse: Duration,
    receiver: mpsc::UnboundedReceiver<String>,
}

/// Create the buzzer queue and its playback consumer
pub fn buzzer_channel(
    port: Arc<dyn DigitalPort>,
    pin: u8,
    pulse: Duration,
) -> (BuzzerQueue, BuzzerPlayer) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        BuzzerQueue { sender },
        BuzzerPlayer {
            port,
            pin,
            pulse,
            receiver,
        },
    )
}

impl BuzzerPlayer {
    pub fn pin(&self) -> u8 {
        self.pin
    }

    /// Play sequences until cancelled. A sequence in progress always completes.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Buzzer playback started on pin {}", self.pin);

        loop {
            let sequence = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = self.receiver.recv() => match next {
                    Some(sequence) => sequence,
                    None => break,
                },
            };

            debug!("Playing buzzer sequence {:?}", sequence);
            play_sequence(self.port.as_ref(), self.pin, &sequence, self.pulse).await;
        }

        self.receiver.close();
        let mut discarded = 0;
        while self.receiver.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!("Discarded {} queued buzzer sequences", discarded);
        }
        info!("Buzzer playback stopped");
    }
}

/// Forces the pin low when dropped, even if playback is aborted mid-sequence
struct LowOnDrop<'a> {
    port: &'a dyn DigitalPort,
    pin: u8,
}

impl Drop for LowOnDrop<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.port.write(self.pin, false) {
            warn!("Failed to reset pin {}: {}", self.pin, e);
        }
    }
}

/// Play one `0`/`1` sequence, holding each step for `pulse`.
///
/// Unknown characters are logged and skipped but still take one step.
/// The pin is low when this returns or is dropped.
pub async fn play_sequence(port: &dyn DigitalPort, pin: u8, sequence: &str, pulse: Duration) {
    let _guard = LowOnDrop { port, pin };

    for step in sequence.chars() {
        let level = match step {
            '1' => Some(true),
            '0' => Some(false),
            other => {
                warn!("Unknown pattern in sequence: {:?}", other);
                None
            }
        };

        if let Some(high) = level {
            if let Err(e) = port.write(pin, high) {
                warn!("Failed to drive pin {}: {}", pin, e);
            }
        }

        tokio::time::sleep(pulse).await;
    }
}
