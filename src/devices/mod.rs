//! Feedback devices: the buzzer and the capture indicator LED.

mod buzzer;
mod led;

#[cfg(test)]
mod tests;

pub use buzzer::{buzzer_channel, play_sequence, BuzzerPlayer, BuzzerQueue};
pub use led::CaptureLed;
