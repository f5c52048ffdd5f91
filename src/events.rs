use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events that can occur in the picambot system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PicamEvent {
    /// Motion-based capturing was enabled
    Armed { timestamp: SystemTime },
    /// Motion-based capturing was disabled
    Disarmed { timestamp: SystemTime },
    /// The PIR sensor reported motion
    MotionDetected { armed: bool, timestamp: SystemTime },
    /// A capture command finished
    CaptureCompleted { success: bool, manual: bool },
    /// A finalized image was sent to the operators
    ImageDelivered { path: PathBuf, recipients: usize },
    /// A long-running worker terminated
    WorkerFailed { worker: String, error: String },
    /// System shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl PicamEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            PicamEvent::Armed { .. } => "Motion-based capturing enabled".to_string(),
            PicamEvent::Disarmed { .. } => "Motion-based capturing disabled".to_string(),
            PicamEvent::MotionDetected { armed, .. } => {
                if *armed {
                    "PIR: motion detected".to_string()
                } else {
                    "PIR: motion detected while disarmed".to_string()
                }
            }
            PicamEvent::CaptureCompleted { success, manual } => format!(
                "{} capture {}",
                if *manual { "Manual" } else { "Motion" },
                if *success { "succeeded" } else { "failed" }
            ),
            PicamEvent::ImageDelivered { path, recipients } => {
                format!("Image {} delivered to {} operators", path.display(), recipients)
            }
            PicamEvent::WorkerFailed { worker, error } => {
                format!("Worker '{}' failed: {}", worker, error)
            }
            PicamEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }
}

/// Async event bus for component coordination using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<PicamEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<PicamEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers. Returns the number of receivers.
    pub fn publish(&self, event: PicamEvent) -> usize {
        match &event {
            PicamEvent::Armed { .. } | PicamEvent::Disarmed { .. } => {
                info!("{}", event.description());
            }
            PicamEvent::MotionDetected { .. } => info!("{}", event.description()),
            PicamEvent::WorkerFailed { worker, error } => {
                error!("Worker '{}' failed: {}", worker, error);
            }
            PicamEvent::CaptureCompleted { success: false, .. } => {
                warn!("{}", event.description());
            }
            PicamEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => debug!("Event: {}", event.description()),
        }

        // no subscribers is fine
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}
