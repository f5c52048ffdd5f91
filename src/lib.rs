pub mod app;
pub mod config;
pub mod controller;
pub mod devices;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod gateway;
pub mod gpio;
pub mod logs;
pub mod pir;
pub mod supervisor;
pub mod watcher;

pub use app::{ComponentState, PicamOrchestrator, ShutdownReason};
pub use config::PicamConfig;
pub use controller::{Controller, DetectionMode};
pub use error::{GatewayError, PicamError, ProcessError, Result};
pub use events::{EventBus, PicamEvent};
pub use gateway::{IncomingMessage, MessagingGateway, PollBatch, TelegramGateway};
pub use gpio::{DigitalPort, MockPort};
pub use supervisor::{ProcessSupervisor, StartOutcome, StopOutcome};
