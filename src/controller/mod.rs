//! Arming state machine.
//!
//! Holds the armed and shutdown flags and runs every transition that touches
//! the motion process or the capture devices. Transitions (`arm`, `disarm`,
//! `capture`, `pir_tick`, `kill`) are serialized by one async lock; the armed
//! flag itself is atomic so the image watcher and PIR poller can read it
//! without waiting on a transition.

mod arming;
mod capture;
mod status;


use crate::config::PicamConfig;
use crate::devices::{BuzzerQueue, CaptureLed};
use crate::events::EventBus;
use crate::supervisor::ProcessSupervisor;
use chrono::{DateTime, Local};
use parking_lot::Mutex as SyncMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// How motion is detected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMode {
    /// Nothing configured, arming is refused
    None,
    Pir,
    MotionProcess,
}

impl DetectionMode {
    pub fn from_config(config: &PicamConfig) -> Self {
        if config.motion.enable {
            DetectionMode::MotionProcess
        } else if config.pir.enable {
            DetectionMode::Pir
        } else {
            DetectionMode::None
        }
    }
}

pub struct Controller {
    config: Arc<PicamConfig>,
    mode: DetectionMode,
    armed: AtomicBool,
    shutting_down: AtomicBool,
    transition: Mutex<()>,
    supervisor: Option<ProcessSupervisor>,
    led: CaptureLed,
    buzzer: Option<BuzzerQueue>,
    event_bus: Arc<EventBus>,
    last_motion: SyncMutex<Option<DateTime<Local>>>,
}

impl Controller {
    pub fn new(
        config: Arc<PicamConfig>,
        led: CaptureLed,
        buzzer: Option<BuzzerQueue>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let mode = DetectionMode::from_config(&config);
        let supervisor = (mode == DetectionMode::MotionProcess)
            .then(|| ProcessSupervisor::new(config.motion.pid_file.clone()));

        Self {
            armed: AtomicBool::new(config.general.arm),
            shutting_down: AtomicBool::new(false),
            config,
            mode,
            transition: Mutex::new(()),
            supervisor,
            led,
            buzzer,
            event_bus,
            last_motion: SyncMutex::new(None),
        }
    }

    /// Replace the motion process supervisor
    pub fn with_supervisor(mut self, supervisor: ProcessSupervisor) -> Self {
        if self.mode == DetectionMode::MotionProcess {
            self.supervisor = Some(supervisor);
        }
        self
    }

    pub fn config(&self) -> &PicamConfig {
        &self.config
    }

    pub fn mode(&self) -> DetectionMode {
        self.mode
    }

    /// Lock-free read of the armed flag; may be momentarily stale
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn led(&self) -> &CaptureLed {
        &self.led
    }

    pub fn has_buzzer(&self) -> bool {
        self.buzzer.is_some()
    }

    /// Enqueue a buzzer sequence if a buzzer is configured
    pub fn buzz(&self, sequence: &str) {
        if let Some(buzzer) = &self.buzzer {
            buzzer.put(sequence);
        }
    }

    /// Set the shutdown flag. Returns true only for the first caller.
    pub fn begin_shutdown(&self) -> bool {
        !self.shutting_down.swap(true, Ordering::SeqCst)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Remember when the PIR sensor last saw motion
    pub fn record_motion(&self) {
        *self.last_motion.lock() = Some(Local::now());
    }

    pub fn last_motion(&self) -> Option<DateTime<Local>> {
        *self.last_motion.lock()
    }

    fn set_armed(&self, armed: bool) {
        self.armed.store(armed, Ordering::SeqCst);
    }
}
