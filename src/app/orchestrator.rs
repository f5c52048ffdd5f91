use super::state::Worker;
use super::types::ComponentState;
use crate::config::PicamConfig;
use crate::controller::Controller;
use crate::devices::{buzzer_channel, BuzzerPlayer, CaptureLed};
use crate::error::{PicamError, Result};
use crate::events::EventBus;
use crate::gateway::{MessagingGateway, TelegramGateway};
use crate::gpio::{open_hardware_port, DigitalPort};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Main application coordinator that owns the controller and its workers
pub struct PicamOrchestrator {
    pub(super) config: Arc<PicamConfig>,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) controller: Arc<Controller>,
    pub(super) gateway: Arc<dyn MessagingGateway>,
    pub(super) port: Option<Arc<dyn DigitalPort>>,
    pub(super) buzzer_player: Option<BuzzerPlayer>,

    // Lifecycle management
    pub(super) workers: Vec<Worker>,
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) cancellation_token: CancellationToken,
    pub(super) retry_interval: Duration,
    pub(super) supervision_interval: Duration,
}

impl PicamOrchestrator {
    /// Wire up the Telegram gateway and, when a device needs it, the GPIO port
    pub fn new(config: PicamConfig) -> Result<Self> {
        let gateway: Arc<dyn MessagingGateway> = Arc::new(TelegramGateway::new(&config.telegram));
        let port = if config.needs_gpio() {
            Some(open_hardware_port()?)
        } else {
            info!("No GPIO devices configured");
            None
        };
        Self::with_parts(config, gateway, port)
    }

    /// Build from an explicit gateway and port
    pub fn with_parts(
        config: PicamConfig,
        gateway: Arc<dyn MessagingGateway>,
        port: Option<Arc<dyn DigitalPort>>,
    ) -> Result<Self> {
        if config.needs_gpio() && port.is_none() {
            return Err(PicamError::Gpio(
                "a configured device needs GPIO but no port is available".to_string(),
            ));
        }

        let config = Arc::new(config);
        let event_bus = Arc::new(EventBus::default());

        let led = match (&port, config.capture.led.enable, config.capture.led.gpio) {
            (Some(port), true, Some(pin)) => {
                port.configure_output(pin)?;
                info!("Capture LED on pin {}", pin);
                CaptureLed::new(Arc::clone(port), pin)
            }
            _ => CaptureLed::absent(),
        };

        let (buzzer, buzzer_player) = match (&port, config.buzzer.enable, config.buzzer.gpio) {
            (Some(port), true, Some(pin)) => {
                port.configure_output(pin)?;
                info!("Buzzer on pin {}", pin);
                let (queue, player) =
                    buzzer_channel(Arc::clone(port), pin, config.buzzer.pulse_duration());
                (Some(queue), Some(player))
            }
            _ => (None, None),
        };

        let controller = Arc::new(Controller::new(
            Arc::clone(&config),
            led,
            buzzer,
            Arc::clone(&event_bus),
        ));

        Ok(Self {
            config,
            event_bus,
            controller,
            gateway,
            port,
            buzzer_player,
            workers: Vec::new(),
            component_states: Arc::new(Mutex::new(HashMap::new())),
            cancellation_token: CancellationToken::new(),
            retry_interval: Duration::from_secs(1),
            supervision_interval: Duration::from_secs(1),
        })
    }

    /// Override the gateway retry and worker check cadence
    pub fn with_intervals(mut self, retry: Duration, supervision: Duration) -> Self {
        self.retry_interval = retry;
        self.supervision_interval = supervision;
        self
    }

    pub fn controller(&self) -> &Arc<Controller> {
        &self.controller
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }
}
