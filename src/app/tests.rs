use super::startup::GREETING;
use super::*;
use crate::config::PicamConfig;
use crate::error::{GatewayError, PicamError};
use crate::gateway::recording::RecordingGateway;
use crate::gateway::MessagingGateway;
use crate::gpio::{DigitalPort, MockPort};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const OWNERS: [i64; 2] = [11, 12];
const BUZZER_PIN: u8 = 18;
const LED_PIN: u8 = 27;

fn create_test_config(dir: &TempDir) -> PicamConfig {
    let mut config = PicamConfig::default();
    config.telegram.token = "123:abc".to_string();
    config.telegram.owner_ids = OWNERS.to_vec();
    config.general.image_dir = dir.path().join("images");
    config.general.log_dir = dir.path().to_path_buf();
    config
}

fn with_devices(mut config: PicamConfig) -> PicamConfig {
    config.pir.enable = true;
    config.pir.gpio = Some(17);
    config.pir.capture_cmd = "true".to_string();
    config.buzzer.enable = true;
    config.buzzer.gpio = Some(BUZZER_PIN);
    config.buzzer.duration = 0.005;
    config.capture.led.enable = true;
    config.capture.led.gpio = Some(LED_PIN);
    config
}

fn orchestrator(
    config: PicamConfig,
    port: Option<Arc<MockPort>>,
) -> (PicamOrchestrator, Arc<RecordingGateway>) {
    let gateway = Arc::new(RecordingGateway::new());
    let port = port.map(|p| p as Arc<dyn DigitalPort>);
    let orchestrator = PicamOrchestrator::with_parts(
        config,
        gateway.clone() as Arc<dyn MessagingGateway>,
        port,
    )
    .unwrap()
    .with_intervals(Duration::from_millis(10), Duration::from_millis(10));
    (orchestrator, gateway)
}

#[tokio::test]
async fn test_network_errors_are_retried_during_startup() {
    let dir = TempDir::new().unwrap();
    let (mut orchestrator, gateway) = orchestrator(create_test_config(&dir), None);
    gateway.script_get_me(vec![
        Err(GatewayError::Network("connection refused".to_string())),
        Err(GatewayError::Network("connection refused".to_string())),
    ]);

    orchestrator.start().await.unwrap();

    for owner in OWNERS {
        assert_eq!(gateway.texts_for(owner), vec![GREETING.to_string()]);
    }
    assert_eq!(
        orchestrator.get_component_state("message poller").await,
        Some(ComponentState::Running)
    );
    assert_eq!(
        orchestrator.get_component_state("image watcher").await,
        Some(ComponentState::Running)
    );
    assert!(orchestrator.get_component_state("PIR poller").await.is_none());

    orchestrator.shutdown(ShutdownReason::Signal(15)).await.unwrap();
}

#[tokio::test]
async fn test_rejected_token_aborts_startup() {
    let dir = TempDir::new().unwrap();
    let (mut orchestrator, gateway) = orchestrator(create_test_config(&dir), None);
    gateway.script_get_me(vec![Err(GatewayError::Unauthorized(
        "HTTP 401".to_string(),
    ))]);

    let result = orchestrator.start().await;

    assert!(matches!(
        result,
        Err(PicamError::Gateway(GatewayError::Unauthorized(_)))
    ));
    assert!(gateway.sent().is_empty());
    assert!(orchestrator.get_all_component_states().await.is_empty());
}

#[tokio::test]
async fn test_startup_gives_up_after_timeout() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.general.startup_timeout = 1;
    let (orchestrator, gateway) = orchestrator(config, None);
    gateway.script_get_me(
        (0..1000)
            .map(|_| Err(GatewayError::Network("timed out".to_string())))
            .collect(),
    );

    let result = orchestrator.wait_for_gateway().await;
    assert!(matches!(result, Err(PicamError::System { .. })));
}

#[test]
fn test_devices_need_a_port() {
    let dir = TempDir::new().unwrap();
    let config = with_devices(create_test_config(&dir));
    let gateway = Arc::new(RecordingGateway::new());

    let result = PicamOrchestrator::with_parts(config, gateway as Arc<dyn MessagingGateway>, None);
    assert!(matches!(result, Err(PicamError::Gpio(_))));
}

#[tokio::test]
async fn test_armed_startup_plays_arm_sequence() {
    let dir = TempDir::new().unwrap();
    let mut config = with_devices(create_test_config(&dir));
    config.general.arm = true;
    config.buzzer.seq_arm = "11".to_string();
    let port = Arc::new(MockPort::new());
    let (mut orchestrator, _gateway) = orchestrator(config, Some(Arc::clone(&port)));

    orchestrator.start().await.unwrap();
    assert_eq!(
        orchestrator.get_component_state("PIR poller").await,
        Some(ComponentState::Running)
    );
    tokio::time::sleep(Duration::from_millis(100)).await;

    let levels: Vec<bool> = port
        .writes_for(BUZZER_PIN)
        .iter()
        .map(|w| w.high)
        .collect();
    assert_eq!(levels, vec![true, true, false]);

    orchestrator.shutdown(ShutdownReason::Signal(2)).await.unwrap();
}

#[tokio::test]
async fn test_dead_worker_triggers_shutdown() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    // the image directory cannot be created below a regular file
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "").unwrap();
    config.general.image_dir = blocker.join("images");
    let (mut orchestrator, gateway) = orchestrator(config, None);

    orchestrator.start().await.unwrap();
    let reason = tokio::time::timeout(Duration::from_secs(5), orchestrator.supervise())
        .await
        .unwrap();
    assert_eq!(reason, ShutdownReason::WorkerDied("image watcher".to_string()));
    assert_eq!(
        orchestrator.get_component_state("image watcher").await,
        Some(ComponentState::Failed)
    );

    let exit_code = orchestrator.shutdown(reason).await.unwrap();
    assert_eq!(exit_code, 1);
    for owner in OWNERS {
        assert_eq!(
            gateway.texts_for(owner).last().map(String::as_str),
            Some("Thread \"image watcher\" died, terminating now.")
        );
    }
}

#[tokio::test]
async fn test_shutdown_cleans_up_once() {
    let dir = TempDir::new().unwrap();
    let config = with_devices(create_test_config(&dir));
    let port = Arc::new(MockPort::new());
    let (mut orchestrator, gateway) = orchestrator(config, Some(Arc::clone(&port)));

    orchestrator.start().await.unwrap();
    orchestrator.controller().led().set(true);
    assert_eq!(port.level(LED_PIN), Some(true));

    let exit_code = orchestrator.shutdown(ShutdownReason::Signal(15)).await.unwrap();
    assert_eq!(exit_code, 1);
    assert!(orchestrator.controller().is_shutting_down());
    assert_eq!(port.level(LED_PIN), Some(false));
    assert_eq!(port.level(BUZZER_PIN), Some(false));
    assert!(port.is_released());
    assert_eq!(
        orchestrator.get_component_state("message poller").await,
        Some(ComponentState::Stopped)
    );

    let notice = "Caught signal 15, terminating now.".to_string();
    assert_eq!(gateway.texts_for(OWNERS[0]), vec![GREETING.to_string(), notice.clone()]);

    orchestrator.shutdown(ShutdownReason::Signal(2)).await.unwrap();
    assert_eq!(gateway.texts_for(OWNERS[0]), vec![GREETING.to_string(), notice]);
}

#[test]
fn test_shutdown_notices() {
    assert_eq!(
        ShutdownReason::Signal(1).notice(),
        "Caught signal 1, terminating now."
    );
    assert_eq!(
        ShutdownReason::WorkerDied("PIR poller".to_string()).notice(),
        "Thread \"PIR poller\" died, terminating now."
    );
}
