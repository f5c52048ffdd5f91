use super::*;
use crate::gpio::{DigitalPort, MockPort};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const BUZZER_PIN: u8 = 18;
const LED_PIN: u8 = 27;

fn mock_port() -> Arc<MockPort> {
    let port = Arc::new(MockPort::new());
    port.configure_output(BUZZER_PIN).unwrap();
    port.configure_output(LED_PIN).unwrap();
    port
}

#[tokio::test]
async fn test_sequence_levels_and_timing() {
    let port = mock_port();
    let pulse = Duration::from_millis(20);

    play_sequence(port.as_ref(), BUZZER_PIN, "101", pulse).await;

    let writes = port.writes_for(BUZZER_PIN);
    let levels: Vec<bool> = writes.iter().map(|w| w.high).collect();
    // three steps plus the final reset
    assert_eq!(levels, vec![true, false, true, false]);

    for pair in writes.windows(2) {
        assert!(pair[1].at.duration_since(pair[0].at) >= pulse);
    }
    assert_eq!(port.level(BUZZER_PIN), Some(false));
}

#[tokio::test]
async fn test_invalid_characters_are_skipped() {
    let port = mock_port();
    let start = std::time::Instant::now();
    let pulse = Duration::from_millis(10);

    play_sequence(port.as_ref(), BUZZER_PIN, "1x1", pulse).await;

    let levels: Vec<bool> = port
        .writes_for(BUZZER_PIN)
        .iter()
        .map(|w| w.high)
        .collect();
    assert_eq!(levels, vec![true, true, false]);
    // the invalid step still consumed its pulse
    assert!(start.elapsed() >= pulse * 3);
}

#[tokio::test]
async fn test_aborted_sequence_leaves_pin_low() {
    let port = mock_port();

    let result = tokio::time::timeout(
        Duration::from_millis(30),
        play_sequence(port.as_ref(), BUZZER_PIN, "1111111111", Duration::from_millis(20)),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(port.level(BUZZER_PIN), Some(false));
}

#[tokio::test]
async fn test_queue_plays_in_order_without_overlap() {
    let port = mock_port();
    let (queue, player) = buzzer_channel(
        port.clone() as Arc<dyn DigitalPort>,
        BUZZER_PIN,
        Duration::from_millis(5),
    );
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(player.run(cancel.clone()));

    queue.put("1");
    queue.put("");
    queue.put("01");

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();
    handle.await.unwrap();

    let levels: Vec<bool> = port
        .writes_for(BUZZER_PIN)
        .iter()
        .map(|w| w.high)
        .collect();
    assert_eq!(levels, vec![true, false, false, true, false]);
}

#[tokio::test]
async fn test_put_after_shutdown_does_not_panic() {
    let port = mock_port();
    let (queue, player) = buzzer_channel(port as Arc<dyn DigitalPort>, BUZZER_PIN, Duration::ZERO);
    let cancel = CancellationToken::new();
    cancel.cancel();
    player.run(cancel).await;

    queue.put("1");
}

#[test]
fn test_capture_led_tracks_state() {
    let port = mock_port();
    let led = CaptureLed::new(port.clone() as Arc<dyn DigitalPort>, LED_PIN);

    assert!(led.is_configured());
    assert!(!led.is_on());

    led.set(true);
    assert!(led.is_on());
    assert_eq!(port.level(LED_PIN), Some(true));

    assert!(!led.toggle());
    assert_eq!(port.level(LED_PIN), Some(false));
}

#[test]
fn test_absent_led_is_noop() {
    let led = CaptureLed::absent();
    led.set(true);
    assert!(!led.is_configured());
    assert!(!led.is_on());
}
