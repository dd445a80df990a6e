//! Event helpers.

use rk_protocol::ipc::Event;
use std::time::Duration;
use tokio::sync::mpsc;

/// Everything currently queued on the channel.
#[allow(dead_code)]
pub fn drain_events(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Receive events until `JobFinished` arrives or `timeout` passes.
#[allow(dead_code)]
pub async fn collect_until_finished(
    rx: &mut mpsc::UnboundedReceiver<Event>,
    timeout: Duration,
) -> Vec<Event> {
    let mut events = Vec::new();
    let start = tokio::time::Instant::now();

    while start.elapsed() < timeout {
        match tokio::time::timeout(Duration::from_millis(100), rx.recv()).await {
            Ok(Some(event)) => {
                let finished = matches!(event, Event::JobFinished { .. });
                events.push(event);
                if finished {
                    break;
                }
            }
            Ok(None) => break,
            Err(_) => continue,
        }
    }

    events
}

#[allow(dead_code)]
pub fn count_finished(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, Event::JobFinished { .. }))
        .count()
}
