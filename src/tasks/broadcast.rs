use std::{sync::Arc, time::Duration};

use common::gesture::GestureState;
use futures::StreamExt;
use tokio::{sync::watch, time::MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

use crate::hub::BroadcastHub;

/// Task: Every `period`, copy the latest gesture record out of
/// `rx_gesture_state` and push it through the hub. Runs independently of
/// the capture loop's pace. Can be cancelled.
#[tracing::instrument(skip_all)]
pub async fn task_broadcast_gesture_state(
    token: CancellationToken,
    hub: Arc<BroadcastHub>,
    rx_gesture_state: watch::Receiver<GestureState>,
    period: Duration,
) {
    info!("Started. Period: {:?}", period);

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks = IntervalStream::new(interval);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                warn!("Cancelled.");
                break;
            },
            Some(_) = ticks.next() => {
                // Copy out so the watch lock is released before any send.
                let state = *rx_gesture_state.borrow();
                let report = hub.tick(&state).await;
                trace!("Broadcast {} to {} subscribers.", state, report.delivered);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use common::gesture::Action;

    use super::*;
    use crate::hub::tests::RecordingSubscriber;

    #[tokio::test]
    async fn test_broadcasts_latest_state_until_cancelled() {
        let hub = Arc::new(BroadcastHub::new());
        let subscriber = RecordingSubscriber::new(1);
        hub.register(subscriber.clone()).await;

        let (tx, rx) = watch::channel(GestureState::default());
        let token = CancellationToken::new();
        let task = tokio::spawn(task_broadcast_gesture_state(
            token.clone(),
            hub.clone(),
            rx,
            Duration::from_millis(5),
        ));

        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send_replace(GestureState {
            detected: true,
            action: Action::Zoom,
            zoom: 0.5,
            ..GestureState::default()
        });
        tokio::time::sleep(Duration::from_millis(30)).await;

        token.cancel();
        task.await.expect("Broadcast task panicked");

        let received = subscriber.received();
        assert!(received.len() >= 2);

        let first: GestureState =
            serde_json::from_str(&received[0]).expect("Failed to parse payload");
        assert_eq!(first, GestureState::default());

        let last: GestureState = serde_json::from_str(received.last().expect("No payload"))
            .expect("Failed to parse payload");
        assert_eq!(last.action, Action::Zoom);

        let count = received.len();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(subscriber.received().len(), count);
    }
}
