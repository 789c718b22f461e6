use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use common::{
    gesture::GestureState,
    landmark::{HandLandmarks, LandmarkError, LandmarkFrame},
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::{
    classifier::classify,
    config::{HandTrackingSettings, SensitivityConfig},
    ports::{LandmarkSource, SourceError},
};

/// Consecutive read failures after which the source is given up on.
const MAX_CONSECUTIVE_READ_FAILURES: usize = 30;

/// Settings the capture loop needs, copied out of the global settings.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub hand_tracking: HandTrackingSettings,
    pub sensitivity: SensitivityConfig,
}

/// Start the capture/classify loop on its own OS thread. The landmark source
/// blocks, so it must stay off the async runtime.
pub fn spawn_capture_thread<S: LandmarkSource + 'static>(
    token: CancellationToken,
    source: S,
    settings: CaptureSettings,
    tx_gesture_state: watch::Sender<GestureState>,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(String::from("capture"))
        .spawn(move || run_capture_loop(token, source, &settings, &tx_gesture_state))
        .context("Failed to spawn capture thread")
}

/// Pull frames until the source is exhausted, gives up, or `token` is
/// cancelled. Every accepted frame publishes a fresh gesture record.
#[instrument(skip_all)]
pub fn run_capture_loop<S: LandmarkSource>(
    token: CancellationToken,
    mut source: S,
    settings: &CaptureSettings,
    tx_gesture_state: &watch::Sender<GestureState>,
) {
    info!("Started.");
    let mut consecutive_failures = 0;

    loop {
        if token.is_cancelled() {
            warn!("Cancelled.");
            break;
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => {
                consecutive_failures = 0;
                frame
            }
            Ok(None) => {
                info!("Landmark source exhausted.");
                publish(None, &settings.sensitivity, tx_gesture_state);
                break;
            }
            Err(e @ SourceError::Malformed { .. }) => {
                error!("Rejected frame. Error: {:#}", anyhow::Error::from(e));
                continue;
            }
            Err(e @ SourceError::FailedToRead(_)) => {
                consecutive_failures += 1;
                warn!(
                    "Treating frame as empty. Error: {:#}",
                    anyhow::Error::from(e)
                );
                publish(None, &settings.sensitivity, tx_gesture_state);
                if consecutive_failures >= MAX_CONSECUTIVE_READ_FAILURES {
                    error!(
                        "Giving up after {} consecutive read failures.",
                        consecutive_failures
                    );
                    break;
                }
                continue;
            }
        };

        match select_hand(frame, &settings.hand_tracking) {
            Ok(hand) => publish(hand.as_ref(), &settings.sensitivity, tx_gesture_state),
            Err(e) => error!("Rejected frame. Error: {}", e),
        }
    }
}

/// Pick the hand to classify: the first of at most `max_hands` detections
/// that meets `detection_confidence`. Detections without a score are
/// trusted.
pub fn select_hand(
    frame: LandmarkFrame,
    tracking: &HandTrackingSettings,
) -> Result<Option<HandLandmarks>, LandmarkError> {
    frame
        .hands
        .into_iter()
        .take(tracking.max_hands)
        .find(|hand| {
            hand.score
                .map_or(true, |score| score >= tracking.detection_confidence)
        })
        .map(|hand| HandLandmarks::try_from(hand.landmarks))
        .transpose()
}

/// Classify against the last published record and swap the result in.
fn publish(
    hand: Option<&HandLandmarks>,
    sensitivity: &SensitivityConfig,
    tx_gesture_state: &watch::Sender<GestureState>,
) {
    let previous = *tx_gesture_state.borrow();
    let next = classify(hand, sensitivity, &previous);
    if next.action != previous.action {
        debug!("Action changed: {} -> {}", previous.action, next.action);
    }
    trace!("Published {}", next);
    tx_gesture_state.send_replace(next);
}
