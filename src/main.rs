pub mod classifier;
pub mod config;
pub mod externals;
pub mod hub;
pub mod ports;
pub mod tasks;

use std::{path::PathBuf, sync::Arc, thread::JoinHandle, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use common::gesture::GestureState;
use config::Settings;
use externals::{
    landmark_source::adapters::JsonLinesLandmarkSource,
    transport::task::{bind, task_serve_websocket_clients},
};
use hub::BroadcastHub;
use ports::LandmarkSource;
use tasks::{
    broadcast::task_broadcast_gesture_state,
    capture::{spawn_capture_thread, CaptureSettings},
};
use tokio::{signal, sync::watch};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::level_filters::LevelFilter;

/// How long shutdown waits for the capture thread to notice cancellation.
const CAPTURE_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "gesture_control")]
#[command(about = "Classify hand landmarks into gestures and stream them to WebSocket clients")]
struct Args {
    /// Settings file. Defaults are used if it doesn't exist.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// JSON-lines landmark frames to read instead of stdin.
    #[arg(long)]
    landmarks: Option<PathBuf>,

    /// Maximum log level (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// Print the effective settings as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false)
        .with_max_level(args.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = Settings::load(&args.config).context("Failed to load settings")?;
    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    let source: Box<dyn LandmarkSource> = match &args.landmarks {
        Some(path) => Box::new(
            JsonLinesLandmarkSource::open(path)
                .with_context(|| format!("Failed to open landmark file '{}'", path.display()))?,
        ),
        None => Box::new(JsonLinesLandmarkSource::stdin()),
    };

    let listener = bind(&settings.transport).await?;

    let tracker = TaskTracker::new();
    let token = CancellationToken::new();
    let hub = Arc::new(BroadcastHub::new());

    // NOTE: The capture thread is the only writer. Readers copy out.
    let (tx_gesture_state, rx_gesture_state) = watch::channel(GestureState::default());

    let capture_thread = spawn_capture_thread(
        token.clone(),
        source,
        CaptureSettings {
            hand_tracking: settings.hand_tracking.clone(),
            sensitivity: settings.gesture_sensitivity.clone(),
        },
        tx_gesture_state,
    )?;

    let token_clone = token.clone();
    let hub_clone = hub.clone();
    tracker.spawn(async move {
        task_serve_websocket_clients(token_clone, listener, hub_clone).await
    });

    let token_clone = token.clone();
    let hub_clone = hub.clone();
    let period = settings.camera.frame_period();
    tracker.spawn(async move {
        task_broadcast_gesture_state(token_clone, hub_clone, rx_gesture_state, period).await
    });

    let token_clone = token.clone();

    tokio::select! {
        _ = token_clone.cancelled() => {}
        res = signal::ctrl_c() => {
            match res {
                Ok(_) => {
                    tracing::info!("Shutting down.");
                    token.cancel();
                },
                Err(e) => {
                    tracing::error!("Failed to listen for ctrl_c. Error: {}", e);
                    token.cancel();
                }
            };
        },
    }

    tracker.close();
    tracker.wait().await;

    wait_for_capture_thread(capture_thread).await;

    Ok(())
}

/// Give the capture thread a bounded window to finish. A source blocked on
/// input (e.g. an idle stdin) can't observe cancellation, so it is left to
/// end with the process rather than hang shutdown.
async fn wait_for_capture_thread(handle: JoinHandle<()>) {
    let deadline = tokio::time::Instant::now() + CAPTURE_SHUTDOWN_GRACE;
    while !handle.is_finished() {
        if tokio::time::Instant::now() >= deadline {
            tracing::warn!("Capture thread still blocked on its landmark source. Not waiting.");
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    if handle.join().is_err() {
        tracing::error!("Capture thread panicked.");
    }
}
