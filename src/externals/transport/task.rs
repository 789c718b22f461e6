use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use tokio::{net::TcpListener, sync::watch, time::timeout};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info, trace, warn};

use super::adapters::WebSocketSubscriber;
use crate::{config::TransportSettings, hub::BroadcastHub};

/// How long a closing connection may take to flush its close frame.
const CLOSE_FRAME_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Clone)]
struct TransportState {
    hub: Arc<BroadcastHub>,
    token: CancellationToken,
    connections: TaskTracker,
}

/// Bind the listening socket. Failing here is fatal for the process.
pub async fn bind(settings: &TransportSettings) -> Result<TcpListener> {
    TcpListener::bind((settings.host.as_str(), settings.port))
        .await
        .with_context(|| {
            format!(
                "Failed to bind transport server to {}:{}",
                settings.host, settings.port
            )
        })
}

/// Task: Accept WebSocket connections on `listener` and register each one
/// with the hub until cancelled. Open connections are closed on the way out.
#[tracing::instrument(skip_all)]
pub async fn task_serve_websocket_clients(
    token: CancellationToken,
    listener: TcpListener,
    hub: Arc<BroadcastHub>,
) {
    match listener.local_addr() {
        Ok(address) => info!("Started. Listening on ws://{}", address),
        Err(_) => info!("Started."),
    }

    let connections = TaskTracker::new();
    let app = Router::new()
        .route("/", get(websocket_handler))
        .with_state(TransportState {
            hub,
            token: token.clone(),
            connections: connections.clone(),
        });

    let shutdown = token.clone();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;
    if let Err(e) = result {
        error!("Transport server failed. Error: {}", e);
        token.cancel();
    }

    connections.close();
    connections.wait().await;
    warn!("Cancelled.");
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<TransportState>,
) -> impl IntoResponse {
    let connections = state.connections.clone();
    ws.on_upgrade(move |socket| connections.track_future(handle_websocket(socket, state)))
}

/// Drive one connection: a writer forwards the newest hub message to the
/// socket and a reader watches for the peer going away. The connection
/// leaves the roster when either side finishes. On shutdown the writer sends
/// a close frame first.
async fn handle_websocket(socket: WebSocket, state: TransportState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx_latest, mut rx_latest) = watch::channel(String::new());

    let id = state.hub.next_subscriber_id();
    state
        .hub
        .register(Arc::new(WebSocketSubscriber::new(id, tx_latest)))
        .await;
    info!(connection_id = %id, "WebSocket client connected.");

    let token = state.token.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    let close = sender.send(Message::Close(None));
                    if timeout(CLOSE_FRAME_TIMEOUT, close).await.is_err() {
                        debug!(connection_id = %id, "Timed out sending close frame.");
                    }
                    break;
                },
                changed = rx_latest.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let message = rx_latest.borrow_and_update().clone();
                    if let Err(e) = sender.send(Message::Text(message)).await {
                        debug!(connection_id = %id, "Failed to write to socket. Error: {}", e);
                        break;
                    }
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => {
                    debug!(connection_id = %id, "Client sent close.");
                    break;
                }
                Ok(_) => trace!(connection_id = %id, "Ignoring inbound message."),
                Err(e) => {
                    warn!(connection_id = %id, "WebSocket error. Error: {}", e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.hub.unregister(id).await;
    info!(connection_id = %id, "WebSocket client disconnected.");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use common::gesture::{Action, GestureState};
    use tokio_tungstenite::{connect_async, tungstenite};

    use super::*;

    const WAIT: Duration = Duration::from_secs(2);

    async fn wait_for_connections(hub: &BroadcastHub, expected: usize) {
        timeout(WAIT, async {
            while hub.connection_count().await != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("Connection count never settled");
    }

    async fn start_server() -> (
        String,
        Arc<BroadcastHub>,
        CancellationToken,
        tokio::task::JoinHandle<()>,
    ) {
        let listener = bind(&TransportSettings {
            host: String::from("127.0.0.1"),
            port: 0,
        })
        .await
        .expect("Failed to bind");
        let url = format!(
            "ws://{}/",
            listener.local_addr().expect("Failed to read local address")
        );
        let hub = Arc::new(BroadcastHub::new());
        let token = CancellationToken::new();
        let server = tokio::spawn(task_serve_websocket_clients(
            token.clone(),
            listener,
            hub.clone(),
        ));
        (url, hub, token, server)
    }

    #[tokio::test]
    async fn test_client_is_registered_served_and_removed_on_close() {
        let (url, hub, token, server) = start_server().await;

        let (mut client, _) = connect_async(url.as_str()).await.expect("Failed to connect");
        wait_for_connections(&hub, 1).await;

        let state = GestureState {
            detected: true,
            action: Action::Rotate,
            ..GestureState::default()
        };
        assert_eq!(hub.tick(&state).await.delivered, 1);

        let message = timeout(WAIT, client.next())
            .await
            .expect("No message within timeout")
            .expect("Stream ended")
            .expect("WebSocket error");
        let text = match message {
            tungstenite::Message::Text(text) => text,
            other => panic!("Expected a text message, got {:?}", other),
        };
        let received: GestureState = serde_json::from_str(&text).expect("Failed to parse payload");
        assert_eq!(received, state);

        client.close(None).await.expect("Failed to close");
        wait_for_connections(&hub, 0).await;

        token.cancel();
        timeout(WAIT, server)
            .await
            .expect("Server did not stop")
            .expect("Server task panicked");
    }

    #[tokio::test]
    async fn test_shutdown_sends_close_and_unregisters() {
        let (url, hub, token, server) = start_server().await;

        let (mut client, _) = connect_async(url.as_str()).await.expect("Failed to connect");
        wait_for_connections(&hub, 1).await;

        token.cancel();

        let message = timeout(WAIT, client.next())
            .await
            .expect("No close frame within timeout")
            .expect("Stream ended")
            .expect("WebSocket error");
        assert!(matches!(message, tungstenite::Message::Close(_)));

        timeout(WAIT, server)
            .await
            .expect("Server did not stop")
            .expect("Server task panicked");
        assert_eq!(hub.connection_count().await, 0);
    }
}
