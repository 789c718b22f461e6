use tokio::sync::watch;

use crate::ports::{Subscriber, SubscriberError, SubscriberId};

/// Hub-side handle of one WebSocket connection. Each send overwrites a
/// single-message slot drained by the connection's writer task, so a slow
/// consumer never holds up a tick and only ever sees the newest state.
pub struct WebSocketSubscriber {
    id: SubscriberId,
    tx_latest: watch::Sender<String>,
}

impl WebSocketSubscriber {
    pub fn new(id: SubscriberId, tx_latest: watch::Sender<String>) -> Self {
        Self { id, tx_latest }
    }
}

impl Subscriber for WebSocketSubscriber {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn send_text(&self, message: &str) -> Result<(), SubscriberError> {
        // Fails only once the writer has dropped its receiver.
        self.tx_latest
            .send(message.to_owned())
            .map_err(|_| SubscriberError::Closed)
    }
}
