//! Fan-out of the latest gesture record to every connected consumer.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use common::gesture::GestureState;
use tokio::sync::RwLock;
use tracing::{debug, error, info, trace, warn};

use crate::ports::{Subscriber, SubscriberError, SubscriberId};

/// Outcome of one broadcast tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Members that accepted the message.
    pub delivered: usize,
    /// Members too far behind to take this message. Still registered.
    pub skipped: usize,
    /// Members found closed and removed from the roster.
    pub pruned: usize,
}

/// Holds the roster of live subscribers and pushes gesture records to them.
///
/// The roster is shared between the transport (register on accept,
/// unregister on close) and the broadcast task (prune on failed send); all
/// three go through the same lock. The lock is never held across a send.
pub struct BroadcastHub {
    roster: RwLock<HashMap<SubscriberId, Arc<dyn Subscriber>>>,
    next_id: AtomicU64,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            roster: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Hand out an id for a new connection.
    pub fn next_subscriber_id(&self) -> SubscriberId {
        SubscriberId::from(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Add a subscriber. Registering an id that is already present is a no-op.
    pub async fn register(&self, subscriber: Arc<dyn Subscriber>) {
        let id = subscriber.id();
        let mut roster = self.roster.write().await;
        if roster.contains_key(&id) {
            debug!(connection_id = %id, "Already registered.");
            return;
        }
        roster.insert(id, subscriber);
        info!(connection_id = %id, connections = roster.len(), "Subscriber registered.");
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub async fn unregister(&self, id: SubscriberId) {
        let mut roster = self.roster.write().await;
        if roster.remove(&id).is_some() {
            info!(connection_id = %id, connections = roster.len(), "Subscriber unregistered.");
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.roster.read().await.len()
    }

    /// Serialize `state` once and offer it to every current member.
    ///
    /// Members are snapshotted first, so everyone in this tick sees the same
    /// payload and registrations that land mid-tick wait for the next one.
    /// Closed members are removed after the sweep. A failing member never
    /// stops delivery to the others. An empty roster costs nothing.
    pub async fn tick(&self, state: &GestureState) -> TickReport {
        let members: Vec<Arc<dyn Subscriber>> = {
            let roster = self.roster.read().await;
            if roster.is_empty() {
                return TickReport::default();
            }
            roster.values().cloned().collect()
        };

        let message = match serde_json::to_string(state) {
            Ok(message) => message,
            Err(e) => {
                error!("Failed to serialize gesture state. Error: {}", e);
                return TickReport::default();
            }
        };

        let mut report = TickReport::default();
        let mut closed: Vec<SubscriberId> = vec![];
        for member in members {
            match member.send_text(&message) {
                Ok(()) => report.delivered += 1,
                Err(SubscriberError::QueueFull) => {
                    debug!(connection_id = %member.id(), "Subscriber lagging. Skipped this tick.");
                    report.skipped += 1;
                }
                Err(SubscriberError::Closed) => {
                    warn!(connection_id = %member.id(), "Send failed. Connection closed.");
                    closed.push(member.id());
                }
            }
        }

        if !closed.is_empty() {
            let mut roster = self.roster.write().await;
            for id in closed {
                if roster.remove(&id).is_some() {
                    report.pruned += 1;
                }
            }
            info!(
                pruned = report.pruned,
                connections = roster.len(),
                "Pruned closed subscribers."
            );
        }

        trace!(
            "Tick delivered={} skipped={} pruned={}",
            report.delivered,
            report.skipped,
            report.pruned
        );
        report
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}
