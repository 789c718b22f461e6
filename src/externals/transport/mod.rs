//! WebSocket server that turns every accepted connection into a hub
//! subscriber.

pub mod adapters;
pub mod task;
