use std::io;

use common::landmark::LandmarkFrame;
use thiserror::Error;

/// Identity of one consumer connection. Unique for the lifetime of a hub.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display, derive_more::From,
)]
pub struct SubscriberId(u64);

/// Anything that yields hand landmarks frame by frame. Calls may block.
pub trait LandmarkSource: Send {
    /// Wait for the next frame. Returns `Ok(None)` once the source is
    /// exhausted and will never produce another frame.
    fn next_frame(&mut self) -> Result<Option<LandmarkFrame>, SourceError>;
}

impl<S: LandmarkSource + ?Sized> LandmarkSource for &mut S {
    fn next_frame(&mut self) -> Result<Option<LandmarkFrame>, SourceError> {
        (**self).next_frame()
    }
}

impl<S: LandmarkSource + ?Sized> LandmarkSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<LandmarkFrame>, SourceError> {
        (**self).next_frame()
    }
}

#[derive(Error, Debug)]
pub enum SourceError {
    /// The underlying input failed. Counts as a frame without a hand.
    #[error("Failed to read from landmark source.")]
    FailedToRead(#[source] io::Error),

    /// A frame arrived but couldn't be understood. The frame is rejected.
    #[error("Malformed landmark frame on line {line}.")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// One outbound consumer connection. The hub keeps a handle to it but does
/// not own the connection itself.
pub trait Subscriber: Send + Sync {
    fn id(&self) -> SubscriberId;

    /// Queue a text message without blocking.
    fn send_text(&self, message: &str) -> Result<(), SubscriberError>;
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberError {
    /// The connection is gone; it will never accept another message.
    #[error("Connection closed.")]
    Closed,

    /// The consumer hasn't drained earlier messages yet. This message is
    /// dropped but the connection is still alive.
    #[error("Outbound queue full.")]
    QueueFull,
}
