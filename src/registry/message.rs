//! Buffered message type
//!
//! Both registries store payloads as `bytes::Bytes`, so handing the same
//! message to several consumers (or replaying it) only bumps a reference
//! count.

use bytes::Bytes;
use tokio::time::Instant;

/// A payload waiting in a channel
#[derive(Debug, Clone)]
pub struct Message {
    /// Opaque payload (zero-copy via reference counting)
    pub payload: Bytes,
    /// When the message entered the registry
    pub enqueued_at: Instant,
}

impl Message {
    /// Create a message stamped with the current time
    pub fn new(payload: Bytes) -> Self {
        Self::at(payload, Instant::now())
    }

    /// Create a message with an explicit timestamp
    pub fn at(payload: Bytes, enqueued_at: Instant) -> Self {
        Self {
            payload,
            enqueued_at,
        }
    }

    /// Size of the payload in bytes
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}
