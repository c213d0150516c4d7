//! Message expiry policy
//!
//! A message is stale once it has sat in a channel for longer than the
//! configured TTL. The policy is a pure function of "now" and the message
//! timestamp, so sweeps can be driven with an arbitrary clock reading.

use std::ops::AddAssign;
use std::time::Duration;

use tokio::time::Instant;

use super::message::Message;

/// Decides which messages are stale
#[derive(Debug, Clone, Copy)]
pub struct ExpiryPolicy {
    ttl: Duration,
}

impl ExpiryPolicy {
    /// Create a policy with the given time-to-live
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// The configured time-to-live
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether a message is older than the TTL as of `now`
    ///
    /// Compares the message's age instead of computing `now - ttl`, so a
    /// clock reading closer to its origin than the TTL never underflows.
    pub fn is_expired(&self, message: &Message, now: Instant) -> bool {
        now.saturating_duration_since(message.enqueued_at) > self.ttl
    }
}

/// Outcome of one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Messages dropped because they outlived the TTL
    pub expired_messages: usize,
    /// Channels removed because they held no data and no waiters
    pub removed_channels: usize,
}

impl AddAssign for SweepReport {
    fn add_assign(&mut self, other: Self) {
        self.expired_messages += other.expired_messages;
        self.removed_channels += other.removed_channels;
    }
}
