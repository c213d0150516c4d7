//! Multicast/replay registry
//!
//! Every message sent to an mcast channel gets the channel's next sequence
//! id and stays readable by any number of consumers until it expires. Each
//! consumer tracks its own cursor: a read returns the payload at the cursor
//! together with the cursor to use next time.
//!
//! Buffered messages always cover a contiguous run of ids, from `oldest_seq`
//! up to (not including) `next_seq`. The buffer is a deque indexed by the
//! wrap-aware offset of an id from `oldest_seq`.

use std::collections::{HashMap, VecDeque};

use bytes::Bytes;
use tokio::sync::{oneshot, Mutex};
use tokio::time::Instant;

use super::config::RegistryConfig;
use super::expiry::{ExpiryPolicy, SweepReport};
use super::message::Message;
use super::sequence::SequenceSpace;

/// A payload read from an mcast channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McastDelivery {
    /// The message payload
    pub payload: Bytes,
    /// Cursor to pass on the next read
    pub sequence_id: u64,
}

/// State of a single mcast channel
#[derive(Debug)]
struct McastChannel {
    /// Id assigned to the next sent message
    next_seq: u64,
    /// Id of `buffer[0]`, or `next_seq` while the buffer is empty
    oldest_seq: u64,
    /// Live messages in id order starting at `oldest_seq`
    buffer: VecDeque<Message>,
    /// Consumers waiting for the next send
    waiters: Vec<oneshot::Sender<McastDelivery>>,
}

impl McastChannel {
    fn new() -> Self {
        Self {
            next_seq: SequenceSpace::FIRST,
            oldest_seq: SequenceSpace::FIRST,
            buffer: VecDeque::new(),
            waiters: Vec::new(),
        }
    }

    /// Look up the message stored under `id`
    fn message(&self, space: &SequenceSpace, id: u64) -> Option<&Message> {
        if !space.contains(id) {
            return None;
        }
        let offset = space.offset(self.oldest_seq, id);
        usize::try_from(offset)
            .ok()
            .and_then(|offset| self.buffer.get(offset))
    }

    /// Drop the oldest buffered message
    fn pop_oldest(&mut self, space: &SequenceSpace) -> Option<Message> {
        let message = self.buffer.pop_front()?;
        self.oldest_seq = space.next(self.oldest_seq);
        Some(message)
    }

    fn prune_waiters(&mut self) {
        self.waiters.retain(|waiter| !waiter.is_closed());
    }

    fn is_idle(&self) -> bool {
        self.buffer.is_empty() && self.waiters.is_empty()
    }
}

/// Result of polling an mcast channel
#[derive(Debug)]
pub enum McastPoll {
    /// The message at the cursor was buffered
    Ready(McastDelivery),
    /// Waiting for the next send on the channel
    Pending {
        /// Resolved by the next send
        rx: oneshot::Receiver<McastDelivery>,
        /// The id this poll is waiting on
        ///
        /// A caller that stops waiting can resume from here.
        position: u64,
    },
}

impl McastPoll {
    /// Wait for the delivery
    ///
    /// If the registry goes away first, resolves with an empty payload and
    /// the position that was being waited on.
    pub async fn wait(self) -> McastDelivery {
        match self {
            McastPoll::Ready(delivery) => delivery,
            McastPoll::Pending { rx, position } => rx.await.unwrap_or(McastDelivery {
                payload: Bytes::new(),
                sequence_id: position,
            }),
        }
    }

    /// The id this poll is waiting on, if it is still pending
    pub fn position(&self) -> Option<u64> {
        match self {
            McastPoll::Ready(_) => None,
            McastPoll::Pending { position, .. } => Some(*position),
        }
    }

    /// Whether the delivery is available without waiting
    pub fn is_ready(&self) -> bool {
        matches!(self, McastPoll::Ready(_))
    }
}

/// Statistics for an mcast channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct McastStats {
    /// Number of buffered messages
    pub buffered: usize,
    /// Total size of buffered payloads in bytes
    pub buffered_bytes: usize,
    /// Id the next sent message will get
    pub next_seq: u64,
    /// Id of the oldest buffered message
    pub oldest_seq: u64,
    /// Number of consumers waiting for the next send
    pub waiters: usize,
}

/// Registry of multicast channels
pub struct McastRegistry {
    channels: Mutex<HashMap<String, McastChannel>>,
    expiry: ExpiryPolicy,
    space: SequenceSpace,
}

impl McastRegistry {
    /// Create a new mcast registry with default configuration
    pub fn new() -> Self {
        Self::with_config(&RegistryConfig::default())
    }

    /// Create a new mcast registry with custom configuration
    pub fn with_config(config: &RegistryConfig) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            expiry: ExpiryPolicy::new(config.message_ttl),
            space: SequenceSpace::new(config.max_sequence_id),
        }
    }

    /// Send a payload to an mcast channel
    ///
    /// Buffers the payload under the channel's next id and resolves every
    /// waiting consumer with it. Waiters receive the new `next_seq`, i.e.
    /// the cursor for their following read.
    pub async fn send(&self, mcast_id: &str, payload: impl Into<Bytes>) {
        let payload = payload.into();
        let space = self.space;
        let mut channels = self.channels.lock().await;
        let channel = channels
            .entry(mcast_id.to_owned())
            .or_insert_with(McastChannel::new);

        // One message per id in 1..=max means every id is live: the one
        // about to be reused is the oldest, drop it so ids stay unique.
        if channel.buffer.len() as u64 >= space.max() {
            channel.pop_oldest(&space);
        }

        channel.buffer.push_back(Message::new(payload.clone()));
        let sequence_id = channel.next_seq;
        channel.next_seq = space.next(sequence_id);

        let delivery = McastDelivery {
            payload,
            sequence_id: channel.next_seq,
        };
        let waiters = std::mem::take(&mut channel.waiters);
        let woken = waiters
            .into_iter()
            .filter_map(|waiter| waiter.send(delivery.clone()).ok())
            .count();

        tracing::trace!(
            mcast = %mcast_id,
            sequence_id = sequence_id,
            woken = woken,
            "Message buffered"
        );
    }

    /// Poll an mcast channel
    ///
    /// Without a cursor the poll waits for the next message sent. With a
    /// cursor, a stale id is moved forward to the oldest buffered message,
    /// and a buffered id is returned immediately. Otherwise the caller waits
    /// for the next send.
    pub async fn poll(&self, mcast_id: &str, cursor: Option<u64>) -> McastPoll {
        let space = self.space;
        let mut channels = self.channels.lock().await;
        let channel = channels
            .entry(mcast_id.to_owned())
            .or_insert_with(McastChannel::new);

        let position = match cursor {
            None => channel.next_seq,
            Some(cursor) => space.clamp_cursor(cursor, channel.oldest_seq, channel.next_seq),
        };

        if let Some(message) = channel.message(&space, position) {
            return McastPoll::Ready(McastDelivery {
                payload: message.payload.clone(),
                sequence_id: space.next(position),
            });
        }

        let (tx, rx) = oneshot::channel();
        channel.prune_waiters();
        channel.waiters.push(tx);

        tracing::trace!(
            mcast = %mcast_id,
            position = position,
            waiters = channel.waiters.len(),
            "Waiting for next message"
        );

        McastPoll::Pending { rx, position }
    }

    /// Read from an mcast channel, waiting if nothing is available
    ///
    /// Equivalent to `poll(..).await.wait().await`.
    pub async fn get(&self, mcast_id: &str, cursor: Option<u64>) -> McastDelivery {
        self.poll(mcast_id, cursor).await.wait().await
    }

    /// Check if a channel exists
    pub async fn channel_exists(&self, mcast_id: &str) -> bool {
        self.channels.lock().await.contains_key(mcast_id)
    }

    /// Get channel statistics
    pub async fn stats(&self, mcast_id: &str) -> Option<McastStats> {
        let channels = self.channels.lock().await;

        channels.get(mcast_id).map(|channel| McastStats {
            buffered: channel.buffer.len(),
            buffered_bytes: channel.buffer.iter().map(Message::size).sum(),
            next_seq: channel.next_seq,
            oldest_seq: channel.oldest_seq,
            waiters: channel
                .waiters
                .iter()
                .filter(|waiter| !waiter.is_closed())
                .count(),
        })
    }

    /// Get total number of channels
    pub async fn channel_count(&self) -> usize {
        self.channels.lock().await.len()
    }

    /// Run one expiry pass using the current time
    pub async fn expire(&self) -> SweepReport {
        self.expire_at(Instant::now()).await
    }

    /// Run one expiry pass as if the clock read `now`
    ///
    /// Advances each channel's `oldest_seq` past messages older than the
    /// TTL, then removes every channel left with no messages and no waiting
    /// consumer.
    pub async fn expire_at(&self, now: Instant) -> SweepReport {
        let expiry = self.expiry;
        let space = self.space;
        let mut report = SweepReport::default();
        let mut channels = self.channels.lock().await;

        channels.retain(|mcast_id, channel| {
            while channel
                .buffer
                .front()
                .is_some_and(|message| expiry.is_expired(message, now))
            {
                channel.pop_oldest(&space);
                report.expired_messages += 1;
            }

            channel.prune_waiters();

            if channel.is_idle() {
                tracing::debug!(mcast = %mcast_id, "Idle mcast channel removed");
                report.removed_channels += 1;
                false
            } else {
                true
            }
        });

        report
    }
}

impl Default for McastRegistry {
    fn default() -> Self {
        Self::new()
    }
}
