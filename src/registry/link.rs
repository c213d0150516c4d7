//! Point-to-point link registry
//!
//! Every message sent to a link channel is delivered to exactly one consumer.
//! Messages queue up FIFO while nobody is polling. A channel holds at most one
//! waiting consumer: a new poll pre-empts the previous one, which resolves
//! with an empty payload.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{oneshot, Mutex};
use tokio::time::Instant;

use super::config::RegistryConfig;
use super::expiry::{ExpiryPolicy, SweepReport};
use super::message::Message;

type Channels = Arc<Mutex<HashMap<String, LinkChannel>>>;

/// State of a single link channel
#[derive(Debug, Default)]
struct LinkChannel {
    /// Messages nobody has picked up yet, oldest first
    queue: VecDeque<Message>,
    /// The consumer waiting for the next message; only set while `queue` is empty.
    /// `None` on the wire means the consumer was pre-empted.
    waiter: Option<oneshot::Sender<Option<Bytes>>>,
}

impl LinkChannel {
    /// Hand a payload to the waiting consumer
    ///
    /// Gives the payload back if nobody is listening.
    fn deliver(&mut self, payload: Bytes) -> Option<Bytes> {
        let waiter = match self.waiter.take() {
            Some(waiter) => waiter,
            None => return Some(payload),
        };

        match waiter.send(Some(payload)) {
            Ok(()) => None,
            Err(returned) => returned,
        }
    }

    /// Forget a waiter whose consumer stopped listening
    fn prune_waiter(&mut self) {
        if self.waiter.as_ref().is_some_and(|w| w.is_closed()) {
            self.waiter = None;
        }
    }

    fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.waiter.is_none()
    }
}

/// Put a payload a consumer never read back at the head of its channel
fn restore(channels: &mut HashMap<String, LinkChannel>, link_id: &str, payload: Bytes) {
    let channel = channels.entry(link_id.to_owned()).or_default();

    if let Some(payload) = channel.deliver(payload) {
        channel.queue.push_front(Message::new(payload));
    }
    tracing::debug!(link = %link_id, "Unread payload returned to channel");
}

/// Result of polling a link channel
///
/// The poll is registered with the channel the moment it is created, so a
/// later poll pre-empts it even if this handle has not been awaited yet.
#[derive(Debug)]
pub enum LinkPoll {
    /// A queued message was available
    Ready(Bytes),
    /// Waiting for the next send (or pre-emption)
    Pending(LinkWaiter),
}

impl LinkPoll {
    /// Wait for the payload
    ///
    /// Resolves with an empty payload if the poll was pre-empted or the
    /// registry went away.
    pub async fn wait(self) -> Bytes {
        match self {
            LinkPoll::Ready(payload) => payload,
            LinkPoll::Pending(mut waiter) => waiter.recv().await,
        }
    }

    /// Wait at most `timeout` for the payload
    ///
    /// Resolves with an empty payload if nothing arrived in time.
    pub async fn wait_timeout(self, timeout: Duration) -> Bytes {
        match self {
            LinkPoll::Ready(payload) => payload,
            LinkPoll::Pending(mut waiter) => waiter.recv_timeout(timeout).await,
        }
    }

    /// Whether the payload is available without waiting
    pub fn is_ready(&self) -> bool {
        matches!(self, LinkPoll::Ready(_))
    }
}

/// A consumer registered as the waiter of a link channel
///
/// A payload handed to the waiter is never lost: dropping the waiter before
/// reading it puts the payload back at the head of the channel.
#[derive(Debug)]
pub struct LinkWaiter {
    rx: Option<oneshot::Receiver<Option<Bytes>>>,
    channels: Channels,
    link_id: String,
}

impl LinkWaiter {
    /// Wait for the payload
    ///
    /// Resolves with an empty payload if the poll was pre-empted, the
    /// registry went away, or the payload was already received. Dropping
    /// this future before it resolves keeps the waiter registered.
    pub async fn recv(&mut self) -> Bytes {
        let Some(rx) = self.rx.as_mut() else {
            return Bytes::new();
        };

        let result = rx.await;
        self.rx = None;
        result.ok().flatten().unwrap_or_default()
    }

    /// Wait at most `timeout` for the payload
    ///
    /// On timeout the waiter is closed, but a payload that was handed over
    /// while the timer fired is still returned.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Bytes {
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(payload) => payload,
            Err(_) => self.cancel().unwrap_or_default(),
        }
    }

    /// Stop waiting
    ///
    /// Later sends are queued instead. Returns the payload if one was handed
    /// over before the waiter closed.
    pub fn cancel(&mut self) -> Option<Bytes> {
        let mut rx = self.rx.take()?;
        rx.close();
        rx.try_recv().ok().flatten()
    }
}

impl Drop for LinkWaiter {
    fn drop(&mut self) {
        let Some(payload) = self.cancel() else {
            return;
        };

        if let Ok(mut channels) = self.channels.try_lock() {
            restore(&mut channels, &self.link_id, payload);
            return;
        }

        // Registry is busy; hand the payload back from a task
        let channels = Arc::clone(&self.channels);
        let link_id = std::mem::take(&mut self.link_id);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    restore(&mut *channels.lock().await, &link_id, payload);
                });
            }
            Err(_) => {
                tracing::warn!(link = %link_id, "Unread payload dropped outside a runtime");
            }
        }
    }
}

/// Statistics for a link channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStats {
    /// Number of queued messages
    pub queued: usize,
    /// Total size of queued payloads in bytes
    pub queued_bytes: usize,
    /// Whether a consumer is currently waiting
    pub has_waiter: bool,
}

/// Registry of point-to-point channels
pub struct LinkRegistry {
    channels: Channels,
    expiry: ExpiryPolicy,
}

impl LinkRegistry {
    /// Create a new link registry with default configuration
    pub fn new() -> Self {
        Self::with_config(&RegistryConfig::default())
    }

    /// Create a new link registry with custom configuration
    pub fn with_config(config: &RegistryConfig) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            expiry: ExpiryPolicy::new(config.message_ttl),
        }
    }

    /// Send a payload to a link channel
    ///
    /// Hands the payload straight to a waiting consumer if there is one,
    /// otherwise queues it.
    pub async fn send(&self, link_id: &str, payload: impl Into<Bytes>) {
        let mut channels = self.channels.lock().await;
        let channel = channels.entry(link_id.to_owned()).or_default();

        match channel.deliver(payload.into()) {
            None => tracing::trace!(link = %link_id, "Delivered to waiting consumer"),
            Some(payload) => {
                channel.queue.push_back(Message::new(payload));
                tracing::trace!(link = %link_id, queued = channel.queue.len(), "Message queued");
            }
        }
    }

    /// Poll a link channel
    ///
    /// Pops the oldest queued message if there is one. Otherwise registers
    /// the caller as the channel's only waiter, pre-empting any earlier one.
    pub async fn poll(&self, link_id: &str) -> LinkPoll {
        let mut channels = self.channels.lock().await;
        let channel = channels.entry(link_id.to_owned()).or_default();

        if let Some(message) = channel.queue.pop_front() {
            return LinkPoll::Ready(message.payload);
        }

        let (tx, rx) = oneshot::channel();
        if let Some(previous) = channel.waiter.replace(tx) {
            if previous.send(None).is_ok() {
                tracing::debug!(link = %link_id, "Pending poll pre-empted by newer poll");
            }
        }

        LinkPoll::Pending(LinkWaiter {
            rx: Some(rx),
            channels: Arc::clone(&self.channels),
            link_id: link_id.to_owned(),
        })
    }

    /// Receive the next payload from a link channel
    ///
    /// Equivalent to `poll(..).await.wait().await`.
    pub async fn get(&self, link_id: &str) -> Bytes {
        self.poll(link_id).await.wait().await
    }

    /// Check if a channel exists
    pub async fn channel_exists(&self, link_id: &str) -> bool {
        self.channels.lock().await.contains_key(link_id)
    }

    /// Get channel statistics
    pub async fn stats(&self, link_id: &str) -> Option<LinkStats> {
        let channels = self.channels.lock().await;

        channels.get(link_id).map(|channel| LinkStats {
            queued: channel.queue.len(),
            queued_bytes: channel.queue.iter().map(Message::size).sum(),
            has_waiter: channel.waiter.as_ref().is_some_and(|w| !w.is_closed()),
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
    /// Drops queued messages older than the TTL, then removes every channel
    /// left with no messages and no waiting consumer.
    pub async fn expire_at(&self, now: Instant) -> SweepReport {
        let expiry = self.expiry;
        let mut report = SweepReport::default();
        let mut channels = self.channels.lock().await;

        channels.retain(|link_id, channel| {
            while channel
                .queue
                .front()
                .is_some_and(|message| expiry.is_expired(message, now))
            {
                channel.queue.pop_front();
                report.expired_messages += 1;
            }

            channel.prune_waiter();

            if channel.is_idle() {
                tracing::debug!(link = %link_id, "Idle link channel removed");
                report.removed_channels += 1;
                false
            } else {
                true
            }
        });

        report
    }
}

impl Default for LinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_test::{assert_pending, assert_ready_eq, task};

    use super::*;

    const LINK_ID: &str = "abc-xyz";

    #[tokio::test]
    async fn test_send_then_get() {
        let registry = LinkRegistry::new();

        registry.send(LINK_ID, "a message").await;

        assert_eq!(registry.get(LINK_ID).await, "a message");
    }

    #[tokio::test]
    async fn test_get_then_send() {
        let registry = LinkRegistry::new();

        let pending = registry.poll(LINK_ID).await;
        assert!(!pending.is_ready());

        registry.send(LINK_ID, "waiting for Rossini").await;

        assert_eq!(pending.wait().await, "waiting for Rossini");
    }

    #[tokio::test]
    async fn test_poll_stays_pending_until_send() {
        let registry = LinkRegistry::new();

        let mut pending = task::spawn(registry.get(LINK_ID));
        assert_pending!(pending.poll());

        registry.send(LINK_ID, "finally").await;

        assert!(pending.is_woken());
        assert_ready_eq!(pending.poll(), Bytes::from_static(b"finally"));
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let registry = LinkRegistry::new();

        registry.send(LINK_ID, "first message").await;
        registry.send(LINK_ID, "second message").await;
        registry.send(LINK_ID, "third message").await;

        assert_eq!(registry.get(LINK_ID).await, "first message");
        assert_eq!(registry.get(LINK_ID).await, "second message");
        assert_eq!(registry.get(LINK_ID).await, "third message");
    }

    #[tokio::test]
    async fn test_second_poll_preempts_first() {
        let registry = LinkRegistry::new();

        let first = registry.poll(LINK_ID).await;
        let second = registry.poll(LINK_ID).await;
        registry.send(LINK_ID, "waiting for Rossini").await;

        assert_eq!(first.wait().await, "");
        assert_eq!(second.wait().await, "waiting for Rossini");
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let registry = LinkRegistry::new();
        let other = "a different channel";

        registry.send(other, "first message").await;
        registry.send(LINK_ID, "second message").await;
        registry.send(other, "third message").await;

        assert_eq!(registry.get(other).await, "first message");
        assert_eq!(registry.get(other).await, "third message");
        assert_eq!(registry.get(LINK_ID).await, "second message");
    }

    #[tokio::test]
    async fn test_abandoned_poll_does_not_lose_message() {
        let registry = LinkRegistry::new();

        let abandoned = registry.poll(LINK_ID).await;
        drop(abandoned);

        registry.send(LINK_ID, "kept").await;

        let stats = registry.stats(LINK_ID).await.unwrap();
        assert_eq!(stats.queued, 1);
        assert!(!stats.has_waiter);
        assert_eq!(registry.get(LINK_ID).await, "kept");
    }

    #[tokio::test]
    async fn test_dropped_poll_returns_delivered_payload() {
        let registry = LinkRegistry::new();

        let poll = registry.poll(LINK_ID).await;
        registry.send(LINK_ID, "precious").await;
        drop(poll);

        let stats = registry.stats(LINK_ID).await.unwrap();
        assert_eq!(stats.queued, 1);
        assert_eq!(registry.get(LINK_ID).await, "precious");
    }

    #[tokio::test]
    async fn test_returned_payload_stays_first_in_line() {
        let registry = LinkRegistry::new();

        let poll = registry.poll(LINK_ID).await;
        registry.send(LINK_ID, "first message").await;
        registry.send(LINK_ID, "second message").await;
        drop(poll);

        assert_eq!(registry.get(LINK_ID).await, "first message");
        assert_eq!(registry.get(LINK_ID).await, "second message");
    }

    #[tokio::test]
    async fn test_returned_payload_goes_to_next_waiter() {
        let registry = LinkRegistry::new();

        let abandoned = registry.poll(LINK_ID).await;
        registry.send(LINK_ID, "handed on").await;
        let next = registry.poll(LINK_ID).await;
        drop(abandoned);

        assert_eq!(next.wait().await, "handed on");
    }

    #[tokio::test]
    async fn test_cancel_keeps_payload_sent_as_wait_gives_up() {
        let registry = LinkRegistry::new();

        let LinkPoll::Pending(mut waiter) = registry.poll(LINK_ID).await else {
            panic!("empty channel should make the poll wait");
        };

        // A timed-out wait drops its future, then the payload lands
        let mut recv = task::spawn(waiter.recv());
        assert_pending!(recv.poll());
        drop(recv);
        registry.send(LINK_ID, "just in time").await;

        assert_eq!(waiter.cancel().unwrap(), "just in time");
        assert_eq!(waiter.cancel(), None);

        // The closed waiter no longer receives anything
        registry.send(LINK_ID, "after cancel").await;
        assert_eq!(registry.stats(LINK_ID).await.unwrap().queued, 1);
    }

    #[tokio::test]
    async fn test_cancel_does_not_report_preemption_as_payload() {
        let registry = LinkRegistry::new();

        let LinkPoll::Pending(mut first) = registry.poll(LINK_ID).await else {
            panic!("empty channel should make the poll wait");
        };
        let _second = registry.poll(LINK_ID).await;

        assert_eq!(first.cancel(), None);
        assert_eq!(registry.stats(LINK_ID).await.unwrap().queued, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_timeout_then_send_queues() {
        let registry = LinkRegistry::new();

        let poll = registry.poll(LINK_ID).await;
        assert_eq!(poll.wait_timeout(Duration::from_secs(30)).await, "");

        registry.send(LINK_ID, "late").await;

        assert_eq!(registry.stats(LINK_ID).await.unwrap().queued, 1);
        assert_eq!(registry.get(LINK_ID).await, "late");
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_old_messages() {
        let registry = LinkRegistry::new();

        registry.send(LINK_ID, "first message that will expire").await;
        tokio::time::advance(Duration::from_millis(1)).await;
        registry.send(LINK_ID, "second message that will not").await;
        tokio::time::advance(Duration::from_millis(3_600_000)).await;

        let report = registry.expire().await;

        assert_eq!(report.expired_messages, 1);
        assert_eq!(report.removed_channels, 0);
        assert_eq!(registry.get(LINK_ID).await, "second message that will not");
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_channel_when_all_messages_expire() {
        let registry = LinkRegistry::new();

        registry.send(LINK_ID, "first message - will expire").await;
        registry.send(LINK_ID, "second message - will expire").await;
        registry.send(LINK_ID, "third message - will expire").await;
        tokio::time::advance(Duration::from_millis(3_600_001)).await;

        let report = registry.expire().await;

        assert_eq!(report.expired_messages, 3);
        assert_eq!(report.removed_channels, 1);
        assert!(!registry.channel_exists(LINK_ID).await);
    }

    #[tokio::test]
    async fn test_keep_channel_with_pending_poll() {
        let registry = LinkRegistry::new();

        let _pending = registry.poll(LINK_ID).await;
        let report = registry.expire().await;

        assert_eq!(report.removed_channels, 0);
        assert!(registry.channel_exists(LINK_ID).await);
    }

    #[tokio::test]
    async fn test_remove_channel_with_abandoned_poll() {
        let registry = LinkRegistry::new();

        drop(registry.poll(LINK_ID).await);
        registry.expire().await;

        assert!(!registry.channel_exists(LINK_ID).await);
        assert_eq!(registry.channel_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_ttl() {
        let config = RegistryConfig::default().message_ttl(Duration::from_secs(5));
        let registry = LinkRegistry::with_config(&config);

        registry.send(LINK_ID, "short lived").await;
        tokio::time::advance(Duration::from_secs(6)).await;
        registry.expire().await;

        assert!(!registry.channel_exists(LINK_ID).await);
    }
}
