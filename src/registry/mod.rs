//! Channel registries
//!
//! Two independent registries map channel ids to in-memory message state:
//!
//! - [`LinkRegistry`]: point-to-point. Each message goes to exactly one
//!   consumer; at most one consumer waits per channel.
//! - [`McastRegistry`]: multicast/replay. Each message gets a wrapping
//!   sequence id and can be read by any number of consumers until it
//!   expires.
//!
//! # Architecture
//!
//! ```text
//!                 Relay
//!      ┌────────────┴─────────────┐
//!      │                          │
//!      ▼                          ▼
//!  Arc<LinkRegistry>       Arc<McastRegistry>
//!  ┌──────────────────┐    ┌──────────────────────────┐
//!  │ id -> LinkChannel│    │ id -> McastChannel       │
//!  │   queue (FIFO)   │    │   next_seq / oldest_seq  │
//!  │   waiter: 0..1   │    │   buffer (by seq id)     │
//!  └────────▲─────────┘    │   waiters: 0..n          │
//!           │              └────────────▲─────────────┘
//!           └──────────┬────────────────┘
//!                      │ every sweep_interval
//!                   Sweeper
//! ```
//!
//! # Suspension
//!
//! A poll that finds no data registers a `oneshot` sender with the channel
//! and returns the receiver to the caller. The registry lock is only held
//! while mutating channel state and resolving waiters; callers await the
//! receiver after the lock is released.
//!
//! Channels are created on first use and removed by the sweep once they
//! hold no messages and nobody is waiting on them.

pub mod config;
pub mod expiry;
pub mod link;
pub mod mcast;
pub mod message;
pub mod sequence;
pub mod sweeper;

pub use config::RegistryConfig;
pub use expiry::{ExpiryPolicy, SweepReport};
pub use link::{LinkPoll, LinkRegistry, LinkStats, LinkWaiter};
pub use mcast::{McastDelivery, McastPoll, McastRegistry, McastStats};
pub use message::Message;
pub use sequence::SequenceSpace;
pub use sweeper::Sweeper;
