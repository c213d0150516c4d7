//! # relay-rs
//!
//! A transient, in-memory message relay reachable over HTTP.
//!
//! Producers post a payload to a named channel and consumers long-poll for
//! it. Two delivery models live side by side:
//!
//! - **link**: point-to-point queue, each message goes to exactly one consumer
//! - **mcast**: multicast/replay, each message gets a sequence id and can be
//!   read by any number of consumers from any position
//!
//! Nothing is persisted; messages expire after an hour and idle channels are
//! swept away.
//!
//! # Example
//!
//! ```no_run
//! use relay_rs::{RelayServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> relay_rs::Result<()> {
//!     let server = RelayServer::new(ServerConfig::default());
//!     server.run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await
//! }
//! ```
//!
//! The registries can also be used directly:
//!
//! ```
//! use relay_rs::Relay;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let relay = Relay::new();
//! relay.link().send("jobs", "hello").await;
//! assert_eq!(relay.link().get("jobs").await, "hello");
//! # }
//! ```

pub mod error;
pub mod registry;
pub mod relay;
pub mod server;

pub use error::{Error, Result};
pub use registry::{LinkRegistry, McastDelivery, McastRegistry, RegistryConfig};
pub use relay::Relay;
pub use server::{RelayServer, ServerConfig};
