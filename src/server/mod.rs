//! HTTP server exposing the relay registries

pub mod config;
pub mod listener;
pub mod routes;

pub use config::ServerConfig;
pub use listener::RelayServer;
pub use routes::{router, AppState, StatsResponse, SEQUENCE_ID_HEADER, SEQUENCE_ID_QUERY};
