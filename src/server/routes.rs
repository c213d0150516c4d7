//! HTTP endpoints
//!
//! | Method | Path                          | Registry call        |
//! |--------|-------------------------------|----------------------|
//! | POST   | `/link/{link_id}`             | `LinkRegistry::send` |
//! | GET    | `/link/{link_id}`             | `LinkRegistry::poll` |
//! | POST   | `/mcast/{mcast_id}`           | `McastRegistry::send`|
//! | GET    | `/mcast/{mcast_id}?sequenceId`| `McastRegistry::poll`|
//! | GET    | `/stats`                      | channel counts       |
//!
//! Payloads travel as raw request/response bodies. Mcast reads carry the
//! cursor for the next read in the `x-relay-sequenceId` header.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{Error, Result};
use crate::registry::{LinkRegistry, McastDelivery, McastRegistry};
use crate::relay::Relay;

use super::config::ServerConfig;

/// Response header carrying the next mcast cursor
pub const SEQUENCE_ID_HEADER: &str = "x-relay-sequenceid";

/// Query parameter carrying the mcast cursor
pub const SEQUENCE_ID_QUERY: &str = "sequenceId";

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    link: Arc<LinkRegistry>,
    mcast: Arc<McastRegistry>,
    poll_timeout: Option<Duration>,
}

impl AppState {
    /// Build handler state from a relay
    pub fn new(relay: &Relay, config: &ServerConfig) -> Self {
        Self {
            link: Arc::clone(relay.link()),
            mcast: Arc::clone(relay.mcast()),
            poll_timeout: config.poll_timeout,
        }
    }
}

#[derive(Debug, Deserialize)]
struct McastQuery {
    #[serde(rename = "sequenceId")]
    sequence_id: Option<u64>,
}

/// Body of `GET /stats`
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatsResponse {
    pub link_channels: usize,
    pub mcast_channels: usize,
}

/// Build the router with CORS, tracing and the body limit applied
pub fn router(relay: &Relay, config: &ServerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(SEQUENCE_ID_HEADER)]);

    Router::new()
        .route("/link/{link_id}", get(link_get).post(link_post))
        .route("/mcast/{mcast_id}", get(mcast_get).post(mcast_post))
        .route("/stats", get(stats))
        .layer(DefaultBodyLimit::max(config.max_payload_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(relay, config))
}

async fn link_post(
    State(state): State<AppState>,
    Path(link_id): Path<String>,
    payload: Bytes,
) -> StatusCode {
    state.link.send(&link_id, payload).await;
    StatusCode::OK
}

async fn link_get(State(state): State<AppState>, Path(link_id): Path<String>) -> Bytes {
    let poll = state.link.poll(&link_id).await;

    // A client that disconnects drops the poll, which returns any payload
    // already handed to it.
    match state.poll_timeout {
        Some(timeout) => poll.wait_timeout(timeout).await,
        None => poll.wait().await,
    }
}

async fn mcast_post(
    State(state): State<AppState>,
    Path(mcast_id): Path<String>,
    payload: Bytes,
) -> StatusCode {
    state.mcast.send(&mcast_id, payload).await;
    StatusCode::OK
}

async fn mcast_get(
    State(state): State<AppState>,
    Path(mcast_id): Path<String>,
    query: std::result::Result<Query<McastQuery>, QueryRejection>,
) -> Result<Response> {
    // Stale cursors (0 included) are clamped by the registry; ids past the
    // end of the space just wait.
    let Query(query) = query.map_err(|rejection| Error::InvalidQuery(rejection.body_text()))?;
    let poll = state.mcast.poll(&mcast_id, query.sequence_id).await;
    let delivery = match (state.poll_timeout, poll.position()) {
        (Some(timeout), Some(position)) => tokio::time::timeout(timeout, poll.wait())
            .await
            .unwrap_or(McastDelivery {
                payload: Bytes::new(),
                sequence_id: position,
            }),
        _ => poll.wait().await,
    };

    Ok((
        [(SEQUENCE_ID_HEADER, delivery.sequence_id.to_string())],
        delivery.payload,
    )
        .into_response())
}

async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        link_channels: state.link.channel_count().await,
        mcast_channels: state.mcast.channel_count().await,
    })
}
