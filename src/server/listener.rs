//! Relay HTTP server
//!
//! Binds the listener, starts the expiry sweep and serves the router until
//! shut down.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;

use crate::error::Result;
use crate::registry::RegistryConfig;
use crate::relay::Relay;
use crate::server::config::ServerConfig;
use crate::server::routes;

/// HTTP relay server
pub struct RelayServer {
    config: ServerConfig,
    relay: Relay,
}

impl RelayServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self::with_registry_config(config, RegistryConfig::default())
    }

    /// Create a new server with custom registry configuration
    pub fn with_registry_config(config: ServerConfig, registry_config: RegistryConfig) -> Self {
        Self {
            config,
            relay: Relay::with_config(registry_config),
        }
    }

    /// Get a reference to the relay state
    pub fn relay(&self) -> &Relay {
        &self.relay
    }

    /// Build the HTTP router over this server's relay
    pub fn router(&self) -> Router {
        routes::router(&self.relay, &self.config)
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server until `shutdown` completes
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` completes
    ///
    /// Pending long polls are dropped on shutdown rather than drained, since
    /// they may otherwise wait forever.
    pub async fn serve<F>(mut self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "Relay server listening");

        self.relay.initialise();
        let app = self.router();

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = axum::serve(listener, app).into_future() => result,
        };

        self.relay.shutdown();

        result.map_err(Into::into)
    }
}
