//! Relay server binary
//!
//! Run with: cargo run --bin relay -- [--bind ADDR] [--poll-timeout-secs N]
//!
//! ## Link (point-to-point)
//!
//!   curl -X POST --data 'hello' http://localhost:3001/link/my-link
//!   curl http://localhost:3001/link/my-link
//!
//! ## Mcast (multicast/replay)
//!
//!   curl -X POST --data 'hello' http://localhost:3001/mcast/my-channel
//!   curl -i 'http://localhost:3001/mcast/my-channel?sequenceId=1'
//!
//! The `x-relay-sequenceId` response header holds the `sequenceId` to ask
//! for next.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use relay_rs::server::config::{DEFAULT_MAX_PAYLOAD_SIZE, DEFAULT_PORT};
use relay_rs::{RelayServer, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "relay", version, about = "In-memory HTTP message relay")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value_t = SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)))]
    bind: SocketAddr,

    /// Answer pending polls with an empty body after this many seconds
    #[arg(long)]
    poll_timeout_secs: Option<u64>,

    /// Largest accepted payload in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD_SIZE)]
    max_payload_size: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("relay_rs=debug".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let mut config = ServerConfig::with_addr(args.bind).max_payload_size(args.max_payload_size);
    if let Some(secs) = args.poll_timeout_secs {
        config = config.poll_timeout(Duration::from_secs(secs));
    }

    let server = RelayServer::new(config);

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("Relay server stopped");
    Ok(())
}
