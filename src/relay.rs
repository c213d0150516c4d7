//! Relay state and lifecycle
//!
//! [`Relay`] owns both registries and the background sweep. It is built
//! explicitly and handed to whoever serves requests; there is no global
//! instance.

use std::sync::Arc;

use crate::registry::{sweeper, LinkRegistry, McastRegistry, RegistryConfig, SweepReport, Sweeper};

/// The link and mcast registries plus their expiry sweep
pub struct Relay {
    link: Arc<LinkRegistry>,
    mcast: Arc<McastRegistry>,
    config: RegistryConfig,
    sweeper: Option<Sweeper>,
}

impl Relay {
    /// Create a relay with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a relay with custom registry configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            link: Arc::new(LinkRegistry::with_config(&config)),
            mcast: Arc::new(McastRegistry::with_config(&config)),
            config,
            sweeper: None,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// The point-to-point registry
    pub fn link(&self) -> &Arc<LinkRegistry> {
        &self.link
    }

    /// The multicast registry
    pub fn mcast(&self) -> &Arc<McastRegistry> {
        &self.mcast
    }

    /// Start the expiry sweep
    ///
    /// Must be called from within a Tokio runtime. Calling it while the
    /// sweep is already running does nothing.
    pub fn initialise(&mut self) {
        if self.sweeper.is_some() {
            return;
        }

        self.sweeper = Some(Sweeper::spawn(
            Arc::clone(&self.link),
            Arc::clone(&self.mcast),
            self.config.sweep_interval,
        ));

        tracing::debug!(
            sweep_interval_secs = self.config.sweep_interval.as_secs(),
            message_ttl_secs = self.config.message_ttl.as_secs(),
            "Expiry sweep started"
        );
    }

    /// Stop the expiry sweep
    pub fn shutdown(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.stop();
            tracing::debug!("Expiry sweep stopped");
        }
    }

    /// Whether the expiry sweep is running
    pub fn is_running(&self) -> bool {
        self.sweeper.as_ref().is_some_and(Sweeper::is_running)
    }

    /// Run one sweep pass now, independent of the background task
    pub async fn expire(&self) -> SweepReport {
        sweeper::sweep(&self.link, &self.mcast).await
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}
