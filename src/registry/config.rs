//! Registry configuration

use std::time::Duration;

/// How long a message stays buffered before the sweep drops it
pub const MESSAGE_TTL: Duration = Duration::from_secs(60 * 60);

/// Period of the background expiry sweep
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Largest multicast sequence id before wrapping back to 1
///
/// 2^53 - 1, so ids survive a round trip through a JavaScript number.
pub const MAX_SEQUENCE_ID: u64 = 9_007_199_254_740_991;

/// Configuration shared by the link and mcast registries
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Age after which a buffered message is expired
    pub message_ttl: Duration,

    /// Interval between expiry sweeps
    pub sweep_interval: Duration,

    /// Last sequence id handed out before wrapping (mcast only)
    pub max_sequence_id: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            message_ttl: MESSAGE_TTL,
            sweep_interval: SWEEP_INTERVAL,
            max_sequence_id: MAX_SEQUENCE_ID,
        }
    }
}

impl RegistryConfig {
    /// Set the message time-to-live
    pub fn message_ttl(mut self, ttl: Duration) -> Self {
        self.message_ttl = ttl;
        self
    }

    /// Set the sweep interval
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the wrap point of the multicast sequence space
    ///
    /// Values below 1 are raised to 1.
    pub fn max_sequence_id(mut self, max: u64) -> Self {
        self.max_sequence_id = max.max(1);
        self
    }
}
