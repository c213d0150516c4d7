//! Background expiry sweep
//!
//! One task walks both registries on a fixed period, dropping messages that
//! outlived the TTL and removing channels left empty with nobody waiting.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::expiry::SweepReport;
use super::link::LinkRegistry;
use super::mcast::McastRegistry;

/// Run one sweep over both registries
pub async fn sweep(link: &LinkRegistry, mcast: &McastRegistry) -> SweepReport {
    let now = Instant::now();
    let mut report = link.expire_at(now).await;
    report += mcast.expire_at(now).await;
    report
}

/// Handle to the running sweep task
///
/// The task is aborted when the handle is stopped or dropped.
#[derive(Debug)]
pub struct Sweeper {
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn the sweep task
    ///
    /// The first pass runs one full `interval` after spawning.
    pub fn spawn(link: Arc<LinkRegistry>, mcast: Arc<McastRegistry>, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let report = sweep(&link, &mcast).await;

                if report != SweepReport::default() {
                    tracing::debug!(
                        expired_messages = report.expired_messages,
                        removed_channels = report.removed_channels,
                        "Expiry sweep finished"
                    );
                }
            }
        });

        Self { handle }
    }

    /// Stop the sweep task
    pub fn stop(self) {
        self.handle.abort();
    }

    /// Whether the task is still running
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_removes_expired_channels() {
        let link = Arc::new(LinkRegistry::new());
        let mcast = Arc::new(McastRegistry::new());
        link.send("link", "old").await;
        mcast.send("mcast", "old").await;

        let sweeper = Sweeper::spawn(
            Arc::clone(&link),
            Arc::clone(&mcast),
            Duration::from_secs(60),
        );

        // One tick short of the TTL: nothing is old enough yet
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        assert!(link.channel_exists("link").await);
        assert!(mcast.channel_exists("mcast").await);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(!link.channel_exists("link").await);
        assert!(!mcast.channel_exists("mcast").await);

        sweeper.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_does_not_run_immediately() {
        let link = Arc::new(LinkRegistry::new());
        let mcast = Arc::new(McastRegistry::new());
        // Abandoned poll leaves an idle channel behind
        drop(link.poll("idle").await);

        let sweeper = Sweeper::spawn(
            Arc::clone(&link),
            Arc::clone(&mcast),
            Duration::from_secs(60),
        );
        tokio::task::yield_now().await;
        assert!(link.channel_exists("idle").await);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(!link.channel_exists("idle").await);
        assert!(sweeper.is_running());
    }

    #[tokio::test]
    async fn test_single_sweep_covers_both_registries() {
        let link = LinkRegistry::new();
        let mcast = McastRegistry::new();
        drop(link.poll("a").await);
        drop(mcast.poll("b", None).await);

        let report = sweep(&link, &mcast).await;

        assert_eq!(report.removed_channels, 2);
        assert_eq!(report.expired_messages, 0);
    }
}
