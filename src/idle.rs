//! Idle timeout monitoring
//!
//! Watches all sessions for global silence. Pausing is all-or-nothing:
//! a partly paused room would still incur full backend cost, so either
//! every active session pauses or none does. The evaluation itself is
//! a single batch transition owned by the coordinator; this module
//! only drives it on a timer.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::coordinator::ProtocolCoordinator;

pub struct IdleMonitor;

impl IdleMonitor {
    /// How often to evaluate the silence condition for a given timeout
    pub fn check_interval(timeout: Duration) -> Duration {
        (timeout / 4).clamp(Duration::from_secs(1), Duration::from_secs(60))
    }

    /// Spawn the background check loop. The task exits on its own once
    /// the coordinator leaves the running phase; shutdown also aborts
    /// it.
    pub fn spawn(coordinator: ProtocolCoordinator, timeout: Duration) -> JoinHandle<()> {
        let interval = Self::check_interval(timeout);
        tokio::spawn(async move {
            debug!("Idle monitor started (check interval {:?})", interval);
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately; harmless to evaluate
            loop {
                ticker.tick().await;
                if !coordinator.is_running().await {
                    break;
                }
                if let Err(e) = coordinator.evaluate_idle(chrono::Utc::now()).await {
                    debug!("Idle evaluation failed: {e:#}");
                }
            }
            debug!("Idle monitor stopped");
        })
    }
}
