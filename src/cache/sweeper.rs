// src/cache/sweeper.rs

//! Background purging of expired entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Anything that can drop its own expired entries.
pub trait Sweep: Send + Sync + 'static {
    /// Purge expired entries, returning how many were removed.
    fn purge_expired(&self) -> usize;

    /// Label used in logs.
    fn name(&self) -> &'static str;
}

/// Spawn a Tokio task that purges `target` every `every`.
///
/// The task only holds a weak reference and exits on the first tick after
/// `target` has been dropped. Abort the returned handle to stop it earlier.
pub fn spawn_sweeper<S: Sweep>(target: &Arc<S>, every: Duration) -> JoinHandle<()> {
    let weak = Arc::downgrade(target);
    let every = every.max(Duration::from_millis(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(target) = weak.upgrade() else {
                debug!("swept object dropped; sweeper exiting");
                break;
            };

            let removed = target.purge_expired();
            if removed > 0 {
                debug!(sweeper = target.name(), removed, "sweep removed expired entries");
            }
        }
    })
}
