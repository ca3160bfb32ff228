//! Periodic purge of dead grants.
//!
//! Expiry and revocation already block use, so sweeping only reclaims
//! storage. A failed sweep is logged and retried on the next tick.

use std::sync::Arc;
use std::time::Duration;

use careaccess::{AccessService, GrantStore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Spawn a task that purges grants dead for longer than `retention`,
/// every `interval`.
pub fn spawn_sweeper<S>(
    service: Arc<AccessService<S>>,
    interval: Duration,
    retention: Duration,
) -> JoinHandle<()>
where
    S: GrantStore + ?Sized + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = service.sweep(retention).await {
                tracing::error!(error = %e, "grant sweep failed");
            }
        }
    })
}
