use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use super::cache::TtlCache;

/// Periodically drop expired keys until `shutdown` flips to `true`.
pub fn spawn_sweeper(
    cache: TtlCache,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every.max(Duration::from_secs(1)));
        interval.tick().await; // Skip first immediate tick
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    cache.purge_expired().await;
                }
                _ = shutdown.changed() => break,
            }
        }
        info!("Session sweeper stopped");
    })
}
