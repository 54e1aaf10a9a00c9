//! Periodic checkpoint task.

use std::sync::Arc;
use std::time::Duration;

use mapkeeper_store::MapBackend;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Spawn a task that checkpoints `backend` every `period` until `shutdown`
/// fires. Failures are logged and the next tick tries again.
pub fn spawn_checkpointer<B: MapBackend>(
    backend: Arc<B>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::debug!(period_ms = period.as_millis() as u64, "checkpoint task started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let backend = Arc::clone(&backend);
                    match tokio::task::spawn_blocking(move || backend.checkpoint()).await {
                        Ok(Ok(())) => tracing::trace!("checkpoint done"),
                        Ok(Err(e)) => tracing::warn!(error = %e, "checkpoint failed"),
                        Err(e) => tracing::warn!(error = %e, "checkpoint task panicked"),
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
        tracing::debug!("checkpoint task stopped");
    })
}
