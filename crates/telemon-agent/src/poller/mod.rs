//! Poller: samples every source on a fixed tick into the local store.

pub mod sources;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use telemon_core::Result;
use telemon_store::MetricStore;

pub use sources::{default_sources, HostSource, MetricSource, PollSource, RuntimeSource};

pub struct Poller {
    store: Arc<dyn MetricStore>,
    sources: Vec<Box<dyn MetricSource>>,
    interval: Duration,
}

impl Poller {
    pub fn new(store: Arc<dyn MetricStore>, sources: Vec<Box<dyn MetricSource>>, interval: Duration) -> Self {
        Self {
            store,
            sources,
            interval,
        }
    }

    /// One tick: collect from every source, write the batch. Returns its size.
    pub async fn poll_once(&mut self) -> Result<usize> {
        let mut batch = Vec::new();
        for source in self.sources.iter_mut() {
            match source.collect() {
                Ok(metrics) => batch.extend(metrics),
                Err(e) => warn!(source = source.name(), error = %e, "metric source failed"),
            }
        }
        // Non-finite samples cannot be serialised; drop them here.
        batch.retain(|m| m.value.map_or(true, f64::is_finite));

        self.store.update_metrics(&batch).await?;
        debug!(size = batch.len(), "poll applied");
        Ok(batch.len())
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        info!(interval_ms = self.interval.as_millis() as u64, sources = self.sources.len(), "poller started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        error!(error = %e, "poll failed");
                    }
                }
            }
        }
        info!("poller stopped");
    }
}
