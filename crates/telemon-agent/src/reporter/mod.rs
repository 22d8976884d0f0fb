//! Reporter: ships the local store to the server on a fixed tick.
//!
//! Once the receiver acknowledged a counter, the delivered delta is taken off
//! the local value. Increments the poller made while the send was in flight
//! stay for the next tick. A failed tick leaves the store untouched so the
//! next tick re-sends the accumulated deltas. Gauges are never reset.

pub mod rest;
pub mod rpc;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use telemon_core::{Metric, MetricKind, Result};
use telemon_store::MetricStore;

pub use rest::RestTransport;
pub use rpc::RpcTransport;

/// Delivery channel to the server.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Send `metrics`; return the indices the server acknowledged.
    ///
    /// An `Err` means nothing was acknowledged.
    async fn deliver(&self, metrics: &[Metric]) -> Result<Vec<usize>>;
}

pub struct Reporter {
    store: Arc<dyn MetricStore>,
    transport: Box<dyn Transport>,
    interval: Duration,
}

impl Reporter {
    pub fn new(store: Arc<dyn MetricStore>, transport: Box<dyn Transport>, interval: Duration) -> Self {
        Self {
            store,
            transport,
            interval,
        }
    }

    /// One tick. Returns how many metrics were acknowledged.
    pub async fn report_once(&self) -> Result<usize> {
        let metrics = self.store.get_metrics().await?;
        if metrics.is_empty() {
            debug!("nothing to report");
            return Ok(0);
        }

        let acked = self.transport.deliver(&metrics).await?;

        for m in acked.iter().filter_map(|i| metrics.get(*i)) {
            if m.kind != MetricKind::Counter {
                continue;
            }
            let Some(sent) = m.delta.filter(|d| *d != 0) else {
                continue;
            };
            let settled = match sent.checked_neg() {
                Some(back) => self.store.update_metric(&Metric::counter(m.id.clone(), back)).await,
                None => self.store.reset_counter(&m.id).await,
            };
            if let Err(e) = settled {
                warn!(id = %m.id, sent, error = %e, "counter settle failed");
            }
        }

        if acked.len() < metrics.len() {
            warn!(
                transport = self.transport.name(),
                sent = metrics.len(),
                acked = acked.len(),
                "partial delivery"
            );
        } else {
            debug!(transport = self.transport.name(), sent = metrics.len(), "report delivered");
        }
        Ok(acked.len())
    }

    pub async fn run(self, cancel: CancellationToken) {
        info!(
            transport = self.transport.name(),
            interval_ms = self.interval.as_millis() as u64,
            "reporter started"
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Let the poller fill the store before the first send.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.report_once().await {
                        error!(transport = self.transport.name(), error = %e, "report failed; will retry next tick");
                    }
                }
            }
        }
        info!("reporter stopped");
    }
}
