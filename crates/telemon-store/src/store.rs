//! Capability interface shared by both backends.

use async_trait::async_trait;

use telemon_core::{Metric, MetricKind, MetricsError, Result};

/// Counter/gauge storage.
///
/// Counters accumulate deltas; gauges keep the last written value. The kind
/// is part of the key: `("x", counter)` and `("x", gauge)` are unrelated.
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Backend label for logs.
    fn name(&self) -> &'static str;

    /// Establish the backend (pool, schema). Idempotent.
    async fn init(&self) -> Result<()>;

    /// Look up one metric by id and kind. Fails `NotFound` when absent.
    async fn get_metric(&self, query: &Metric) -> Result<Metric>;

    /// Every stored metric, in no particular order.
    async fn get_metrics(&self) -> Result<Vec<Metric>>;

    /// Add a counter delta or replace a gauge value.
    async fn update_metric(&self, metric: &Metric) -> Result<()>;

    /// Apply a batch as a whole: either every element lands or none does.
    async fn update_metrics(&self, batch: &[Metric]) -> Result<()>;

    /// Zero a counter. Fails `NotFound` when absent.
    async fn reset_counter(&self, id: &str) -> Result<()>;

    /// Overwrite values with absolute state (counters are set, not added).
    async fn set_metrics(&self, snapshot: &[Metric]) -> Result<()>;

    /// Health probe.
    async fn available(&self) -> Result<()>;

    /// Release backend resources.
    async fn close(&self) -> Result<()>;
}

/// A validated value ready to be written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Sample {
    Counter(i64),
    Gauge(f64),
}

impl Sample {
    pub(crate) fn of(metric: &Metric) -> Result<Self> {
        metric.require_value()?;
        let missing = || MetricsError::NullAttr(metric.id.clone());
        match metric.kind {
            MetricKind::Counter => metric.delta.map(Sample::Counter).ok_or_else(missing),
            MetricKind::Gauge => metric.value.map(Sample::Gauge).ok_or_else(missing),
        }
    }
}
