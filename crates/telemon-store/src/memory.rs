//! Process-local store: one `RwLock` per map.
//!
//! Single-metric operations take only the lock of the map they touch, so a
//! gauge write never waits on a counter read. Batches and restores take both
//! write locks (counters, then gauges) for their whole duration; that is the
//! only place both are held, so the fixed order rules out deadlock.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use telemon_core::{Metric, MetricKind, MetricsError, Result};

use crate::store::{MetricStore, Sample};

#[derive(Debug, Default)]
pub struct MemoryStore {
    counters: RwLock<HashMap<String, i64>>,
    gauges: RwLock<HashMap<String, f64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn add_delta(current: i64, delta: i64, id: &str) -> Result<i64> {
    current
        .checked_add(delta)
        .ok_or_else(|| MetricsError::BadAttrValue(format!("counter {id} overflows i64")))
}

#[async_trait]
impl MetricStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn get_metric(&self, query: &Metric) -> Result<Metric> {
        let found = match query.kind {
            MetricKind::Counter => self
                .counters
                .read()
                .get(&query.id)
                .map(|d| Metric::counter(query.id.clone(), *d)),
            MetricKind::Gauge => self
                .gauges
                .read()
                .get(&query.id)
                .map(|v| Metric::gauge(query.id.clone(), *v)),
        };
        found.ok_or_else(|| MetricsError::NotFound(format!("{} {}", query.kind, query.id)))
    }

    async fn get_metrics(&self) -> Result<Vec<Metric>> {
        let mut out: Vec<Metric> = self
            .counters
            .read()
            .iter()
            .map(|(id, d)| Metric::counter(id.clone(), *d))
            .collect();
        out.extend(
            self.gauges
                .read()
                .iter()
                .map(|(id, v)| Metric::gauge(id.clone(), *v)),
        );
        Ok(out)
    }

    async fn update_metric(&self, metric: &Metric) -> Result<()> {
        match Sample::of(metric)? {
            Sample::Counter(delta) => {
                let mut counters = self.counters.write();
                let current = counters.get(&metric.id).copied().unwrap_or(0);
                let next = add_delta(current, delta, &metric.id)?;
                counters.insert(metric.id.clone(), next);
            }
            Sample::Gauge(value) => {
                self.gauges.write().insert(metric.id.clone(), value);
            }
        }
        Ok(())
    }

    async fn update_metrics(&self, batch: &[Metric]) -> Result<()> {
        let samples = batch
            .iter()
            .map(|m| Sample::of(m).map(|s| (m.id.as_str(), s)))
            .collect::<Result<Vec<_>>>()?;

        let mut counters = self.counters.write();
        let mut gauges = self.gauges.write();

        // Stage counter sums first; overflow must leave both maps untouched.
        let mut staged: HashMap<&str, i64> = HashMap::new();
        for (id, sample) in &samples {
            if let Sample::Counter(delta) = sample {
                let current = match staged.get(id) {
                    Some(v) => *v,
                    None => counters.get(*id).copied().unwrap_or(0),
                };
                staged.insert(*id, add_delta(current, *delta, id)?);
            }
        }

        for (id, value) in staged {
            counters.insert(id.to_string(), value);
        }
        for (id, sample) in samples {
            if let Sample::Gauge(value) = sample {
                gauges.insert(id.to_string(), value);
            }
        }
        Ok(())
    }

    async fn reset_counter(&self, id: &str) -> Result<()> {
        match self.counters.write().get_mut(id) {
            Some(v) => {
                *v = 0;
                Ok(())
            }
            None => Err(MetricsError::NotFound(format!("counter {id}"))),
        }
    }

    async fn set_metrics(&self, snapshot: &[Metric]) -> Result<()> {
        let samples = snapshot
            .iter()
            .map(|m| Sample::of(m).map(|s| (m.id.clone(), s)))
            .collect::<Result<Vec<_>>>()?;

        let mut counters = self.counters.write();
        let mut gauges = self.gauges.write();
        for (id, sample) in samples {
            match sample {
                Sample::Counter(d) => {
                    counters.insert(id, d);
                }
                Sample::Gauge(v) => {
                    gauges.insert(id, v);
                }
            }
        }
        Ok(())
    }

    async fn available(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
