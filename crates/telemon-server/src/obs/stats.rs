//! Labelled request counters backed by `DashMap`.
//!
//! Labels are flattened into sorted key vectors so the same label set always
//! hits the same entry regardless of argument order.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

type LabelKey = Vec<(String, String)>;

fn key_of(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let counter = self.map.entry(key_of(labels)).or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&key_of(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Sorted `(labels, value)` pairs.
    pub fn snapshot(&self) -> Vec<(LabelKey, u64)> {
        let mut out: Vec<_> = self
            .map
            .iter()
            .map(|r| (r.key().clone(), r.value().load(Ordering::Relaxed)))
            .collect();
        out.sort();
        out
    }
}

/// Counters exposed on the status page.
#[derive(Default)]
pub struct RequestStats {
    /// `route`, `status`
    pub requests: CounterVec,
    /// `kind`
    pub updates: CounterVec,
    /// `code`
    pub rejections: CounterVec,
}

impl RequestStats {
    pub fn observe(&self, route: &str, status: u16) {
        let status = status.to_string();
        self.requests.inc(&[("route", route), ("status", status.as_str())]);
    }

    pub fn updated(&self, kind: &str, n: u64) {
        self.updates.add(&[("kind", kind)], n);
    }

    pub fn rejected(&self, code: &str) {
        self.rejections.inc(&[("code", code)]);
    }
}
