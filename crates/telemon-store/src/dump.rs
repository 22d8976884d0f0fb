//! Snapshot-to-disk and restore for the memory backend.
//!
//! The snapshot is a JSON array of metrics. Writes go to a sibling temp file
//! and are renamed into place, so a crash mid-dump leaves the previous
//! snapshot intact.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use telemon_core::{Metric, MetricsError, Result};

use crate::store::MetricStore;

fn io_err(path: &Path, e: std::io::Error) -> MetricsError {
    MetricsError::Internal(format!("{}: {e}", path.display()))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write the full store state to `path`. Returns the number of metrics written.
pub async fn dump(path: &Path, store: &dyn MetricStore) -> Result<usize> {
    let metrics = store.get_metrics().await?;
    let body = serde_json::to_vec_pretty(&metrics)
        .map_err(|e| MetricsError::Internal(format!("encode snapshot: {e}")))?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await.map_err(|e| io_err(dir, e))?;
    }
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, &body).await.map_err(|e| io_err(&tmp, e))?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| io_err(path, e))?;

    debug!(path = %path.display(), count = metrics.len(), "snapshot written");
    Ok(metrics.len())
}

/// Load `path` into `store` as absolute state.
///
/// Entries that do not decode (unknown type, missing value) are logged and
/// skipped. Returns the number of metrics restored.
pub async fn restore(path: &Path, store: &dyn MetricStore) -> Result<usize> {
    let raw = tokio::fs::read(path).await.map_err(|e| io_err(path, e))?;
    let entries: Vec<serde_json::Value> = serde_json::from_slice(&raw)
        .map_err(|e| MetricsError::BadRequest(format!("snapshot {}: {e}", path.display())))?;

    let mut metrics = Vec::with_capacity(entries.len());
    for entry in entries {
        let decoded = serde_json::from_value::<Metric>(entry.clone())
            .map_err(|e| MetricsError::BadType(e.to_string()))
            .and_then(|m| m.require_value().map(|_| m));
        match decoded {
            Ok(m) => metrics.push(m),
            Err(e) => warn!(path = %path.display(), entry = %entry, error = %e, "skipping snapshot entry"),
        }
    }

    store.set_metrics(&metrics).await?;
    info!(path = %path.display(), count = metrics.len(), "snapshot restored");
    Ok(metrics.len())
}

/// Periodic snapshot loop.
///
/// Dumps every `interval`; on cancellation writes one final snapshot and
/// returns. Failures are logged and never stop the loop.
pub async fn run(
    path: PathBuf,
    store: Arc<dyn MetricStore>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = dump(&path, store.as_ref()).await {
                    error!(path = %path.display(), error = %e, "periodic dump failed");
                }
            }
        }
    }

    match dump(&path, store.as_ref()).await {
        Ok(count) => info!(path = %path.display(), count, "final snapshot written"),
        Err(e) => error!(path = %path.display(), error = %e, "final dump failed"),
    }
}
