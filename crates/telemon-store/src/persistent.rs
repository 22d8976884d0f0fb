//! SQLite-backed store.
//!
//! Counters and gauges live in separate tables keyed by `metric_id`. Upserts
//! use `ON CONFLICT`: counters add the incoming delta (an overflowing sum is
//! rejected with `BadAttrValue`), gauges take the new value. Every write runs
//! inside one transaction.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use tokio::sync::OnceCell;
use tracing::{info, instrument};

use telemon_core::{Metric, MetricKind, MetricsError, Result};

use crate::schema;
use crate::store::{MetricStore, Sample};

// The WHERE guard skips an update whose sum would leave the i64 range; SQLite
// would otherwise store it as REAL. A skipped row reports zero rows affected.
const UPSERT_COUNTER: &str = "INSERT INTO counters (metric_id, metric_value) VALUES (?, ?) \
     ON CONFLICT(metric_id) DO UPDATE SET metric_value = counters.metric_value + excluded.metric_value \
     WHERE (excluded.metric_value >= 0 AND counters.metric_value <= 9223372036854775807 - excluded.metric_value) \
        OR (excluded.metric_value < 0 AND counters.metric_value >= (-9223372036854775807 - 1) - excluded.metric_value)";
const SET_COUNTER: &str = "INSERT INTO counters (metric_id, metric_value) VALUES (?, ?) \
     ON CONFLICT(metric_id) DO UPDATE SET metric_value = excluded.metric_value";
const UPSERT_GAUGE: &str = "INSERT INTO gauges (metric_id, metric_value) VALUES (?, ?) \
     ON CONFLICT(metric_id) DO UPDATE SET metric_value = excluded.metric_value";

fn db_err(e: sqlx::Error) -> MetricsError {
    MetricsError::Internal(format!("database error: {e}"))
}

/// Store backed by an sqlx SQLite pool, opened lazily by [`MetricStore::init`].
pub struct PersistentStore {
    dsn: String,
    pool: OnceCell<SqlitePool>,
}

impl PersistentStore {
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            pool: OnceCell::new(),
        }
    }

    fn pool(&self) -> Result<&SqlitePool> {
        self.pool
            .get()
            .ok_or_else(|| MetricsError::Unavailable("store is not initialised".into()))
    }

    fn in_memory(&self) -> bool {
        self.dsn.contains(":memory:")
    }

    async fn connect(&self) -> Result<SqlitePool> {
        let options = SqliteConnectOptions::from_str(&self.dsn)
            .map_err(|e| MetricsError::Unavailable(format!("invalid database dsn: {e}")))?
            .create_if_missing(true);

        // An in-memory database lives and dies with its single connection.
        let pool_options = if self.in_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| MetricsError::Unavailable(format!("cannot open database: {e}")))?;
        schema::ensure(&pool).await?;
        Ok(pool)
    }
}

async fn apply(tx: &mut Transaction<'_, Sqlite>, id: &str, sample: Sample, absolute: bool) -> Result<()> {
    let (query, accumulate) = match sample {
        Sample::Counter(d) if absolute => (sqlx::query(SET_COUNTER).bind(id).bind(d), false),
        Sample::Counter(d) => (sqlx::query(UPSERT_COUNTER).bind(id).bind(d), true),
        Sample::Gauge(v) => (sqlx::query(UPSERT_GAUGE).bind(id).bind(v), false),
    };
    let done = query.execute(&mut **tx).await.map_err(db_err)?;
    if accumulate && done.rows_affected() == 0 {
        return Err(MetricsError::BadAttrValue(format!("counter {id} overflows i64")));
    }
    Ok(())
}

impl PersistentStore {
    /// Validate everything, then write it in one transaction.
    async fn write_all(&self, metrics: &[Metric], absolute: bool) -> Result<()> {
        let samples = metrics
            .iter()
            .map(|m| Sample::of(m).map(|s| (m.id.as_str(), s)))
            .collect::<Result<Vec<_>>>()?;

        let mut tx = self.pool()?.begin().await.map_err(db_err)?;
        for (id, sample) in samples {
            // Dropping `tx` on error rolls the transaction back.
            apply(&mut tx, id, sample, absolute).await?;
        }
        tx.commit().await.map_err(db_err)
    }
}

#[async_trait]
impl MetricStore for PersistentStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    #[instrument(skip(self))]
    async fn init(&self) -> Result<()> {
        self.pool.get_or_try_init(|| self.connect()).await?;
        info!(in_memory = self.in_memory(), "persistent store ready");
        Ok(())
    }

    async fn get_metric(&self, query: &Metric) -> Result<Metric> {
        let pool = self.pool()?;
        let found = match query.kind {
            MetricKind::Counter => {
                sqlx::query_scalar::<_, i64>("SELECT metric_value FROM counters WHERE metric_id = ?")
                    .bind(&query.id)
                    .fetch_optional(pool)
                    .await
                    .map_err(db_err)?
                    .map(|d| Metric::counter(query.id.clone(), d))
            }
            MetricKind::Gauge => {
                sqlx::query_scalar::<_, f64>("SELECT metric_value FROM gauges WHERE metric_id = ?")
                    .bind(&query.id)
                    .fetch_optional(pool)
                    .await
                    .map_err(db_err)?
                    .map(|v| Metric::gauge(query.id.clone(), v))
            }
        };
        found.ok_or_else(|| MetricsError::NotFound(format!("{} {}", query.kind, query.id)))
    }

    async fn get_metrics(&self) -> Result<Vec<Metric>> {
        let pool = self.pool()?;
        let counters: Vec<(String, i64)> =
            sqlx::query_as("SELECT metric_id, metric_value FROM counters")
                .fetch_all(pool)
                .await
                .map_err(db_err)?;
        let gauges: Vec<(String, f64)> =
            sqlx::query_as("SELECT metric_id, metric_value FROM gauges")
                .fetch_all(pool)
                .await
                .map_err(db_err)?;

        let mut out: Vec<Metric> = counters
            .into_iter()
            .map(|(id, d)| Metric::counter(id, d))
            .collect();
        out.extend(gauges.into_iter().map(|(id, v)| Metric::gauge(id, v)));
        Ok(out)
    }

    async fn update_metric(&self, metric: &Metric) -> Result<()> {
        self.write_all(std::slice::from_ref(metric), false).await
    }

    async fn update_metrics(&self, batch: &[Metric]) -> Result<()> {
        self.write_all(batch, false).await
    }

    async fn reset_counter(&self, id: &str) -> Result<()> {
        let done = sqlx::query("UPDATE counters SET metric_value = 0 WHERE metric_id = ?")
            .bind(id)
            .execute(self.pool()?)
            .await
            .map_err(db_err)?;
        if done.rows_affected() == 0 {
            return Err(MetricsError::NotFound(format!("counter {id}")));
        }
        Ok(())
    }

    async fn set_metrics(&self, snapshot: &[Metric]) -> Result<()> {
        self.write_all(snapshot, true).await
    }

    async fn available(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(self.pool()?)
            .await
            .map_err(|e| MetricsError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
            info!("persistent store closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    async fn memory_store() -> PersistentStore {
        let store = PersistentStore::new("sqlite::memory:");
        store.init().await.unwrap();
        store
    }

    #[tokio::test]
    async fn upserts_follow_kind_semantics() {
        let store = memory_store().await;
        store.update_metric(&Metric::counter("hits", 5)).await.unwrap();
        store.update_metric(&Metric::counter("hits", 3)).await.unwrap();
        store.update_metric(&Metric::gauge("temp", 21.5)).await.unwrap();
        store.update_metric(&Metric::gauge("temp", 19.0)).await.unwrap();

        let c = store.get_metric(&Metric::query("hits", MetricKind::Counter)).await.unwrap();
        assert_eq!(c.delta, Some(8));
        let g = store.get_metric(&Metric::query("temp", MetricKind::Gauge)).await.unwrap();
        assert_eq!(g.value, Some(19.0));
        assert_eq!(store.get_metrics().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_metric_and_counter_reset() {
        let store = memory_store().await;
        let err = store
            .get_metric(&Metric::query("nope", MetricKind::Gauge))
            .await
            .unwrap_err();
        assert_eq!(err.client_code().as_str(), "NOT_FOUND");
        assert!(store.reset_counter("nope").await.is_err());

        store.update_metric(&Metric::counter("c", 9)).await.unwrap();
        store.reset_counter("c").await.unwrap();
        let c = store.get_metric(&Metric::query("c", MetricKind::Counter)).await.unwrap();
        assert_eq!(c.delta, Some(0));
    }

    #[tokio::test]
    async fn invalid_batch_writes_nothing() {
        let store = memory_store().await;
        let batch = vec![
            Metric::counter("hits", 1),
            Metric::query("broken", MetricKind::Counter),
        ];
        assert!(store.update_metrics(&batch).await.is_err());
        assert!(store.get_metrics().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_is_applied_in_one_go() {
        let store = memory_store().await;
        let batch = vec![
            Metric::gauge("temp", 1.0),
            Metric::counter("hits", 1),
            Metric::counter("hits", 2),
        ];
        store.update_metrics(&batch).await.unwrap();
        let c = store.get_metric(&Metric::query("hits", MetricKind::Counter)).await.unwrap();
        assert_eq!(c.delta, Some(3));
    }

    #[tokio::test]
    async fn counter_overflow_is_rejected_and_rolled_back() {
        let store = memory_store().await;
        store.update_metric(&Metric::counter("c", i64::MAX)).await.unwrap();

        let err = store.update_metric(&Metric::counter("c", 1)).await.unwrap_err();
        assert_eq!(err.client_code().as_str(), "BAD_ATTR_VALUE");

        let batch = vec![Metric::gauge("temp", 2.0), Metric::counter("c", 1)];
        let err = store.update_metrics(&batch).await.unwrap_err();
        assert_eq!(err.client_code().as_str(), "BAD_ATTR_VALUE");

        // The table still reads back as integers and nothing from the batch landed.
        let c = store.get_metric(&Metric::query("c", MetricKind::Counter)).await.unwrap();
        assert_eq!(c.delta, Some(i64::MAX));
        assert_eq!(store.get_metrics().await.unwrap().len(), 1);

        store.update_metric(&Metric::counter("c", -5)).await.unwrap();
        let c = store.get_metric(&Metric::query("c", MetricKind::Counter)).await.unwrap();
        assert_eq!(c.delta, Some(i64::MAX - 5));
    }

    #[tokio::test]
    async fn negative_delta_underflow_is_rejected() {
        let store = memory_store().await;
        store.update_metric(&Metric::counter("c", i64::MIN)).await.unwrap();
        let err = store.update_metric(&Metric::counter("c", -1)).await.unwrap_err();
        assert_eq!(err.client_code().as_str(), "BAD_ATTR_VALUE");
        let c = store.get_metric(&Metric::query("c", MetricKind::Counter)).await.unwrap();
        assert_eq!(c.delta, Some(i64::MIN));
    }

    #[tokio::test]
    async fn uninitialised_store_is_unavailable() {
        let store = PersistentStore::new("sqlite::memory:");
        let err = store.available().await.unwrap_err();
        assert_eq!(err.client_code().as_str(), "UNAVAILABLE");
        store.init().await.unwrap();
        store.available().await.unwrap();
    }

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let dsn = format!("sqlite://{}", dir.path().join("metrics.db").display());

        let store = PersistentStore::new(dsn.clone());
        store.init().await.unwrap();
        store
            .update_metrics(&[Metric::gauge("temp", 1.0), Metric::counter("hits", 1)])
            .await
            .unwrap();
        store.close().await.unwrap();

        let reopened = PersistentStore::new(dsn);
        reopened.init().await.unwrap();
        let g = reopened.get_metric(&Metric::query("temp", MetricKind::Gauge)).await.unwrap();
        assert_eq!(g.value, Some(1.0));
        let c = reopened.get_metric(&Metric::query("hits", MetricKind::Counter)).await.unwrap();
        assert_eq!(c.delta, Some(1));
    }
}
