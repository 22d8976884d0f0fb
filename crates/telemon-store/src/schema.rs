//! Table layout for the persistent backend.

use sqlx::SqlitePool;
use tracing::{debug, instrument};

use telemon_core::{MetricsError, Result};

const SCHEMA: [&str; 2] = [
    r#"
    CREATE TABLE IF NOT EXISTS counters (
        metric_id TEXT PRIMARY KEY,
        metric_value BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS gauges (
        metric_id TEXT PRIMARY KEY,
        metric_value DOUBLE PRECISION NOT NULL
    )
    "#,
];

/// Create both tables if missing.
#[instrument(skip(pool))]
pub(crate) async fn ensure(pool: &SqlitePool) -> Result<()> {
    for stmt in SCHEMA {
        sqlx::query(stmt)
            .execute(pool)
            .await
            .map_err(|e| MetricsError::Unavailable(format!("schema setup failed: {e}")))?;
    }
    debug!("metric tables ready");
    Ok(())
}
