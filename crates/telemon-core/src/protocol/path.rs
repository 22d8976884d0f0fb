//! URL path form: `/update/{kind}/{id}/{value}` and `/value/{kind}/{id}`.

use crate::error::{MetricsError, Result};
use crate::metric::{Metric, MetricKind};

/// Decode path segments into a metric.
///
/// A missing (or empty) value segment yields a query-only metric. Gauges must
/// be finite since the snapshot format is JSON.
pub fn decode_path(kind: &str, id: &str, value: Option<&str>) -> Result<Metric> {
    let kind = MetricKind::parse(kind)?;
    if id.is_empty() {
        return Err(MetricsError::BadAttrValue("empty metric id".into()));
    }

    let Some(raw) = value.filter(|v| !v.is_empty()) else {
        return Ok(Metric::query(id, kind));
    };

    match kind {
        MetricKind::Counter => {
            let delta: i64 = raw
                .parse()
                .map_err(|_| MetricsError::BadAttrValue(format!("counter {id}: {raw}")))?;
            Ok(Metric::counter(id, delta))
        }
        MetricKind::Gauge => {
            let value: f64 = raw
                .parse()
                .map_err(|_| MetricsError::BadAttrValue(format!("gauge {id}: {raw}")))?;
            if !value.is_finite() {
                return Err(MetricsError::BadAttrValue(format!("gauge {id}: {raw}")));
            }
            Ok(Metric::gauge(id, value))
        }
    }
}
