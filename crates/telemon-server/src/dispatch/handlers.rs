//! Metric routes: decode, verify, touch the store, render.

use axum::extract::{Path, State};
use axum::response::Response;
use tracing::debug;

use telemon_core::protocol::json::{decode_batch, decode_metric, decode_update};
use telemon_core::protocol::path::decode_path;
use telemon_core::{Metric, MetricsError, Result};

use crate::app_state::AppState;
use crate::dispatch::body::MetricBody;
use crate::dispatch::respond::{render, Negotiation, Reply};

pub const SAVED: &str = "metric was saved";
pub const BATCH_SAVED: &str = "metrics batch was updated";

fn verify(state: &AppState, metric: &Metric) -> Result<()> {
    match state.signer() {
        Some(signer) => signer.verify_metric(metric),
        None => Ok(()),
    }
}

async fn save(state: &AppState, metric: Metric) -> Result<Reply> {
    verify(state, &metric)?;
    state.store().update_metric(&metric).await?;
    state.stats().updated(metric.kind.as_str(), 1);
    debug!(id = %metric.id, kind = %metric.kind, "metric saved");
    Ok(Reply::Message(SAVED))
}

async fn lookup(state: &AppState, query: Metric) -> Result<Reply> {
    let found = state.store().get_metric(&query).await?;
    Ok(Reply::Metric(found))
}

/// `POST /update/:kind/:id/:value`
pub async fn update_path(
    State(state): State<AppState>,
    neg: Negotiation,
    Path((kind, id, value)): Path<(String, String, String)>,
) -> Response {
    let result = async {
        let metric = decode_path(&kind, &id, Some(value.as_str()))?;
        if metric.is_query() {
            return Err(MetricsError::NullAttr(format!("value of {kind} {id}")));
        }
        if state.signer().is_some() {
            return Err(MetricsError::AuthFailed(
                "unsigned path update while a key is configured".into(),
            ));
        }
        save(&state, metric).await
    }
    .await;
    render(&state, neg, result)
}

/// `POST /update/`
pub async fn update_json(State(state): State<AppState>, neg: Negotiation, MetricBody(body): MetricBody) -> Response {
    let result = async { save(&state, decode_update(&body)?).await }.await;
    render(&state, neg, result)
}

/// `POST /updates/`
pub async fn update_batch(State(state): State<AppState>, neg: Negotiation, MetricBody(body): MetricBody) -> Response {
    let result = async {
        let batch = decode_batch(&body)?;
        for metric in &batch {
            verify(&state, metric)?;
        }
        state.store().update_metrics(&batch).await?;

        let counters = batch.iter().filter(|m| m.delta.is_some()).count() as u64;
        state.stats().updated("counter", counters);
        state.stats().updated("gauge", batch.len() as u64 - counters);
        debug!(size = batch.len(), "batch saved");
        Ok(Reply::Message(BATCH_SAVED))
    }
    .await;
    render(&state, neg, result)
}

/// `GET /value/:kind/:id`
pub async fn value_path(
    State(state): State<AppState>,
    neg: Negotiation,
    Path((kind, id)): Path<(String, String)>,
) -> Response {
    let result = async { lookup(&state, decode_path(&kind, &id, None)?).await }.await;
    render(&state, neg, result)
}

/// `POST /value/`
pub async fn value_json(State(state): State<AppState>, neg: Negotiation, MetricBody(body): MetricBody) -> Response {
    let result = async {
        let query = decode_metric(&body)?;
        lookup(&state, Metric::query(query.id, query.kind)).await
    }
    .await;
    render(&state, neg, result)
}
