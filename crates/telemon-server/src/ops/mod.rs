//! Operational HTTP endpoints.
//!
//! - `/ping` : backend health, negotiated and signed like every other reply
//! - `/`     : HTML status page (stored metrics, request/update/rejection counters)

use std::fmt::Write;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use telemon_core::MetricsError;

use crate::app_state::AppState;
use crate::dispatch::respond::{render, Negotiation, Reply};
use crate::obs::CounterVec;

pub const DB_OK: &str = "DB is working correctly";

pub async fn ping(State(state): State<AppState>, neg: Negotiation) -> Response {
    let result = match state.store().available().await {
        Ok(()) => Ok(Reply::Message(DB_OK)),
        Err(e) => {
            error!(store = state.store().name(), error = %e, "store health probe failed");
            let reason = match e {
                MetricsError::Unavailable(msg) => msg,
                other => other.to_string(),
            };
            Err(MetricsError::Unavailable(format!("DB is down: {reason}")))
        }
    };
    render(&state, neg, result)
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn counter_table(out: &mut String, title: &str, counters: &CounterVec) {
    let _ = writeln!(out, "<h2>{title}</h2>\n<table>");
    for (labels, value) in counters.snapshot() {
        let labels = labels
            .iter()
            .map(|(k, v)| format!("{k}={}", escape_html(v)))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(out, "<tr><td>{labels}</td><td>{value}</td></tr>");
    }
    out.push_str("</table>\n");
}

pub async fn status_page(State(state): State<AppState>) -> Response {
    let mut out = String::from("<!DOCTYPE html>\n<html><head><title>telemon</title></head><body>\n");
    out.push_str("<h1>Server is working</h1>\n");

    match state.store().get_metrics().await {
        Ok(mut metrics) => {
            metrics.sort_by(|a, b| (a.kind.as_str(), &a.id).cmp(&(b.kind.as_str(), &b.id)));
            let _ = writeln!(out, "<h2>Metrics ({})</h2>\n<table>", metrics.len());
            for m in &metrics {
                let _ = writeln!(
                    out,
                    "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                    m.kind,
                    escape_html(&m.id),
                    m.as_text()
                );
            }
            out.push_str("</table>\n");
        }
        Err(e) => {
            error!(error = %e, "status page could not list metrics");
            let _ = writeln!(out, "<p>metrics unavailable: {}</p>", escape_html(&e.to_string()));
        }
    }

    let stats = state.stats();
    counter_table(&mut out, "Requests", &stats.requests);
    counter_table(&mut out, "Updates", &stats.updates);
    counter_table(&mut out, "Rejections", &stats.rejections);
    out.push_str("</body></html>\n");

    (StatusCode::OK, [(CONTENT_TYPE, "text/html; charset=utf-8")], out).into_response()
}
