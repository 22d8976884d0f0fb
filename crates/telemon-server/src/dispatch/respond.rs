//! Reply negotiation and rendering.
//!
//! `Accept` picks JSON / text / HTML; `Accept-Encoding: gzip` compresses the
//! body. Every reply that carries a ServerResponse or Metric is signed when
//! a key is configured.

use std::convert::Infallible;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{ACCEPT, ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use telemon_core::protocol::compress::{gzip, lists_gzip};
use telemon_core::protocol::json::{encode_metric, encode_response};
use telemon_core::protocol::BodyFormat;
use telemon_core::{Metric, MetricsError, Result, ServerResponse};

use crate::app_state::AppState;

/// What the client asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Negotiation {
    pub format: BodyFormat,
    pub gzip: bool,
}

impl Negotiation {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name| headers.get(name).and_then(|v| v.to_str().ok());
        Self {
            format: BodyFormat::from_accept(header(ACCEPT)),
            gzip: header(ACCEPT_ENCODING).map(lists_gzip).unwrap_or(false),
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Negotiation {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        Ok(Negotiation::from_headers(&parts.headers))
    }
}

/// Successful handler outcome.
#[derive(Debug)]
pub enum Reply {
    Metric(Metric),
    Message(&'static str),
}

fn finish(neg: Negotiation, status: StatusCode, body: Vec<u8>) -> Response {
    let (body, encoded) = if neg.gzip {
        match gzip(&body) {
            Ok(z) => (z, true),
            Err(e) => {
                error!(error = %e, "reply compression failed; sending plain body");
                (body, false)
            }
        }
    } else {
        (body, false)
    };

    let mut resp = (status, [(CONTENT_TYPE, neg.format.content_type())], body).into_response();
    if encoded {
        resp.headers_mut()
            .insert(CONTENT_ENCODING, axum::http::HeaderValue::from_static("gzip"));
    }
    resp
}

fn encode_failure(e: &MetricsError) -> Response {
    error!(error = %e, "reply encoding failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
}

/// Render an error as a (signed) ServerResponse with the mapped status.
pub fn error_response(state: &AppState, neg: Negotiation, e: &MetricsError) -> Response {
    let code = e.client_code();
    let status = StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if e.is_client_error() {
        warn!(code = code.as_str(), error = %e, "request rejected");
    } else {
        error!(code = code.as_str(), error = %e, "request failed");
    }
    state.stats().rejected(code.as_str());

    match encode_response(&ServerResponse::from(e), state.signer(), neg.format) {
        Ok(body) => finish(neg, status, body),
        Err(enc) => encode_failure(&enc),
    }
}

/// Render a handler outcome.
pub fn render(state: &AppState, neg: Negotiation, result: Result<Reply>) -> Response {
    let reply = match result {
        Ok(reply) => reply,
        Err(e) => return error_response(state, neg, &e),
    };

    let body = match &reply {
        Reply::Metric(m) => encode_metric(m, state.signer(), neg.format),
        Reply::Message(msg) => encode_response(&ServerResponse::message(*msg), state.signer(), neg.format),
    };
    match body {
        Ok(body) => finish(neg, StatusCode::OK, body),
        Err(e) => encode_failure(&e),
    }
}
