//! Request body extraction: content-type check, unseal, gunzip.

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::header::{CONTENT_ENCODING, CONTENT_TYPE};
use axum::response::Response;

use telemon_core::protocol::compress::{gunzip, lists_gzip};
use telemon_core::{MetricsError, Result};

use crate::app_state::AppState;
use crate::dispatch::respond::{error_response, Negotiation};

/// Plain JSON bytes of a request, after unsealing and decompression.
#[derive(Debug)]
pub struct MetricBody(pub Bytes);

fn is_json(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

/// Undo the transport wrapping: seal first, then compression.
pub fn open_body(state: &AppState, raw: Bytes, gzipped: bool) -> Result<Bytes> {
    let raw = match state.unsealer() {
        Some(unsealer) => Bytes::from(unsealer.unseal(&raw)?),
        None => raw,
    };
    if gzipped {
        Ok(Bytes::from(gunzip(&raw)?))
    } else {
        Ok(raw)
    }
}

#[async_trait]
impl FromRequest<AppState> for MetricBody {
    type Rejection = Response;

    async fn from_request(req: Request, state: &AppState) -> std::result::Result<Self, Self::Rejection> {
        let neg = Negotiation::from_headers(req.headers());
        // Header borrows must end before the body is awaited.
        let (json, gzipped) = {
            let header = |name| req.headers().get(name).and_then(|v| v.to_str().ok());
            (
                is_json(header(CONTENT_TYPE)),
                header(CONTENT_ENCODING).map(lists_gzip).unwrap_or(false),
            )
        };

        if !json {
            let e = MetricsError::BadRequest("content type must be application/json".into());
            return Err(error_response(state, neg, &e));
        }

        let raw = Bytes::from_request(req, state).await.map_err(|e| {
            error_response(state, neg, &MetricsError::BadRequest(format!("unreadable body: {e}")))
        })?;

        open_body(state, raw, gzipped)
            .map(MetricBody)
            .map_err(|e| error_response(state, neg, &e))
    }
}
