//! Per-request middleware: trusted-subnet check and request counting.

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::app_state::AppState;
use crate::dispatch::respond::{error_response, Negotiation};
use crate::policy::REAL_IP_HEADER;

pub async fn guard(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());

    let resp = match state.subnet() {
        Some(subnet) => {
            let header = req.headers().get(REAL_IP_HEADER).and_then(|v| v.to_str().ok());
            match subnet.check_header(header) {
                Ok(()) => next.run(req).await,
                Err(e) => error_response(&state, Negotiation::from_headers(req.headers()), &e),
            }
        }
        None => next.run(req).await,
    };

    state.stats().observe(&route, resp.status().as_u16());
    resp
}
