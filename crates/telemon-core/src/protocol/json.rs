//! JSON form: single metric objects, batches, and reply bodies.
//!
//! Decoding goes through [`WireMetric`] first so a syntactically broken body
//! (`BadRequest`) is told apart from an unknown `type` (`BadType`).

use crate::error::{MetricsError, Result};
use crate::metric::{Metric, ServerResponse, WireMetric};
use crate::protocol::sign::Signer;

/// Representation negotiated for a reply body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyFormat {
    #[default]
    Json,
    Text,
    Html,
}

impl BodyFormat {
    /// Pick a format from an `Accept` header value.
    ///
    /// `html` wins, then `json`; anything else (including a missing header)
    /// gets plain text.
    pub fn from_accept(accept: Option<&str>) -> Self {
        let accept = accept.unwrap_or_default();
        if accept.contains("html") {
            BodyFormat::Html
        } else if accept.contains("json") {
            BodyFormat::Json
        } else {
            BodyFormat::Text
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            BodyFormat::Json => "application/json",
            BodyFormat::Text => "text/plain; charset=utf-8",
            BodyFormat::Html => "text/html; charset=utf-8",
        }
    }
}

fn parse_wire(body: &[u8]) -> Result<WireMetric> {
    serde_json::from_slice(body)
        .map_err(|e| MetricsError::BadRequest(format!("invalid metric json: {e}")))
}

/// Decode a single metric; values are optional (lookup form).
pub fn decode_metric(body: &[u8]) -> Result<Metric> {
    let metric = Metric::try_from(parse_wire(body)?)?;
    if metric.id.is_empty() {
        return Err(MetricsError::BadAttrValue("empty metric id".into()));
    }
    Ok(metric)
}

/// Decode a single metric that must carry the field matching its kind.
pub fn decode_update(body: &[u8]) -> Result<Metric> {
    let metric = decode_metric(body)?;
    metric.require_value()?;
    Ok(metric)
}

/// Decode a batch. One bad element rejects the whole batch.
pub fn decode_batch(body: &[u8]) -> Result<Vec<Metric>> {
    let wire: Vec<WireMetric> = serde_json::from_slice(body)
        .map_err(|e| MetricsError::BadRequest(format!("invalid metrics batch json: {e}")))?;

    wire.into_iter()
        .map(|w| {
            let metric = Metric::try_from(w)?;
            if metric.id.is_empty() {
                return Err(MetricsError::BadAttrValue("empty metric id".into()));
            }
            metric.require_value()?;
            Ok(metric)
        })
        .collect()
}

fn to_json<T: serde::Serialize>(v: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(v).map_err(|e| MetricsError::Internal(format!("encode json: {e}")))
}

/// Encode a metric reply, signing it first when a key is configured.
pub fn encode_metric(metric: &Metric, signer: Option<&Signer>, format: BodyFormat) -> Result<Vec<u8>> {
    let mut metric = metric.clone();
    if let Some(signer) = signer {
        signer.sign_metric(&mut metric)?;
    }
    match format {
        BodyFormat::Json => to_json(&metric),
        BodyFormat::Text | BodyFormat::Html => Ok(metric.as_text().into_bytes()),
    }
}

/// Encode a batch for transport. Every element is signed when a key is set.
pub fn encode_batch(metrics: &[Metric], signer: Option<&Signer>) -> Result<Vec<u8>> {
    match signer {
        Some(signer) => {
            let mut signed = metrics.to_vec();
            for m in signed.iter_mut() {
                signer.sign_metric(m)?;
            }
            to_json(&signed)
        }
        None => to_json(&metrics),
    }
}

/// Encode a result envelope, signing it when a key is configured.
pub fn encode_response(
    resp: &ServerResponse,
    signer: Option<&Signer>,
    format: BodyFormat,
) -> Result<Vec<u8>> {
    let mut resp = resp.clone();
    if let Some(signer) = signer {
        signer.sign_response(&mut resp)?;
    }
    match format {
        BodyFormat::Json => to_json(&resp),
        BodyFormat::Text | BodyFormat::Html => Ok(resp.as_text().into_bytes()),
    }
}
