//! RPC frame parsing (panic-free).
//!
//! Frame body (inside a length-delimited envelope):
//! `v:u8 | method:u8 | flags:u8 | [seq:u32 LE] | payload`
//!
//! Parsing rules:
//! - Never index (`buf[0]`); always use `Buf` and `remaining()` checks.
//! - Never `unwrap()` / `expect()` / `panic!()` in production paths.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{MetricsError, Result};
use crate::metric::{Metric, ServerResponse};
use crate::protocol::json;

/// Current frame version.
pub const RPC_VERSION: u8 = 1;

/// Flag: seq (u32) is present.
pub const FLAG_SEQ_PRESENT: u8 = 0x01;
/// Flag: frame is a reply.
pub const FLAG_RESPONSE: u8 = 0x02;

/// `UpdateMetric(Metric) -> ServerResponse`.
pub const METHOD_UPDATE_METRIC: u8 = 1;

/// Parsed RPC frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcFrame {
    /// Protocol version.
    pub v: u8,
    /// Method id (routes to a registered RpcMethod).
    pub method: u8,
    /// Feature flags.
    pub flags: u8,
    /// Optional sequence number, echoed in the reply.
    pub seq: Option<u32>,
    /// Opaque payload (zero-copy).
    pub payload: Bytes,
}

impl RpcFrame {
    pub fn request(method: u8, seq: Option<u32>, payload: Bytes) -> Self {
        let flags = if seq.is_some() { FLAG_SEQ_PRESENT } else { 0 };
        Self {
            v: RPC_VERSION,
            method,
            flags,
            seq,
            payload,
        }
    }

    /// Reply frame carrying the same method and seq.
    pub fn reply(&self, payload: Bytes) -> Self {
        let mut flags = FLAG_RESPONSE;
        if self.seq.is_some() {
            flags |= FLAG_SEQ_PRESENT;
        }
        Self {
            v: RPC_VERSION,
            method: self.method,
            flags,
            seq: self.seq,
            payload,
        }
    }

    pub fn is_response(&self) -> bool {
        self.flags & FLAG_RESPONSE != 0
    }

    pub fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(7 + self.payload.len());
        out.put_u8(self.v);
        out.put_u8(self.method);
        let mut flags = self.flags & !FLAG_SEQ_PRESENT;
        if self.seq.is_some() {
            flags |= FLAG_SEQ_PRESENT;
        }
        out.put_u8(flags);
        if let Some(seq) = self.seq {
            out.put_u32_le(seq);
        }
        out.extend_from_slice(&self.payload);
        out.freeze()
    }
}

/// Decode an RPC frame from bytes.
pub fn decode_rpc_frame(mut buf: Bytes) -> Result<RpcFrame> {
    // Minimum header: v, method, flags
    if buf.remaining() < 3 {
        return Err(MetricsError::BadRequest("rpc frame too short".into()));
    }

    let v = buf.get_u8();
    if v != RPC_VERSION {
        return Err(MetricsError::BadRequest(format!(
            "unsupported rpc frame version {v}"
        )));
    }

    let method = buf.get_u8();
    let flags = buf.get_u8();

    let seq = if (flags & FLAG_SEQ_PRESENT) != 0 {
        if buf.remaining() < 4 {
            return Err(MetricsError::BadRequest(
                "seq flag set but missing u32".into(),
            ));
        }
        Some(buf.get_u32_le())
    } else {
        None
    };

    let payload = buf.copy_to_bytes(buf.remaining());

    Ok(RpcFrame {
        v,
        method,
        flags,
        seq,
        payload,
    })
}

/// Build an `UpdateMetric` request frame.
pub fn update_metric_request(seq: u32, metric: &Metric) -> Result<RpcFrame> {
    let payload = serde_json::to_vec(metric)
        .map_err(|e| MetricsError::Internal(format!("encode rpc metric: {e}")))?;
    Ok(RpcFrame::request(
        METHOD_UPDATE_METRIC,
        Some(seq),
        Bytes::from(payload),
    ))
}

/// Decode the payload of an `UpdateMetric` request.
pub fn decode_update_metric(frame: &RpcFrame) -> Result<Metric> {
    json::decode_update(&frame.payload)
}

/// Encode a ServerResponse as a reply frame payload.
pub fn response_payload(resp: &ServerResponse) -> Result<Bytes> {
    serde_json::to_vec(resp)
        .map(Bytes::from)
        .map_err(|e| MetricsError::Internal(format!("encode rpc response: {e}")))
}

/// Decode the payload of a reply frame.
pub fn decode_response(frame: &RpcFrame) -> Result<ServerResponse> {
    serde_json::from_slice(&frame.payload)
        .map_err(|e| MetricsError::BadRequest(format!("invalid rpc response: {e}")))
}
