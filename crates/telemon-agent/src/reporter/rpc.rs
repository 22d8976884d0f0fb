//! RPC transport: one `UpdateMetric` call per metric over a persistent
//! length-delimited TCP connection.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, warn};

use telemon_core::protocol::frame::{decode_response, decode_rpc_frame, update_metric_request};
use telemon_core::protocol::Signer;
use telemon_core::{Metric, MetricsError, Result, ServerResponse};

use super::Transport;

type Conn = Framed<TcpStream, LengthDelimitedCodec>;

pub struct RpcTransport {
    addr: String,
    timeout: Duration,
    signer: Option<Signer>,
    conn: Mutex<Option<Conn>>,
    seq: AtomicU32,
}

impl RpcTransport {
    pub fn new(addr: impl Into<String>, timeout: Duration, signer: Option<Signer>) -> Self {
        Self {
            addr: addr.into(),
            timeout,
            signer,
            conn: Mutex::new(None),
            seq: AtomicU32::new(1),
        }
    }

    async fn connect(&self) -> Result<Conn> {
        let stream = timeout(self.timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| MetricsError::Unavailable(format!("connect {} timed out", self.addr)))?
            .map_err(|e| MetricsError::Unavailable(format!("connect {}: {e}", self.addr)))?;
        debug!(addr = %self.addr, "rpc connected");
        Ok(Framed::new(stream, LengthDelimitedCodec::new()))
    }

    /// One round trip. I/O failures are `Unavailable`; the caller drops the
    /// connection on those.
    async fn call(&self, conn: &mut Conn, metric: &Metric) -> Result<ServerResponse> {
        let mut metric = metric.clone();
        if let Some(signer) = &self.signer {
            signer.sign_metric(&mut metric)?;
        }
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let frame = update_metric_request(seq, &metric)?;

        timeout(self.timeout, conn.send(frame.encode()))
            .await
            .map_err(|_| MetricsError::Unavailable("rpc send timed out".into()))?
            .map_err(|e| MetricsError::Unavailable(format!("rpc send: {e}")))?;

        let raw = timeout(self.timeout, conn.next())
            .await
            .map_err(|_| MetricsError::Unavailable("rpc reply timed out".into()))?
            .ok_or_else(|| MetricsError::Unavailable("rpc connection closed".into()))?
            .map_err(|e| MetricsError::Unavailable(format!("rpc read: {e}")))?;

        let reply = decode_rpc_frame(raw.freeze())?;
        if !reply.is_response() || reply.seq != Some(seq) {
            return Err(MetricsError::Unavailable(format!(
                "rpc reply out of order: expected seq {seq}, got {:?}",
                reply.seq
            )));
        }
        let resp = decode_response(&reply)?;
        if let Some(signer) = &self.signer {
            if !resp.hash.is_empty() {
                signer.verify_response(&resp)?;
            }
        }
        Ok(resp)
    }
}

#[async_trait]
impl Transport for RpcTransport {
    fn name(&self) -> &'static str {
        "rpc"
    }

    async fn deliver(&self, metrics: &[Metric]) -> Result<Vec<usize>> {
        let mut guard = self.conn.lock().await;
        let mut conn = match guard.take() {
            Some(conn) => conn,
            None => self.connect().await?,
        };

        let mut acked = Vec::with_capacity(metrics.len());
        let mut last_err = None;
        let mut healthy = true;

        for (i, metric) in metrics.iter().enumerate() {
            match self.call(&mut conn, metric).await {
                Ok(resp) if !resp.is_error() => acked.push(i),
                Ok(resp) => {
                    warn!(id = %metric.id, error = %resp.error, "rpc update rejected");
                    last_err = Some(MetricsError::BadRequest(resp.error));
                }
                Err(e) => {
                    let broken = matches!(e, MetricsError::Unavailable(_));
                    warn!(id = %metric.id, error = %e, "rpc update failed");
                    last_err = Some(e);
                    if broken {
                        healthy = false;
                        break;
                    }
                }
            }
        }

        if healthy {
            *guard = Some(conn);
        }

        match (acked.is_empty(), last_err) {
            (true, Some(e)) => Err(e),
            _ => Ok(acked),
        }
    }
}
