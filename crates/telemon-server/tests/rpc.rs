//! RPC listener over a real TCP socket.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::Arc;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;

use telemon_core::protocol::frame::{decode_response, decode_rpc_frame, update_metric_request, RpcFrame};
use telemon_core::protocol::Signer;
use telemon_core::{Metric, MetricKind, ServerResponse};
use telemon_server::app_state::AppState;
use telemon_server::config::ServerConfig;
use telemon_server::rpc;
use telemon_store::{MemoryStore, MetricStore};

struct Harness {
    client: Framed<TcpStream, LengthDelimitedCodec>,
    store: Arc<dyn MetricStore>,
    cancel: CancellationToken,
}

async fn start(cfg: ServerConfig) -> Harness {
    let store: Arc<dyn MetricStore> = Arc::new(MemoryStore::new());
    let state = AppState::new(cfg, Arc::clone(&store)).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let cancel = CancellationToken::new();
    tokio::spawn(rpc::serve(listener, state, cancel.clone()));

    let stream = TcpStream::connect(addr).await.unwrap();
    Harness {
        client: Framed::new(stream, LengthDelimitedCodec::new()),
        store,
        cancel,
    }
}

impl Harness {
    async fn call(&mut self, frame: &RpcFrame) -> (RpcFrame, ServerResponse) {
        self.client.send(frame.encode()).await.unwrap();
        let raw = self.client.next().await.unwrap().unwrap().freeze();
        let reply = decode_rpc_frame(raw).unwrap();
        let resp = decode_response(&reply).unwrap();
        (reply, resp)
    }
}

#[tokio::test]
async fn update_metric_saves_and_acks() {
    let mut h = start(ServerConfig::default()).await;

    for seq in 1..=3u32 {
        let req = update_metric_request(seq, &Metric::counter("PollCount", 2)).unwrap();
        let (reply, resp) = h.call(&req).await;
        assert!(reply.is_response());
        assert_eq!(reply.seq, Some(seq));
        assert_eq!(resp.message, "metric was saved");
        assert!(!resp.is_error());
    }

    let c = h
        .store
        .get_metric(&Metric::query("PollCount", MetricKind::Counter))
        .await
        .unwrap();
    assert_eq!(c.delta, Some(6));
    h.cancel.cancel();
}

#[tokio::test]
async fn errors_come_back_in_the_reply() {
    let mut h = start(ServerConfig::default()).await;

    let unknown = RpcFrame::request(99, Some(5), Bytes::from_static(b"{}"));
    let (reply, resp) = h.call(&unknown).await;
    assert_eq!(reply.seq, Some(5));
    assert!(resp.error.contains("unknown rpc method"));

    let invalid = RpcFrame::request(
        1,
        Some(6),
        Bytes::from_static(br#"{"id":"g","type":"gauge"}"#),
    );
    let (_, resp) = h.call(&invalid).await;
    assert!(resp.is_error());

    // Undecodable frame: reply without seq, connection stays usable.
    h.client.send(Bytes::from_static(&[9, 1, 0])).await.unwrap();
    let raw = h.client.next().await.unwrap().unwrap().freeze();
    let orphan = decode_rpc_frame(raw).unwrap();
    assert!(orphan.seq.is_none());
    assert!(decode_response(&orphan).unwrap().is_error());

    let ok = update_metric_request(7, &Metric::gauge("Alloc", 1.0)).unwrap();
    let (_, resp) = h.call(&ok).await;
    assert!(!resp.is_error());
    h.cancel.cancel();
}

#[tokio::test]
async fn signed_and_subnet_checked() {
    let mut cfg = ServerConfig::default();
    cfg.server.key = Some("secret".into());
    let mut h = start(cfg).await;
    let signer = Signer::new("secret").unwrap();

    let unsigned = update_metric_request(1, &Metric::counter("c", 1)).unwrap();
    let (_, resp) = h.call(&unsigned).await;
    assert!(resp.is_error());
    signer.verify_response(&resp).unwrap();

    let mut m = Metric::counter("c", 1);
    signer.sign_metric(&mut m).unwrap();
    let (_, resp) = h.call(&update_metric_request(2, &m).unwrap()).await;
    assert_eq!(resp.message, "metric was saved");
    h.cancel.cancel();

    let mut cfg = ServerConfig::default();
    cfg.server.trusted_subnet = Some("10.0.0.0/8".into());
    let mut h = start(cfg).await;
    let (_, resp) = h.call(&update_metric_request(1, &Metric::counter("c", 1)).unwrap()).await;
    assert_eq!(resp.error, "Access denied");
    assert!(h.store.get_metrics().await.unwrap().is_empty());
    h.cancel.cancel();
}
