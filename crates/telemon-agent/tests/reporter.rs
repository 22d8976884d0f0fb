//! Reporter against a real in-process server.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use telemon_agent::reporter::{Reporter, RestTransport, RpcTransport, Transport};
use telemon_core::protocol::{Signer, Unsealer};
use telemon_core::{Metric, MetricKind};
use telemon_server::app_state::AppState;
use telemon_server::config::ServerConfig;
use telemon_server::{router, rpc};
use telemon_store::{MemoryStore, MetricStore};

const TIMEOUT: Duration = Duration::from_secs(5);

async fn spawn_http(cfg: ServerConfig) -> (SocketAddr, Arc<dyn MetricStore>) {
    let store: Arc<dyn MetricStore> = Arc::new(MemoryStore::new());
    let state = AppState::new(cfg, Arc::clone(&store)).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router::build_router(state)).await.unwrap();
    });
    (addr, store)
}

async fn spawn_rpc(cfg: ServerConfig) -> (SocketAddr, Arc<dyn MetricStore>, CancellationToken) {
    let store: Arc<dyn MetricStore> = Arc::new(MemoryStore::new());
    let state = AppState::new(cfg, Arc::clone(&store)).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let cancel = CancellationToken::new();
    tokio::spawn(rpc::serve(listener, state, cancel.clone()));
    (addr, store, cancel)
}

async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

async fn agent_store() -> Arc<dyn MetricStore> {
    let store: Arc<dyn MetricStore> = Arc::new(MemoryStore::new());
    store
        .update_metrics(&[Metric::counter("PollCount", 3), Metric::gauge("RandomValue", 0.25)])
        .await
        .unwrap();
    store
}

async fn counter(store: &Arc<dyn MetricStore>, id: &str) -> i64 {
    store
        .get_metric(&Metric::query(id, MetricKind::Counter))
        .await
        .unwrap()
        .delta
        .unwrap()
}

fn reporter(store: &Arc<dyn MetricStore>, transport: Box<dyn Transport>) -> Reporter {
    Reporter::new(Arc::clone(store), transport, Duration::from_secs(10))
}

#[tokio::test]
async fn rest_success_resets_counters_only() {
    let (addr, server) = spawn_http(ServerConfig::default()).await;
    let local = agent_store().await;
    let transport = RestTransport::new(&addr.to_string(), TIMEOUT, None, None).unwrap();
    let reporter = reporter(&local, Box::new(transport));

    assert_eq!(reporter.report_once().await.unwrap(), 2);
    assert_eq!(counter(&server, "PollCount").await, 3);
    assert_eq!(counter(&local, "PollCount").await, 0);
    let gauge = local
        .get_metric(&Metric::query("RandomValue", MetricKind::Gauge))
        .await
        .unwrap();
    assert_eq!(gauge.value, Some(0.25));

    // Only the increment since the reset is sent.
    local.update_metric(&Metric::counter("PollCount", 2)).await.unwrap();
    reporter.report_once().await.unwrap();
    assert_eq!(counter(&server, "PollCount").await, 5);
}

#[tokio::test]
async fn rest_failure_leaves_state_untouched() {
    let addr = unused_addr().await;
    let local = agent_store().await;
    let transport = RestTransport::new(&addr.to_string(), TIMEOUT, None, None).unwrap();
    let reporter = reporter(&local, Box::new(transport));

    assert!(reporter.report_once().await.is_err());
    assert_eq!(counter(&local, "PollCount").await, 3);
}

#[tokio::test]
async fn rest_signed_and_sealed() {
    let key = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let pem = dir.path().join("private.pem");
    std::fs::write(&pem, key.to_pkcs1_pem(LineEnding::LF).unwrap().as_bytes()).unwrap();

    let mut cfg = ServerConfig::default();
    cfg.server.key = Some("secret".into());
    cfg.server.crypto_key = Some(pem);
    let (addr, server) = spawn_http(cfg).await;

    let sealer = Unsealer::new(key).sealer();
    let local = agent_store().await;
    let transport = RestTransport::new(&addr.to_string(), TIMEOUT, Signer::new("secret"), Some(sealer.clone())).unwrap();
    assert_eq!(reporter(&local, Box::new(transport)).report_once().await.unwrap(), 2);
    assert_eq!(counter(&server, "PollCount").await, 3);

    // Wrong key: rejected, nothing reset.
    local.update_metric(&Metric::counter("PollCount", 4)).await.unwrap();
    let transport = RestTransport::new(&addr.to_string(), TIMEOUT, Signer::new("wrong"), Some(sealer)).unwrap();
    assert!(reporter(&local, Box::new(transport)).report_once().await.is_err());
    assert_eq!(counter(&local, "PollCount").await, 4);
    assert_eq!(counter(&server, "PollCount").await, 3);
}

#[tokio::test]
async fn rpc_success_resets_counters() {
    let mut cfg = ServerConfig::default();
    cfg.server.key = Some("secret".into());
    let (addr, server, cancel) = spawn_rpc(cfg).await;

    let local = agent_store().await;
    let transport = RpcTransport::new(addr.to_string(), TIMEOUT, Signer::new("secret"));
    let reporter = reporter(&local, Box::new(transport));

    assert_eq!(reporter.report_once().await.unwrap(), 2);
    assert_eq!(counter(&server, "PollCount").await, 3);
    assert_eq!(counter(&local, "PollCount").await, 0);

    // Connection is reused across ticks.
    local.update_metric(&Metric::counter("PollCount", 1)).await.unwrap();
    reporter.report_once().await.unwrap();
    assert_eq!(counter(&server, "PollCount").await, 4);
    cancel.cancel();
}

#[tokio::test]
async fn rpc_rejection_keeps_counters() {
    let mut cfg = ServerConfig::default();
    cfg.server.trusted_subnet = Some("10.0.0.0/8".into());
    let (addr, server, cancel) = spawn_rpc(cfg).await;

    let local = agent_store().await;
    let transport = RpcTransport::new(addr.to_string(), TIMEOUT, None);
    assert!(reporter(&local, Box::new(transport)).report_once().await.is_err());
    assert_eq!(counter(&local, "PollCount").await, 3);
    assert!(server.get_metrics().await.unwrap().is_empty());
    cancel.cancel();
}

#[tokio::test]
async fn rpc_unreachable_is_an_error() {
    let addr = unused_addr().await;
    let local = agent_store().await;
    let transport = RpcTransport::new(addr.to_string(), TIMEOUT, None);
    assert!(reporter(&local, Box::new(transport)).report_once().await.is_err());
    assert_eq!(counter(&local, "PollCount").await, 3);
}
