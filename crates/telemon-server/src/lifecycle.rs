//! Startup and graceful shutdown of the whole server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use telemon_core::{MetricsError, Result};
use telemon_store::{dump, MemoryStore, MetricStore, PersistentStore};

use crate::app_state::AppState;
use crate::config::ServerConfig;
use crate::{router, rpc};

/// Build and initialise the configured backend.
///
/// The memory backend is restored from the snapshot when asked to; a missing
/// or corrupt snapshot is logged and the server starts empty.
pub async fn open_store(cfg: &ServerConfig) -> Result<Arc<dyn MetricStore>> {
    let store: Arc<dyn MetricStore> = match cfg.storage.dsn() {
        Some(dsn) => Arc::new(PersistentStore::new(dsn)),
        None => Arc::new(MemoryStore::new()),
    };
    store.init().await?;

    if cfg.storage.dsn().is_none() && cfg.storage.restore {
        let path = &cfg.storage.store_file;
        if let Err(e) = dump::restore(path, store.as_ref()).await {
            warn!(path = %path.display(), error = %e, "snapshot restore skipped");
        }
    }
    Ok(store)
}

async fn bind(addr: &str) -> Result<TcpListener> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|_| MetricsError::BadRequest(format!("invalid listen address: {addr}")))?;
    TcpListener::bind(addr)
        .await
        .map_err(|e| MetricsError::Internal(format!("bind {addr} failed: {e}")))
}

/// Run until `cancel` fires, then drain and flush.
pub async fn run(cfg: ServerConfig, cancel: CancellationToken) -> Result<()> {
    let store = open_store(&cfg).await?;
    let state = AppState::new(cfg.clone(), Arc::clone(&store))?;

    let http = bind(&cfg.server.listen).await?;
    let rpc_listener = match cfg.server.rpc_listen.as_deref().filter(|s| !s.is_empty()) {
        Some(addr) => Some(bind(addr).await?),
        None => None,
    };

    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    if cfg.storage.dsn().is_none() {
        tasks.push(tokio::spawn(dump::run(
            cfg.storage.store_file.clone(),
            Arc::clone(&store),
            Duration::from_millis(cfg.storage.store_interval_ms),
            cancel.clone(),
        )));
    }

    if let Some(listener) = rpc_listener {
        tasks.push(tokio::spawn(rpc::serve(listener, state.clone(), cancel.clone())));
    }

    info!(listen = %cfg.server.listen, "telemon-server starting");
    let shutdown = cancel.clone();
    let served = axum::serve(http, router::build_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;

    // HTTP may also stop on its own (I/O error); the rest must follow.
    cancel.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            error!(error = %e, "background task panicked");
        }
    }
    if let Err(e) = store.close().await {
        error!(error = %e, "store close failed");
    }

    served.map_err(|e| MetricsError::Internal(format!("http server failed: {e}")))?;
    info!("telemon-server stopped");
    Ok(())
}
