//! Agent startup: local store, poller, reporter, shutdown.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use telemon_core::protocol::{Sealer, Signer};
use telemon_core::Result;
use telemon_store::{MemoryStore, MetricStore};

use crate::config::AgentConfig;
use crate::poller::{default_sources, Poller};
use crate::reporter::{Reporter, RestTransport, RpcTransport, Transport};

/// Pick the transport: RPC when an RPC address is configured, else REST.
pub fn build_transport(cfg: &AgentConfig) -> Result<Box<dyn Transport>> {
    let a = &cfg.agent;
    let signer = a.key.as_deref().and_then(Signer::new);

    if let Some(addr) = a.rpc_address() {
        return Ok(Box::new(RpcTransport::new(addr, a.request_timeout(), signer)));
    }

    let sealer = match a.crypto_key.as_deref() {
        Some(path) if !path.as_os_str().is_empty() => Some(Sealer::load(path)?),
        _ => None,
    };
    Ok(Box::new(RestTransport::new(&a.address, a.request_timeout(), signer, sealer)?))
}

/// Run until `cancel` fires. The in-flight tick of each loop completes.
pub async fn run(cfg: AgentConfig, cancel: CancellationToken) -> Result<()> {
    let store: Arc<dyn MetricStore> = Arc::new(MemoryStore::new());
    store.init().await?;

    let transport = build_transport(&cfg)?;
    info!(
        address = %cfg.agent.address,
        transport = transport.name(),
        signed = cfg.agent.key.as_deref().is_some_and(|k| !k.is_empty()),
        "telemon-agent starting"
    );

    let poller = Poller::new(Arc::clone(&store), default_sources(), cfg.agent.poll_interval());
    let reporter = Reporter::new(Arc::clone(&store), transport, cfg.agent.report_interval());

    let poll_task = tokio::spawn(poller.run(cancel.clone()));
    let report_task = tokio::spawn(reporter.run(cancel.clone()));

    for (name, task) in [("poller", poll_task), ("reporter", report_task)] {
        if let Err(e) = task.await {
            error!(task = name, error = %e, "task panicked");
        }
    }
    store.close().await?;
    info!("telemon-agent stopped");
    Ok(())
}
