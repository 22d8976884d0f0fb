//! Shared application state for the telemon server.
//!
//! Built once at startup; every key file and CIDR is parsed here so a bad
//! setting fails the boot instead of the first request.

use std::sync::Arc;

use telemon_core::protocol::{Signer, Unsealer};
use telemon_core::Result;
use telemon_store::MetricStore;
use tracing::info;

use crate::config::ServerConfig;
use crate::obs::RequestStats;
use crate::policy::TrustedSubnet;
use crate::rpc::RpcRegistry;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn MetricStore>,
    signer: Option<Signer>,
    unsealer: Option<Unsealer>,
    subnet: Option<TrustedSubnet>,
    stats: RequestStats,
    rpc: RpcRegistry,
}

impl AppState {
    /// Returns Result so main can report a bad key or CIDR and exit cleanly.
    pub fn new(cfg: ServerConfig, store: Arc<dyn MetricStore>) -> Result<Self> {
        let signer = cfg.server.key.as_deref().and_then(Signer::new);

        let unsealer = match cfg.server.crypto_key.as_deref() {
            Some(path) if !path.as_os_str().is_empty() => Some(Unsealer::load(path)?),
            _ => None,
        };

        let subnet = match cfg.server.trusted_subnet.as_deref() {
            Some(cidr) if !cidr.is_empty() => Some(TrustedSubnet::parse(cidr)?),
            _ => None,
        };

        info!(
            store = store.name(),
            signed = signer.is_some(),
            sealed = unsealer.is_some(),
            trusted_subnet = ?subnet.map(|s| s.to_string()),
            "server state ready"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                store,
                signer,
                unsealer,
                subnet,
                stats: RequestStats::default(),
                rpc: RpcRegistry::with_builtin(),
            }),
        })
    }

    pub fn store(&self) -> &dyn MetricStore {
        self.inner.store.as_ref()
    }

    pub fn signer(&self) -> Option<&Signer> {
        self.inner.signer.as_ref()
    }

    pub fn unsealer(&self) -> Option<&Unsealer> {
        self.inner.unsealer.as_ref()
    }

    pub fn subnet(&self) -> Option<&TrustedSubnet> {
        self.inner.subnet.as_ref()
    }

    pub fn stats(&self) -> &RequestStats {
        &self.inner.stats
    }

    pub fn rpc(&self) -> &RpcRegistry {
        &self.inner.rpc
    }
}
