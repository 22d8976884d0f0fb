use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use telemon_core::protocol::frame::{decode_update_metric, RpcFrame, METHOD_UPDATE_METRIC};
use telemon_core::{MetricsError, Result, ServerResponse};

use crate::app_state::AppState;
use crate::dispatch::handlers::SAVED;

/// One RPC method, routed by `method_id`.
#[async_trait]
pub trait RpcMethod: Send + Sync {
    fn method_id(&self) -> u8;
    fn name(&self) -> &'static str;
    async fn call(&self, state: &AppState, frame: &RpcFrame) -> Result<ServerResponse>;
}

/// `UpdateMetric(Metric) -> {message, error}`
pub struct UpdateMetric;

#[async_trait]
impl RpcMethod for UpdateMetric {
    fn method_id(&self) -> u8 {
        METHOD_UPDATE_METRIC
    }

    fn name(&self) -> &'static str {
        "update_metric"
    }

    async fn call(&self, state: &AppState, frame: &RpcFrame) -> Result<ServerResponse> {
        let metric = decode_update_metric(frame)?;
        if let Some(signer) = state.signer() {
            signer.verify_metric(&metric)?;
        }
        state.store().update_metric(&metric).await?;
        state.stats().updated(metric.kind.as_str(), 1);
        debug!(id = %metric.id, kind = %metric.kind, "metric saved via rpc");
        Ok(ServerResponse::message(SAVED))
    }
}

/// Registry of RPC methods keyed by method id.
#[derive(Default)]
pub struct RpcRegistry {
    methods: DashMap<u8, Arc<dyn RpcMethod>>,
}

impl RpcRegistry {
    pub fn new() -> Self {
        Self {
            methods: DashMap::new(),
        }
    }

    /// Registry with every built-in method.
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(UpdateMetric));
        registry
    }

    pub fn register(&self, method: Arc<dyn RpcMethod>) {
        self.methods.insert(method.method_id(), method);
    }

    pub fn registered(&self) -> Vec<(u8, &'static str)> {
        let mut out: Vec<_> = self.methods.iter().map(|e| (*e.key(), e.value().name())).collect();
        out.sort();
        out
    }

    /// Method name for stats; `unknown` when unregistered.
    pub fn name_of(&self, id: u8) -> &'static str {
        self.methods.get(&id).map(|m| m.name()).unwrap_or("unknown")
    }

    pub async fn dispatch(&self, state: &AppState, frame: &RpcFrame) -> Result<ServerResponse> {
        let id = frame.method;
        let handler = self
            .methods
            .get(&id)
            .ok_or_else(|| MetricsError::BadRequest(format!("unknown rpc method: {id}")))?
            .value()
            .clone();
        handler.call(state, frame).await
    }
}
