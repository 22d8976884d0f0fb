use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use telemon_core::{MetricsError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    pub version: u32,

    #[serde(default)]
    pub agent: AgentSection,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            version: 1,
            agent: AgentSection::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MetricsError::BadRequest(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        self.agent.validate()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentSection {
    /// Server HTTP address (`host:port` or a full `http://` URL).
    #[serde(default = "default_address")]
    pub address: String,

    /// Server RPC address; selects the RPC transport when set.
    #[serde(default)]
    pub rpc_address: Option<String>,

    #[serde(default)]
    pub key: Option<String>,

    /// PEM public key used to seal request bodies.
    #[serde(default)]
    pub crypto_key: Option<PathBuf>,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            address: default_address(),
            rpc_address: None,
            key: None,
            crypto_key: None,
            poll_interval_ms: default_poll_interval_ms(),
            report_interval_ms: default_report_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl AgentSection {
    pub fn validate(&self) -> Result<()> {
        if self.address.is_empty() {
            return Err(MetricsError::BadRequest("agent.address must not be empty".into()));
        }
        for (name, v) in [
            ("agent.poll_interval_ms", self.poll_interval_ms),
            ("agent.report_interval_ms", self.report_interval_ms),
            ("agent.request_timeout_ms", self.request_timeout_ms),
        ] {
            if v == 0 {
                return Err(MetricsError::BadRequest(format!("{name} must be greater than 0")));
            }
        }
        if self.report_interval_ms < self.poll_interval_ms {
            tracing::warn!(
                poll_ms = self.poll_interval_ms,
                report_ms = self.report_interval_ms,
                "report interval is shorter than poll interval"
            );
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn rpc_address(&self) -> Option<&str> {
        self.rpc_address.as_deref().filter(|s| !s.is_empty())
    }
}

fn default_address() -> String {
    "127.0.0.1:8080".into()
}
fn default_poll_interval_ms() -> u64 {
    2_000
}
fn default_report_interval_ms() -> u64 {
    10_000
}
fn default_request_timeout_ms() -> u64 {
    5_000
}
