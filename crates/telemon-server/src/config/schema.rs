use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;
use telemon_core::{MetricsError, Result};

use crate::policy::TrustedSubnet;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub storage: StorageSection,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            storage: StorageSection::default(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MetricsError::BadRequest(format!(
                "unsupported config version {}",
                self.version
            )));
        }

        self.server.validate()?;
        self.storage.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// RPC listener; disabled when unset.
    #[serde(default)]
    pub rpc_listen: Option<String>,

    /// HMAC key shared with agents.
    #[serde(default)]
    pub key: Option<String>,

    /// PEM private key used to unseal request bodies.
    #[serde(default)]
    pub crypto_key: Option<PathBuf>,

    /// CIDR of allowed clients.
    #[serde(default)]
    pub trusted_subnet: Option<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            rpc_listen: None,
            key: None,
            crypto_key: None,
            trusted_subnet: None,
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen.parse::<SocketAddr>().map_err(|_| {
            MetricsError::BadRequest(format!("server.listen is not a socket address: {}", self.listen))
        })?;
        if let Some(rpc) = self.rpc_listen.as_deref().filter(|s| !s.is_empty()) {
            rpc.parse::<SocketAddr>().map_err(|_| {
                MetricsError::BadRequest(format!("server.rpc_listen is not a socket address: {rpc}"))
            })?;
        }
        if let Some(cidr) = self.trusted_subnet.as_deref().filter(|s| !s.is_empty()) {
            TrustedSubnet::parse(cidr)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSection {
    /// Non-empty selects the persistent backend.
    #[serde(default)]
    pub database_dsn: Option<String>,

    #[serde(default = "default_store_file")]
    pub store_file: PathBuf,

    #[serde(default = "default_store_interval_ms")]
    pub store_interval_ms: u64,

    #[serde(default = "default_restore")]
    pub restore: bool,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            database_dsn: None,
            store_file: default_store_file(),
            store_interval_ms: default_store_interval_ms(),
            restore: default_restore(),
        }
    }
}

impl StorageSection {
    pub fn validate(&self) -> Result<()> {
        if self.store_interval_ms == 0 {
            return Err(MetricsError::BadRequest(
                "storage.store_interval_ms must be greater than 0".into(),
            ));
        }
        if self.store_file.as_os_str().is_empty() {
            return Err(MetricsError::BadRequest(
                "storage.store_file must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn dsn(&self) -> Option<&str> {
        self.database_dsn.as_deref().filter(|s| !s.is_empty())
    }
}

fn default_listen() -> String {
    "127.0.0.1:8080".into()
}
fn default_store_file() -> PathBuf {
    PathBuf::from("/tmp/devops-metrics-db.json")
}
fn default_store_interval_ms() -> u64 {
    300_000
}
fn default_restore() -> bool {
    true
}
