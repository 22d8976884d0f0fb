//! Command-line flags. Each flag also reads its environment variable and
//! overrides the file value when present.

use std::path::PathBuf;

use clap::Parser;

use super::ServerConfig;

#[derive(Debug, Default, Parser)]
#[command(name = "telemon-server")]
#[command(about = "Telemetry collection server", long_about = None)]
pub struct ServerArgs {
    /// HTTP listen address
    #[arg(short = 'a', long = "address", env = "ADDRESS")]
    pub address: Option<String>,

    /// RPC listen address
    #[arg(short = 'g', long = "grpc-address", env = "GRPC_ADDRESS")]
    pub rpc_address: Option<String>,

    /// HMAC signing key
    #[arg(short = 'k', long = "key", env = "KEY")]
    pub key: Option<String>,

    /// Private key (PEM) for sealed bodies
    #[arg(long = "crypto-key", env = "CRYPTO_KEY")]
    pub crypto_key: Option<PathBuf>,

    /// Trusted client subnet (CIDR)
    #[arg(short = 't', long = "trusted-subnet", env = "TRUSTED_SUBNET")]
    pub trusted_subnet: Option<String>,

    /// Database DSN; selects the persistent store
    #[arg(short = 'd', long = "database-dsn", env = "DATABASE_DSN")]
    pub database_dsn: Option<String>,

    /// Snapshot file
    #[arg(short = 'f', long = "store-file", env = "STORE_FILE")]
    pub store_file: Option<PathBuf>,

    /// Snapshot interval in milliseconds
    #[arg(short = 'i', long = "store-interval", env = "STORE_INTERVAL")]
    pub store_interval_ms: Option<u64>,

    /// Restore the snapshot at startup
    #[arg(short = 'r', long = "restore", env = "RESTORE")]
    pub restore: Option<bool>,

    /// YAML config file
    #[arg(short = 'c', long = "config", env = "CONFIG")]
    pub config: Option<PathBuf>,
}

impl ServerArgs {
    pub fn overlay(self, cfg: &mut ServerConfig) {
        if let Some(v) = self.address {
            cfg.server.listen = v;
        }
        if let Some(v) = self.rpc_address {
            cfg.server.rpc_listen = Some(v);
        }
        if let Some(v) = self.key {
            cfg.server.key = Some(v);
        }
        if let Some(v) = self.crypto_key {
            cfg.server.crypto_key = Some(v);
        }
        if let Some(v) = self.trusted_subnet {
            cfg.server.trusted_subnet = Some(v);
        }
        if let Some(v) = self.database_dsn {
            cfg.storage.database_dsn = Some(v);
        }
        if let Some(v) = self.store_file {
            cfg.storage.store_file = v;
        }
        if let Some(v) = self.store_interval_ms {
            cfg.storage.store_interval_ms = v;
        }
        if let Some(v) = self.restore {
            cfg.storage.restore = v;
        }
    }
}
