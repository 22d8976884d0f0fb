use std::path::PathBuf;

use clap::Parser;

use super::AgentConfig;

#[derive(Debug, Default, Parser)]
#[command(name = "telemon-agent")]
#[command(about = "Telemetry collection agent", long_about = None)]
pub struct AgentArgs {
    /// Server HTTP address
    #[arg(short = 'a', long = "address", env = "ADDRESS")]
    pub address: Option<String>,

    /// Server RPC address (switches to the RPC transport)
    #[arg(short = 'g', long = "grpc-address", env = "GRPC_ADDRESS")]
    pub rpc_address: Option<String>,

    /// HMAC signing key
    #[arg(short = 'k', long = "key", env = "KEY")]
    pub key: Option<String>,

    /// Public key (PEM) for sealing bodies
    #[arg(long = "crypto-key", env = "CRYPTO_KEY")]
    pub crypto_key: Option<PathBuf>,

    /// Poll interval in milliseconds
    #[arg(short = 'p', long = "poll-interval", env = "POLL_INTERVAL")]
    pub poll_interval_ms: Option<u64>,

    /// Report interval in milliseconds
    #[arg(short = 'r', long = "report-interval", env = "REPORT_INTERVAL")]
    pub report_interval_ms: Option<u64>,

    /// Per-request timeout in milliseconds
    #[arg(long = "request-timeout", env = "REQUEST_TIMEOUT")]
    pub request_timeout_ms: Option<u64>,

    /// YAML config file
    #[arg(short = 'c', long = "config", env = "CONFIG")]
    pub config: Option<PathBuf>,
}

impl AgentArgs {
    pub fn overlay(self, cfg: &mut AgentConfig) {
        let a = &mut cfg.agent;
        if let Some(v) = self.address {
            a.address = v;
        }
        if let Some(v) = self.rpc_address {
            a.rpc_address = Some(v);
        }
        if let Some(v) = self.key {
            a.key = Some(v);
        }
        if let Some(v) = self.crypto_key {
            a.crypto_key = Some(v);
        }
        if let Some(v) = self.poll_interval_ms {
            a.poll_interval_ms = v;
        }
        if let Some(v) = self.report_interval_ms {
            a.report_interval_ms = v;
        }
        if let Some(v) = self.request_timeout_ms {
            a.request_timeout_ms = v;
        }
    }
}
