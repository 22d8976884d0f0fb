//! Agent config loader (strict parsing) with flag/env overlay.

pub mod cli;
pub mod schema;

use std::fs;
use std::path::Path;

use telemon_core::{MetricsError, Result};

pub use cli::AgentArgs;
pub use schema::{AgentConfig, AgentSection};

pub fn load_from_file(path: impl AsRef<Path>) -> Result<AgentConfig> {
    let cfg = parse_file(path.as_ref())?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_from_str(s: &str) -> Result<AgentConfig> {
    let cfg = parse(s)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Strict parse only; range checks wait until every layer is applied.
fn parse(s: &str) -> Result<AgentConfig> {
    serde_yaml::from_str(s).map_err(|e| MetricsError::BadRequest(format!("invalid yaml: {e}")))
}

fn parse_file(path: &Path) -> Result<AgentConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| MetricsError::Internal(format!("read config {} failed: {e}", path.display())))?;
    parse(&s)
}

/// File (if any) < flags/env. Validated once, after the overlay.
pub fn resolve(args: AgentArgs) -> Result<AgentConfig> {
    let mut cfg = match args.config.as_deref() {
        Some(path) => parse_file(path)?,
        None => AgentConfig::default(),
    };
    args.overlay(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}
