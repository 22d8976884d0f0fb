#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use clap::Parser;
use telemon_agent::config::{self, AgentArgs};
use telemon_agent::lifecycle::build_transport;

#[test]
fn defaults() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.agent.address, "127.0.0.1:8080");
    assert_eq!(cfg.agent.poll_interval_ms, 2000);
    assert_eq!(cfg.agent.report_interval_ms, 10000);
    assert!(cfg.agent.rpc_address().is_none());
}

#[test]
fn unknown_field_and_zero_interval_rejected() {
    let err = config::load_from_str("version: 1\nagent:\n  pol_interval_ms: 5\n").expect_err("typo");
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
    assert!(config::load_from_str("version: 1\nagent:\n  poll_interval_ms: 0\n").is_err());
}

#[test]
fn report_shorter_than_poll_only_warns() {
    let cfg = config::load_from_str("version: 1\nagent:\n  poll_interval_ms: 5000\n  report_interval_ms: 1000\n");
    assert!(cfg.is_ok());
}

#[test]
fn rpc_flag_selects_rpc_transport() {
    let args = AgentArgs::try_parse_from(["telemon-agent", "-g", "127.0.0.1:3200", "-p", "500"]).unwrap();
    let cfg = config::resolve(args).unwrap();
    assert_eq!(cfg.agent.poll_interval_ms, 500);
    assert_eq!(build_transport(&cfg).unwrap().name(), "rpc");

    let cfg = config::resolve(AgentArgs::try_parse_from(["telemon-agent"]).unwrap()).unwrap();
    assert_eq!(build_transport(&cfg).unwrap().name(), "rest");
}

#[test]
fn file_is_validated_after_flags() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agent.yaml");
    std::fs::write(&path, "version: 1\nagent:\n  poll_interval_ms: 0\n").unwrap();

    assert!(config::load_from_file(&path).is_err());

    let args =
        AgentArgs::try_parse_from(["telemon-agent", "-c", path.to_str().unwrap(), "-p", "500"]).unwrap();
    let cfg = config::resolve(args).unwrap();
    assert_eq!(cfg.agent.poll_interval_ms, 500);
}
