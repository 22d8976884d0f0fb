//! telemon server library entry.
//!
//! Wires config, access policy, the HTTP dispatcher, the RPC listener and the
//! metric store into one server. Consumed by the binary (`main.rs`) and by
//! integration tests.

pub mod app_state;
pub mod config;
pub mod dispatch;
pub mod lifecycle;
pub mod obs;
pub mod ops;
pub mod policy;
pub mod router;
pub mod rpc;
