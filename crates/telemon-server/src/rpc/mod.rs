//! RPC surface: `UpdateMetric` over length-delimited TCP frames.

pub mod listener;
pub mod service;

pub use listener::serve;
pub use service::{RpcMethod, RpcRegistry, UpdateMetric};
