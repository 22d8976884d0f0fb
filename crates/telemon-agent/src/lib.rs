//! telemon agent library entry.
//!
//! Samples runtime, process and host statistics into a local store and ships
//! them to the server over HTTP or RPC.

pub mod alloc;
pub mod config;
pub mod lifecycle;
pub mod poller;
pub mod reporter;
