//! Access policy applied before any request reaches the store.

pub mod guard;
pub mod subnet;

pub use subnet::{TrustedSubnet, REAL_IP_HEADER};
