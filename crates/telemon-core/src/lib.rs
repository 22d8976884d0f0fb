//! telemon core: transport-agnostic metric model, protocol codec, and errors.
//!
//! This crate defines the wire-level contracts and error surface shared by the
//! server, the agent, and the storage backends. It carries no runtime or HTTP
//! dependencies so both sides of the pipeline can reuse it.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Every decode path surfaces malformed input as `MetricsError` so the server
//! never crashes on bad traffic.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod metric;
pub mod protocol;

/// Shared result type.
pub use error::{MetricsError, Result};
pub use metric::{Metric, MetricKind, ServerResponse};
