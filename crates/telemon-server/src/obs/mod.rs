//! Request statistics.

pub mod stats;

pub use stats::{CounterVec, RequestStats};
