//! telemon store: the `MetricStore` capability and its backends.
//!
//! - [`MemoryStore`]: two independently locked maps, process-local.
//! - [`PersistentStore`]: SQLite tables behind an sqlx pool.
//! - [`dump`]: snapshot-to-disk and restore for the memory backend.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod dump;
pub mod memory;
pub mod persistent;
mod schema;
pub mod store;

pub use memory::MemoryStore;
pub use persistent::PersistentStore;
pub use store::MetricStore;
