//! Top-level facade crate for telemon.
//!
//! One dependency for the metric model, the storage backends, and both the
//! server and agent libraries.

pub mod core {
    pub use telemon_core::*;
}

pub mod store {
    pub use telemon_store::*;
}

pub mod server {
    pub use telemon_server::*;
}

pub mod agent {
    pub use telemon_agent::*;
}
