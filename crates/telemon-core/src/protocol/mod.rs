//! Protocol modules (path / JSON / RPC frame) plus signing, compression and
//! sealing shared by the server and the agent.
//!
//! Three decode paths feed the store:
//! - Path form: `{kind}/{id}/{value}` segments from the URL.
//! - JSON form: a single metric object or a batch array.
//! - RPC frames: length-delimited binary header + JSON-single payload.
//!
//! All decoders are panic-free: malformed input is reported as `MetricsError`
//! before anything reaches a store.

pub mod compress;
pub mod frame;
pub mod json;
pub mod path;
pub mod seal;
pub mod sign;

pub use json::BodyFormat;
pub use seal::{Sealer, Unsealer};
pub use sign::Signer;
