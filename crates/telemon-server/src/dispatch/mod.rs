//! HTTP dispatch: body extraction, metric handlers, reply rendering.

pub mod body;
pub mod handlers;
pub mod respond;

pub use respond::{Negotiation, Reply};
