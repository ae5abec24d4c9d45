//! HTTP api of Brandboard.
//!
//! Wire models are always available. The axum server and the reqwest client
//! live behind the `server` and `client` features.

pub mod model;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "server")]
pub mod server;
