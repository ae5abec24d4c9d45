//! Core definitions and collaborators for Brandboard.
#![allow(clippy::module_name_repetitions)]
#![deny(missing_docs)]

pub mod blob;
pub mod error;
pub mod models;
pub mod store;
pub mod utils;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::{Error, Result};
