//! Helpers for mirroring the pins of a Filebase account onto a local Kubo node,
//! and back again.

pub mod config;
pub mod error;
pub mod filebase;
pub mod kubo;
pub mod logger;
pub mod metadata;
pub mod pinset;
pub mod reconcile;
pub mod store;

pub use error::{Error, Result};
