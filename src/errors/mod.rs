//! # Error Handling
//!
//! Typed failures surfaced by the repositories, the connection manager and
//! the crypto plugins.

pub mod types;

pub use types::{Result, StrongroomError};
