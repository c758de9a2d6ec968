//! # Observability Infrastructure
//!
//! Structured logging for the storage and crypto layers. Operations are
//! instrumented with `tracing`; embedding services install a subscriber with
//! [`init_logging`] or bring their own.

pub mod logging;

pub use logging::{build_env_filter, init_logging, log_config_info};
