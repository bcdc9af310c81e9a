//! Logging support for hosts embedding the event bus
//!
//! The bus itself only emits `tracing` events; installing a subscriber is the
//! host's decision. [`setup_logging`] is a convenience for hosts and tests that
//! have no subscriber of their own.

pub mod context;
pub mod setup;

pub use context::LogContext;
pub use setup::{parse_log_level, setup_logging, LoggingConfig};
