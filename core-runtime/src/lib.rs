//! # Runtime
//!
//! Shared infrastructure for assembling a sync run: validated run
//! configuration translated into per-stage configs, and `tracing`-based
//! logging setup.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    full_sync_threshold, incremental_threshold, SyncRunConfig, SyncRunConfigBuilder,
    FULL_SYNC_EPOCH,
};
pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
