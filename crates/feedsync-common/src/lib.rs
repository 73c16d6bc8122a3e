//! Feedsync Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
//!
//! Shared plumbing used by every feedsync binary.
//!
//! - **Logging**: one place that turns a [`logging::LogConfig`] into a global
//!   `tracing` subscriber, so the server and the one-shot ingest CLI emit the
//!   same log shape.
//!
//! # Example
//!
//! ```no_run
//! use feedsync_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     let _guard = init_logging(&config)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel, LogOutput};
