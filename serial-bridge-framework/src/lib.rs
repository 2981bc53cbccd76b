//! Serial Bridge Framework
//!
//! Common plumbing for bridges that forward serial telemetry to a sink.
//!
//! # Overview
//!
//! This framework provides:
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`BridgeArgs`] for common CLI argument parsing
//! - [`Connector`] for establishing transports under a [`RetryPolicy`]
//! - [`BridgeRunner`] for managing bridge lifecycle (workers, signal handling, shutdown)
//!
//! # Example
//!
//! ```ignore
//! use serial_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner, Connector, RetryPolicy};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = BridgeArgs::parse();
//!     let config = MyBridgeConfig::load_or_default(&args)?;
//!     config.validate()?;
//!
//!     let mut connector = Connector::new("sink", RetryPolicy::remote());
//!     let sink = connector.establish(|| MySink::connect(&config.address)).await?;
//!
//!     let mut runner = BridgeRunner::new("mybridge");
//!     let shutdown = runner.shutdown_signal();
//!     runner.spawn_critical("worker", my_worker(sink, shutdown));
//!
//!     // Run until Ctrl+C
//!     runner.run().await?;
//!     Ok(())
//! }
//! ```

mod args;
mod config;
pub mod connector;
mod error;
mod runner;

pub use args::BridgeArgs;
pub use config::{BridgeConfig, init_logging};
pub use connector::{ConnectionState, Connector, OnTimeout, RetryPolicy};
pub use error::{BridgeError, ConnectError, Result};
pub use runner::{BridgeRunner, DEFAULT_DRAIN_TIMEOUT, wait_for_signal};

// Re-export commonly used types from serial-bridge-common
pub use serial_bridge_common::{Format, LoggingConfig, ZenohConfig};
