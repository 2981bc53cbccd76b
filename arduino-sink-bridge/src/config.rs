//! Configuration for the Arduino sink bridge.
//!
//! Values are layered: built-in defaults, then the optional JSON5 file, then
//! environment variables and command-line flags ([`Overrides`]). The result
//! is validated once and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use serial_bridge_common::{DEFAULT_DELIMITER, Format, LoggingConfig, ZenohConfig};
use serial_bridge_framework::{BridgeConfig, BridgeError, OnTimeout, RetryPolicy};

use crate::serial::DEFAULT_MAX_LINE_LEN;

/// Complete bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArduinoBridgeConfig {
    /// Serial source settings
    #[serde(default)]
    pub serial: SerialConfig,

    /// Where forwarded telemetry goes
    #[serde(default)]
    pub sink: SinkConfig,

    /// Connection retry settings
    #[serde(default)]
    pub connect: ConnectConfig,

    /// Forwarding pipeline settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Encoding for local sinks (stdout, Unix socket, Zenoh)
    #[serde(default)]
    pub serialization: Format,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial port where the Arduino is connected
    #[serde(default = "default_port")]
    pub port: String,

    /// Serial bitrate used by the Arduino
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,

    /// Field delimiter within a telemetry line
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Lines longer than this many bytes are dropped
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,

    /// Retry opening the port under the connect policy instead of exiting
    #[serde(default)]
    pub retry_open: bool,
}

fn default_port() -> String {
    "/dev/ttyS9".to_string()
}

fn default_bitrate() -> u32 {
    115200
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

fn default_max_line_len() -> usize {
    DEFAULT_MAX_LINE_LEN
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bitrate: default_bitrate(),
            delimiter: default_delimiter(),
            max_line_len: default_max_line_len(),
            retry_open: false,
        }
    }
}

/// Sink selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SinkConfig {
    /// gRPC `Well` service
    Grpc {
        #[serde(default = "default_grpc_address")]
        address: String,
    },
    /// Unix stream socket
    Unix { path: String },
    /// Standard output
    Stdout,
    /// Zenoh key expression
    Zenoh {
        #[serde(default = "default_key_expr")]
        key_expr: String,
        #[serde(default)]
        zenoh: ZenohConfig,
    },
    /// No peer; every send fails
    None,
}

fn default_grpc_address() -> String {
    "0.0.0.0:50051".to_string()
}

fn default_key_expr() -> String {
    "arduino/telemetry".to_string()
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig::Grpc {
            address: default_grpc_address(),
        }
    }
}

impl SinkConfig {
    /// Short human-readable description for logs.
    pub fn describe(&self) -> String {
        match self {
            SinkConfig::Grpc { address } => format!("grpc://{}", address),
            SinkConfig::Unix { path } => format!("unix://{}", path),
            SinkConfig::Stdout => "stdout".to_string(),
            SinkConfig::Zenoh { key_expr, .. } => format!("zenoh/{}", key_expr),
            SinkConfig::None => "none".to_string(),
        }
    }

    /// Timing defaults for this kind of peer.
    pub fn default_policy(&self) -> RetryPolicy {
        match self {
            SinkConfig::Unix { .. } | SinkConfig::Stdout => RetryPolicy::local(),
            _ => RetryPolicy::remote(),
        }
    }
}

/// Connection retry settings; unset values fall back to per-sink defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectConfig {
    /// Seconds after which a connection timeout is reported
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Seconds between connection attempts
    #[serde(default)]
    pub retry_secs: Option<u64>,

    /// Keep retrying after the timeout ("warn") or give up ("fail")
    #[serde(default)]
    pub on_timeout: OnTimeout,
}

impl ConnectConfig {
    /// Apply the configured values on top of `base`.
    pub fn policy(&self, base: RetryPolicy) -> RetryPolicy {
        let mut policy = base.with_on_timeout(self.on_timeout);
        if let Some(secs) = self.retry_secs {
            policy = policy.with_retry_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = self.timeout_secs {
            policy = policy.with_timeout(Duration::from_secs(secs));
        }
        policy
    }
}

/// What the bridge does when the serial stream ends or fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamEndPolicy {
    /// Log and stop forwarding; the process keeps waiting for a signal.
    #[default]
    Stop,
    /// Shut the bridge down with a non-zero exit code.
    Exit,
}

/// Forwarding pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Deadline for a single send to the sink
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,

    #[serde(default)]
    pub on_stream_end: StreamEndPolicy,
}

fn default_send_timeout_secs() -> u64 {
    10
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            send_timeout_secs: default_send_timeout_secs(),
            on_stream_end: StreamEndPolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

/// Settings taken from the environment and command line.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Serial port where the Arduino is connected
    #[arg(long, env = "SERIAL_PORT")]
    pub port: Option<String>,

    /// Serial bitrate used by the Arduino
    #[arg(long, env = "SERIAL_BITRATE")]
    pub bitrate: Option<u32>,

    /// gRPC sink address (an empty value disables the sink)
    #[arg(long, env = "GRPC_ADDRESS")]
    pub grpc_address: Option<String>,

    /// Path to unix socket where data is written (write to stdout if empty)
    #[arg(long, env = "SOCKET_PATH")]
    pub socket: Option<String>,

    /// Timeout in seconds to wait for the sink to become available
    #[arg(long, env = "SOCKET_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Seconds between connection attempts
    #[arg(long, env = "RETRY_INTERVAL")]
    pub retry: Option<u64>,
}

impl ArduinoBridgeConfig {
    /// Layer environment and command-line values over the loaded file.
    pub fn apply_overrides(&mut self, overrides: &Overrides) -> Result<(), BridgeError> {
        if overrides.grpc_address.is_some() && overrides.socket.is_some() {
            return Err(BridgeError::validation(
                "--grpc-address and --socket are mutually exclusive",
            ));
        }

        if let Some(port) = &overrides.port {
            self.serial.port = port.clone();
        }
        if let Some(bitrate) = overrides.bitrate {
            self.serial.bitrate = bitrate;
        }
        if let Some(address) = &overrides.grpc_address {
            self.sink = if address.is_empty() {
                SinkConfig::None
            } else {
                SinkConfig::Grpc {
                    address: address.clone(),
                }
            };
        }
        if let Some(path) = &overrides.socket {
            self.sink = if path.is_empty() {
                SinkConfig::Stdout
            } else {
                SinkConfig::Unix { path: path.clone() }
            };
        }
        if let Some(timeout) = overrides.timeout {
            self.connect.timeout_secs = Some(timeout);
        }
        if let Some(retry) = overrides.retry {
            self.connect.retry_secs = Some(retry);
        }

        Ok(())
    }

    /// Retry policy for the sink connection.
    pub fn sink_policy(&self) -> RetryPolicy {
        self.connect.policy(self.sink.default_policy())
    }

    /// Retry policy for reopening the serial port.
    pub fn serial_policy(&self) -> RetryPolicy {
        self.connect.policy(RetryPolicy::remote())
    }
}

impl BridgeConfig for ArduinoBridgeConfig {
    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn validate(&self) -> Result<(), BridgeError> {
        if self.serial.port.is_empty() {
            return Err(BridgeError::validation("serial.port cannot be empty"));
        }
        if self.serial.bitrate == 0 {
            return Err(BridgeError::validation("serial.bitrate must be positive"));
        }
        if self.serial.delimiter.is_empty() {
            return Err(BridgeError::validation("serial.delimiter cannot be empty"));
        }
        if self.serial.max_line_len == 0 {
            return Err(BridgeError::validation("serial.max_line_len must be positive"));
        }

        match &self.sink {
            SinkConfig::Grpc { address } if address.is_empty() => {
                return Err(BridgeError::validation(
                    "sink.address cannot be empty (use kind \"none\" to run without a sink)",
                ));
            }
            SinkConfig::Unix { path } if path.is_empty() => {
                return Err(BridgeError::validation(
                    "sink.path cannot be empty (use kind \"stdout\" to write to stdout)",
                ));
            }
            SinkConfig::Zenoh { key_expr, .. } if key_expr.is_empty() => {
                return Err(BridgeError::validation("sink.key_expr cannot be empty"));
            }
            _ => {}
        }

        if self.connect.retry_secs == Some(0) {
            return Err(BridgeError::validation("connect.retry_secs must be positive"));
        }
        if self.pipeline.send_timeout_secs == 0 {
            return Err(BridgeError::validation(
                "pipeline.send_timeout_secs must be positive",
            ));
        }

        Ok(())
    }
}
