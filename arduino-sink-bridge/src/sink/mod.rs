//! Downstream sinks for forwarded telemetry.
//!
//! Every sink implements [`Sink`]; [`AnySink`] picks one at runtime from the
//! configuration. Only [`GrpcSink`] has an acknowledgement channel, the
//! others report [`Ack::None`].

mod grpc;
mod stream;
mod zenoh_sink;

pub use grpc::GrpcSink;
pub use stream::StreamSink;
pub use zenoh_sink::ZenohSink;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use serial_bridge_common::TelemetryRecord;
use serial_bridge_framework::{ConnectError, Connector};

use crate::config::{ArduinoBridgeConfig, SinkConfig};

/// What a sink returned for a delivered record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    /// The peer echoed a fingerprint (empty when the response carried none).
    Echoed(String),
    /// The sink has no acknowledgement channel.
    None,
}

/// A single send failed; the record is dropped.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("RPC failed: {0}")]
    Rpc(String),

    #[error("Write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode message: {0}")]
    Encode(String),

    #[error("Zenoh put failed: {0}")]
    Zenoh(String),

    #[error("No sink configured")]
    NoPeer,

    #[error("Send timed out after {0:?}")]
    TimedOut(Duration),
}

/// A single connection attempt to a sink failed.
#[derive(Debug, Error)]
pub enum SinkConnectError {
    #[error("Invalid address {address:?}: {message}")]
    InvalidAddress { address: String, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Zenoh error: {0}")]
    Zenoh(String),
}

/// A destination for telemetry records.
pub trait Sink: Send {
    /// Human-readable target for logs.
    fn describe(&self) -> &str;

    /// Deliver one record.
    fn send(
        &mut self,
        record: &TelemetryRecord,
    ) -> impl Future<Output = Result<Ack, SendError>> + Send;

    /// Release the underlying transport.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Sink used when no peer is configured; every send fails.
#[derive(Debug, Default)]
pub struct NullSink;

impl Sink for NullSink {
    fn describe(&self) -> &str {
        "none"
    }

    async fn send(&mut self, _record: &TelemetryRecord) -> Result<Ack, SendError> {
        Err(SendError::NoPeer)
    }

    async fn close(&mut self) {}
}

/// Runtime selection over the supported sinks.
pub enum AnySink {
    Grpc(GrpcSink),
    Stream(StreamSink),
    Zenoh(ZenohSink),
    Null(NullSink),
}

impl Sink for AnySink {
    fn describe(&self) -> &str {
        match self {
            AnySink::Grpc(sink) => sink.describe(),
            AnySink::Stream(sink) => sink.describe(),
            AnySink::Zenoh(sink) => sink.describe(),
            AnySink::Null(sink) => sink.describe(),
        }
    }

    async fn send(&mut self, record: &TelemetryRecord) -> Result<Ack, SendError> {
        match self {
            AnySink::Grpc(sink) => sink.send(record).await,
            AnySink::Stream(sink) => sink.send(record).await,
            AnySink::Zenoh(sink) => sink.send(record).await,
            AnySink::Null(sink) => sink.send(record).await,
        }
    }

    async fn close(&mut self) {
        match self {
            AnySink::Grpc(sink) => sink.close().await,
            AnySink::Stream(sink) => sink.close().await,
            AnySink::Zenoh(sink) => sink.close().await,
            AnySink::Null(sink) => sink.close().await,
        }
    }
}

/// Connect the configured sink, retrying through `connector`.
///
/// Stdout and the null sink need no connection and bypass the connector.
pub async fn connect(
    config: &ArduinoBridgeConfig,
    connector: &mut Connector,
) -> Result<AnySink, ConnectError> {
    let format = config.serialization;

    match &config.sink {
        SinkConfig::Grpc { address } => {
            let attempt_timeout = connector.policy().attempt_timeout;
            connector
                .establish(|| GrpcSink::connect(address, attempt_timeout))
                .await
                .map(AnySink::Grpc)
        }
        SinkConfig::Unix { path } => connector
            .establish(|| StreamSink::connect_unix(path, format))
            .await
            .map(AnySink::Stream),
        SinkConfig::Stdout => Ok(AnySink::Stream(StreamSink::stdout(format))),
        SinkConfig::Zenoh { key_expr, zenoh } => connector
            .establish(|| ZenohSink::connect(key_expr, zenoh, format))
            .await
            .map(AnySink::Zenoh),
        SinkConfig::None => {
            warn!("No sink configured, every record will be dropped");
            Ok(AnySink::Null(NullSink))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_bridge_framework::{ConnectionState, RetryPolicy};

    fn record() -> TelemetryRecord {
        TelemetryRecord::parse("133|0.65|0.43", "|").unwrap()
    }

    #[tokio::test]
    async fn test_null_sink_fails_every_send() {
        let mut sink = NullSink;
        assert!(matches!(sink.send(&record()).await, Err(SendError::NoPeer)));
        assert!(matches!(sink.send(&record()).await, Err(SendError::NoPeer)));
    }

    #[tokio::test]
    async fn test_connect_none_skips_connector() {
        let config = ArduinoBridgeConfig {
            sink: SinkConfig::None,
            ..Default::default()
        };
        let mut connector = Connector::new(config.sink.describe(), RetryPolicy::local());

        let sink = connect(&config, &mut connector).await.unwrap();
        assert_eq!(sink.describe(), "none");
        assert_eq!(connector.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_stdout() {
        let config = ArduinoBridgeConfig {
            sink: SinkConfig::Stdout,
            ..Default::default()
        };
        let mut connector = Connector::new(config.sink.describe(), RetryPolicy::local());

        let sink = connect(&config, &mut connector).await.unwrap();
        assert_eq!(sink.describe(), "stdout");
    }
}
