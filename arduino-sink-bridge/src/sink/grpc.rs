use std::time::Duration;

use tonic::transport::{Channel, Endpoint};
use tracing::debug;

use serial_bridge_common::TelemetryRecord;

use super::{Ack, SendError, Sink, SinkConnectError};
use crate::well::WellTelemetryRequest;
use crate::well::well_client::WellClient;

/// Client of the `Well.SendTelemetry` RPC.
pub struct GrpcSink {
    target: String,
    client: WellClient<Channel>,
}

impl GrpcSink {
    /// Connect to `address` (`host:port`, or a full `http://` URI).
    pub async fn connect(address: &str, timeout: Duration) -> Result<Self, SinkConnectError> {
        let uri = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        };

        let endpoint = Endpoint::from_shared(uri.clone())
            .map_err(|e| SinkConnectError::InvalidAddress {
                address: address.to_string(),
                message: e.to_string(),
            })?
            .connect_timeout(timeout);

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| SinkConnectError::Transport(e.to_string()))?;

        Ok(Self {
            target: uri,
            client: WellClient::new(channel),
        })
    }
}

impl Sink for GrpcSink {
    fn describe(&self) -> &str {
        &self.target
    }

    async fn send(&mut self, record: &TelemetryRecord) -> Result<Ack, SendError> {
        let request = WellTelemetryRequest {
            hash: record.fingerprint().to_string(),
            timestamp: record.timestamp_text().to_string(),
            value: record.value(),
            voltage: record.voltage(),
            current: record.current(),
        };

        let response = self
            .client
            .send_telemetry(request)
            .await
            .map_err(|status| SendError::Rpc(format!("{}: {}", status.code(), status.message())))?;

        Ok(Ack::Echoed(response.into_inner().hash))
    }

    async fn close(&mut self) {
        debug!(sink = %self.target, "Closing gRPC channel");
    }
}
