use zenoh::Session;

use serial_bridge_common::{Format, LocalMessage, TelemetryRecord, ZenohConfig, encode};

use super::{Ack, SendError, Sink, SinkConnectError};

/// Publishes local messages on a Zenoh key expression.
pub struct ZenohSink {
    key_expr: String,
    session: Session,
    format: Format,
}

impl ZenohSink {
    pub async fn connect(
        key_expr: &str,
        config: &ZenohConfig,
        format: Format,
    ) -> Result<Self, SinkConnectError> {
        let session = serial_bridge_common::connect(config)
            .await
            .map_err(|e| SinkConnectError::Zenoh(e.to_string()))?;

        Ok(Self::with_session(key_expr, session, format))
    }

    /// Use an already opened session.
    pub fn with_session(key_expr: impl Into<String>, session: Session, format: Format) -> Self {
        Self {
            key_expr: key_expr.into(),
            session,
            format,
        }
    }
}

impl Sink for ZenohSink {
    fn describe(&self) -> &str {
        &self.key_expr
    }

    async fn send(&mut self, record: &TelemetryRecord) -> Result<Ack, SendError> {
        let message = LocalMessage::from(record);
        let payload = encode(&message, self.format).map_err(|e| SendError::Encode(e.to_string()))?;

        self.session
            .put(&self.key_expr, payload)
            .await
            .map_err(|e| SendError::Zenoh(e.to_string()))?;

        Ok(Ack::None)
    }

    async fn close(&mut self) {
        if let Err(e) = self.session.close().await {
            tracing::warn!(key_expr = %self.key_expr, error = %e, "Failed to close Zenoh session");
        }
    }
}
