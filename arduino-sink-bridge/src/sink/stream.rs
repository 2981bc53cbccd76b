use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use serial_bridge_common::{Format, LocalMessage, TelemetryRecord, encode_framed};

use super::{Ack, SendError, Sink, SinkConnectError};

/// Writes local messages to a byte stream (Unix socket, stdout).
pub struct StreamSink {
    target: String,
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    format: Format,
}

impl StreamSink {
    pub fn new(
        target: impl Into<String>,
        writer: impl AsyncWrite + Send + Unpin + 'static,
        format: Format,
    ) -> Self {
        Self {
            target: target.into(),
            writer: Box::new(writer),
            format,
        }
    }

    /// Connect to a Unix stream socket at `path`.
    #[cfg(unix)]
    pub async fn connect_unix(path: &str, format: Format) -> Result<Self, SinkConnectError> {
        let stream = tokio::net::UnixStream::connect(path).await?;
        Ok(Self::new(format!("unix://{}", path), stream, format))
    }

    #[cfg(not(unix))]
    pub async fn connect_unix(path: &str, _format: Format) -> Result<Self, SinkConnectError> {
        Err(SinkConnectError::Io(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            format!("Unix sockets are not available on this platform: {}", path),
        )))
    }

    pub fn stdout(format: Format) -> Self {
        Self::new("stdout", tokio::io::stdout(), format)
    }
}

impl Sink for StreamSink {
    fn describe(&self) -> &str {
        &self.target
    }

    async fn send(&mut self, record: &TelemetryRecord) -> Result<Ack, SendError> {
        let message = LocalMessage::from(record);
        let bytes =
            encode_framed(&message, self.format).map_err(|e| SendError::Encode(e.to_string()))?;

        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;

        Ok(Ack::None)
    }

    async fn close(&mut self) {
        if let Err(e) = self.writer.shutdown().await {
            debug!(sink = %self.target, error = %e, "Error while closing stream");
        }
    }
}
