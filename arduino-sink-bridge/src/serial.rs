//! Serial source: the Arduino's line-oriented telemetry feed.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_serial::{DataBits, Parity, SerialStream, StopBits};
use tracing::info;

use serial_bridge_framework::{ConnectError, Connector, RetryPolicy};

use crate::config::SerialConfig;

/// Longest line kept; longer lines are dropped as malformed.
pub const DEFAULT_MAX_LINE_LEN: usize = 64 * 1024;

/// The serial device could not be opened.
#[derive(Debug, thiserror::Error)]
pub enum DeviceOpenError {
    #[error("Failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: tokio_serial::Error,
    },

    #[error(transparent)]
    Connect(#[from] ConnectError),
}

/// Open the serial port once (8N1 at the configured bitrate).
pub fn open_serial(config: &SerialConfig) -> Result<SerialStream, DeviceOpenError> {
    let builder = tokio_serial::new(&config.port, config.bitrate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One);

    let stream = SerialStream::open(&builder).map_err(|source| DeviceOpenError::Open {
        port: config.port.clone(),
        source,
    })?;

    info!(port = %config.port, bitrate = config.bitrate, "Opened serial port");
    Ok(stream)
}

/// Open the serial port, retrying under `policy` when `retry_open` is set.
///
/// Without `retry_open` a failure is returned immediately.
pub async fn open_source(
    config: &SerialConfig,
    policy: RetryPolicy,
) -> Result<BufReader<SerialStream>, DeviceOpenError> {
    let stream = if config.retry_open {
        let mut connector = Connector::new(config.port.clone(), policy);
        connector
            .establish(|| async { open_serial(config) })
            .await?
    } else {
        open_serial(config)?
    };

    Ok(BufReader::new(stream))
}

/// One newline-terminated unit read from the serial feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialLine {
    /// Line content without the newline. Invalid UTF-8 is replaced with
    /// U+FFFD, so garbage still reaches the parser and is rejected there.
    Text(String),
    /// The line exceeded the length limit and was discarded.
    Oversized { len: usize },
}

/// Splits a byte stream into lines, keeping at most `max_len` bytes of any
/// one line in memory.
pub struct LineReader<R> {
    reader: R,
    buf: Vec<u8>,
    max_len: usize,
}

impl<R: AsyncBufRead + Unpin> LineReader<R> {
    pub fn new(reader: R, max_len: usize) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            max_len,
        }
    }

    /// Read the next line; `None` at end of stream.
    ///
    /// A trailing line without a newline is still returned.
    pub async fn next_line(&mut self) -> io::Result<Option<SerialLine>> {
        self.buf.clear();
        let mut len = 0usize;
        let mut seen = false;

        loop {
            let (used, done) = {
                let available = self.reader.fill_buf().await?;
                if available.is_empty() {
                    break;
                }
                let (line, used, done) = match available.iter().position(|&b| b == b'\n') {
                    Some(i) => (&available[..i], i + 1, true),
                    None => (available, available.len(), false),
                };

                let room = self.max_len.saturating_sub(self.buf.len());
                self.buf.extend_from_slice(&line[..line.len().min(room)]);
                len += line.len();
                (used, done)
            };

            seen = true;
            self.reader.consume(used);
            if done {
                break;
            }
        }

        if !seen {
            return Ok(None);
        }
        if len > self.max_len {
            return Ok(Some(SerialLine::Oversized { len }));
        }

        Ok(Some(SerialLine::Text(
            String::from_utf8_lossy(&self.buf).into_owned(),
        )))
    }
}
