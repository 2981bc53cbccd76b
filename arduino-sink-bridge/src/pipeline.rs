//! Forwarding pipeline: serial line → record → sink → acknowledgement check.
//!
//! One record is in flight at a time. Lines are processed strictly in the
//! order they arrive, and the next line is read only after the previous
//! record was delivered (or dropped).

use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncBufRead;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use serial_bridge_common::{DEFAULT_DELIMITER, ParseError, TelemetryRecord};

use crate::config::{ArduinoBridgeConfig, StreamEndPolicy};
use crate::serial::{DEFAULT_MAX_LINE_LEN, LineReader, SerialLine};
use crate::sink::{Ack, SendError, Sink};

/// Settings for a [`Forwarder`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub delimiter: String,
    /// Deadline for one send, acknowledgement included
    pub send_timeout: Duration,
    /// Longest serial line kept, in bytes
    pub max_line_len: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            send_timeout: Duration::from_secs(10),
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }
}

impl From<&ArduinoBridgeConfig> for PipelineOptions {
    fn from(config: &ArduinoBridgeConfig) -> Self {
        Self {
            delimiter: config.serial.delimiter.clone(),
            send_timeout: config.pipeline.send_timeout(),
            max_line_len: config.serial.max_line_len,
        }
    }
}

/// Outcome of a delivered record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The sink echoed the record's fingerprint.
    Confirmed,
    /// The sink answered with a different (or empty) fingerprint.
    Unconfirmed { expected: String, received: String },
    /// The sink has no acknowledgement channel.
    Unacknowledged,
}

/// A line that could not be forwarded. The record is dropped.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Send(#[from] SendError),
}

/// Counters kept by a [`Forwarder`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardStats {
    pub lines: u64,
    pub parse_failures: u64,
    pub oversized: u64,
    pub sent: u64,
    pub confirmed: u64,
    pub unconfirmed: u64,
    pub unacknowledged: u64,
    pub send_failures: u64,
}

/// Why [`Forwarder::run`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineExit {
    /// The shutdown signal was raised.
    Shutdown,
    /// The serial stream reached end of file.
    StreamEnded,
    /// Reading from the serial stream failed.
    StreamFailed(String),
}

/// The serial stream stopped and the bridge is configured to exit.
#[derive(Debug, Error)]
#[error("Serial stream stopped: {reason}")]
pub struct StreamStopped {
    pub reason: String,
}

impl PipelineExit {
    /// Decide whether this exit should stop the bridge.
    pub fn settle(self, policy: StreamEndPolicy) -> Result<(), StreamStopped> {
        let reason = match self {
            PipelineExit::Shutdown => return Ok(()),
            PipelineExit::StreamEnded => "end of stream".to_string(),
            PipelineExit::StreamFailed(e) => e,
        };

        match policy {
            StreamEndPolicy::Stop => {
                warn!(reason = %reason, "Serial stream stopped, waiting for shutdown");
                Ok(())
            }
            StreamEndPolicy::Exit => Err(StreamStopped { reason }),
        }
    }
}

/// Forwards serial lines to a [`Sink`].
pub struct Forwarder<S> {
    sink: S,
    options: PipelineOptions,
    stats: ForwardStats,
}

impl<S: Sink> Forwarder<S> {
    pub fn new(sink: S, options: PipelineOptions) -> Self {
        Self {
            sink,
            options,
            stats: ForwardStats::default(),
        }
    }

    pub fn stats(&self) -> ForwardStats {
        self.stats
    }

    /// Parse, send and verify one line.
    pub async fn forward_line(&mut self, line: &str) -> Result<Delivery, ForwardError> {
        let line = line.trim_end_matches(['\r', '\n']);
        self.stats.lines += 1;

        let record = match TelemetryRecord::parse(line, &self.options.delimiter) {
            Ok(record) => record,
            Err(e) => {
                self.stats.parse_failures += 1;
                warn!(line = %line, error = %e, "Dropping malformed line");
                return Err(e.into());
            }
        };

        let sent = tokio::time::timeout(self.options.send_timeout, self.sink.send(&record)).await;
        let ack = match sent {
            Ok(Ok(ack)) => ack,
            Ok(Err(e)) => return Err(self.send_failed(&record, e)),
            Err(_) => {
                let e = SendError::TimedOut(self.options.send_timeout);
                return Err(self.send_failed(&record, e));
            }
        };
        self.stats.sent += 1;

        let delivery = match ack {
            Ack::Echoed(received) if received == record.fingerprint() => {
                self.stats.confirmed += 1;
                debug!(hash = %received, value = record.value(), "Record confirmed");
                Delivery::Confirmed
            }
            Ack::Echoed(received) => {
                self.stats.unconfirmed += 1;
                warn!(
                    expected = %record.fingerprint(),
                    received = %received,
                    "Sink echoed a different hash"
                );
                Delivery::Unconfirmed {
                    expected: record.fingerprint().to_string(),
                    received,
                }
            }
            Ack::None => {
                self.stats.unacknowledged += 1;
                debug!(hash = %record.fingerprint(), value = record.value(), "Record written");
                Delivery::Unacknowledged
            }
        };

        Ok(delivery)
    }

    fn drop_oversized(&mut self, len: usize) {
        self.stats.lines += 1;
        self.stats.oversized += 1;
        warn!(
            len,
            limit = self.options.max_line_len,
            "Dropping line longer than the limit"
        );
    }

    fn send_failed(&mut self, record: &TelemetryRecord, error: SendError) -> ForwardError {
        self.stats.send_failures += 1;
        warn!(
            sink = %self.sink.describe(),
            hash = %record.fingerprint(),
            error = %error,
            "Dropping record, send failed"
        );
        error.into()
    }

    /// Forward every line from `reader` until the stream ends or `shutdown`
    /// turns true.
    ///
    /// The reader is dropped and the sink closed exactly once before
    /// returning. A record still in flight when shutdown starts is abandoned.
    pub async fn run<R>(mut self, reader: R, mut shutdown: watch::Receiver<bool>) -> PipelineExit
    where
        R: AsyncBufRead + Unpin + Send,
    {
        info!(sink = %self.sink.describe(), "Forwarding telemetry");

        let mut lines = LineReader::new(reader, self.options.max_line_len);

        let exit = loop {
            if *shutdown.borrow_and_update() {
                break PipelineExit::Shutdown;
            }

            tokio::select! {
                biased;

                _ = shutdown.changed() => break PipelineExit::Shutdown,

                line = lines.next_line() => match line {
                    Ok(Some(SerialLine::Oversized { len })) => self.drop_oversized(len),
                    Ok(Some(SerialLine::Text(line))) => {
                        tokio::select! {
                            biased;

                            _ = shutdown.changed() => break PipelineExit::Shutdown,
                            _ = self.forward_line(&line) => {}
                        }
                    }
                    Ok(None) => break PipelineExit::StreamEnded,
                    Err(e) => break PipelineExit::StreamFailed(e.to_string()),
                },
            }
        };

        drop(lines);
        self.sink.close().await;

        let stats = self.stats;
        info!(
            exit = ?exit,
            lines = stats.lines,
            sent = stats.sent,
            confirmed = stats.confirmed,
            unconfirmed = stats.unconfirmed,
            unacknowledged = stats.unacknowledged,
            parse_failures = stats.parse_failures,
            oversized = stats.oversized,
            send_failures = stats.send_failures,
            "Pipeline stopped"
        );

        exit
    }
}
