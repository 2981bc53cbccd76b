use serde::{Deserialize, Serialize};

use crate::record::TelemetryRecord;

/// Telemetry message written to local sinks (Unix socket, stdout, Zenoh).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalMessage {
    /// Record fingerprint.
    pub hash: String,

    /// Unix epoch milliseconds when the record was captured.
    pub epoch: i64,

    pub value: i32,
    pub voltage: f32,
    pub current: f32,
}

impl From<&TelemetryRecord> for LocalMessage {
    fn from(record: &TelemetryRecord) -> Self {
        Self {
            hash: record.fingerprint().to_string(),
            epoch: record.epoch_millis(),
            value: record.value(),
            voltage: record.voltage(),
            current: record.current(),
        }
    }
}
