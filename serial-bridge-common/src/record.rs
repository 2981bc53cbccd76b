use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use thiserror::Error;

use crate::fingerprint::fingerprint;

/// Delimiter used by the microcontroller firmware (`133|0.65|0.43`).
pub const DEFAULT_DELIMITER: &str = "|";

/// Number of leading fields a record line must carry.
pub const REQUIRED_FIELDS: usize = 3;

/// The numeric fields of a telemetry line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Value,
    Voltage,
    Current,
}

impl Field {
    /// Get the field name used in logs and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Value => "value",
            Field::Voltage => "voltage",
            Field::Current => "current",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reasons a raw serial line cannot become a [`TelemetryRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Minimum match not found: expected {REQUIRED_FIELDS} fields, found {found}")]
    MissingFields { found: usize },

    #[error("Couldn't parse {field} from {input:?}: {reason}")]
    InvalidField {
        field: Field,
        input: String,
        reason: String,
    },
}

impl ParseError {
    /// The field that failed to convert, if any.
    pub fn field(&self) -> Option<Field> {
        match self {
            ParseError::MissingFields { .. } => None,
            ParseError::InvalidField { field, .. } => Some(*field),
        }
    }
}

/// One parsed telemetry observation.
///
/// Records are immutable once built: the fingerprint is computed from the
/// capture timestamp and the raw line at construction time and never changes.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    value: i32,
    voltage: f32,
    current: f32,
    timestamp: DateTime<Utc>,
    timestamp_text: String,
    fingerprint: String,
    raw: String,
}

impl TelemetryRecord {
    /// Parse a raw line, stamping it with the current UTC time.
    pub fn parse(line: &str, delimiter: &str) -> Result<Self, ParseError> {
        Self::parse_at(line, delimiter, Utc::now())
    }

    /// Parse a raw line captured at `timestamp`.
    ///
    /// Fields beyond the third are ignored.
    pub fn parse_at(
        line: &str,
        delimiter: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, ParseError> {
        let fields: Vec<&str> = line.split(delimiter).collect();
        if fields.len() < REQUIRED_FIELDS {
            return Err(ParseError::MissingFields {
                found: fields.len(),
            });
        }

        let value = parse_field::<i32>(fields[0], Field::Value)?;
        let voltage = parse_field::<f32>(fields[1], Field::Voltage)?;
        let current = parse_field::<f32>(fields[2], Field::Current)?;

        let timestamp_text = canonical_timestamp(&timestamp);
        let fingerprint = fingerprint(&timestamp_text, line);

        Ok(Self {
            value,
            voltage,
            current,
            timestamp,
            timestamp_text,
            fingerprint,
            raw: line.to_string(),
        })
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    pub fn voltage(&self) -> f32 {
        self.voltage
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    /// Capture time of the record.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Canonical text rendering of the capture time, as hashed and transmitted.
    pub fn timestamp_text(&self) -> &str {
        &self.timestamp_text
    }

    /// Unix epoch milliseconds of the capture time.
    pub fn epoch_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// The line exactly as received from the serial port.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Render a timestamp as RFC 3339 with nanosecond precision and a `Z` suffix.
pub fn canonical_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_field<T>(input: &str, field: Field) -> Result<T, ParseError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    input.parse::<T>().map_err(|e| ParseError::InvalidField {
        field,
        input: input.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap() + chrono::Duration::nanoseconds(6)
    }

    #[test]
    fn test_parse_well_formed_line() {
        let record = TelemetryRecord::parse("133|0.65|0.43", "|").unwrap();

        assert_eq!(record.value(), 133);
        assert!((record.voltage() - 0.65).abs() < f32::EPSILON);
        assert!((record.current() - 0.43).abs() < f32::EPSILON);
        assert_eq!(record.raw(), "133|0.65|0.43");
    }

    #[test]
    fn test_parse_ignores_extra_fields() {
        let record = TelemetryRecord::parse("7|1.5|2.5|extra|fields", "|").unwrap();
        assert_eq!(record.value(), 7);
        assert_eq!(record.voltage(), 1.5);
        assert_eq!(record.current(), 2.5);
    }

    #[test]
    fn test_parse_negative_and_custom_delimiter() {
        let record = TelemetryRecord::parse("-12;3.25;-0.5", ";").unwrap();
        assert_eq!(record.value(), -12);
        assert_eq!(record.voltage(), 3.25);
        assert_eq!(record.current(), -0.5);
    }

    #[test]
    fn test_parse_too_few_fields() {
        assert_eq!(
            TelemetryRecord::parse("133|0.65", "|"),
            Err(ParseError::MissingFields { found: 2 })
        );
        assert_eq!(
            TelemetryRecord::parse("", "|"),
            Err(ParseError::MissingFields { found: 1 })
        );
    }

    #[test]
    fn test_parse_identifies_bad_field() {
        let err = TelemetryRecord::parse("bad|0.65|0.43", "|").unwrap_err();
        assert_eq!(err.field(), Some(Field::Value));

        let err = TelemetryRecord::parse("133|x|0.43", "|").unwrap_err();
        assert_eq!(err.field(), Some(Field::Voltage));

        let err = TelemetryRecord::parse("133|0.65|", "|").unwrap_err();
        assert_eq!(err.field(), Some(Field::Current));
    }

    #[test]
    fn test_value_must_be_integer() {
        let err = TelemetryRecord::parse("1.5|0.65|0.43", "|").unwrap_err();
        assert_eq!(err.field(), Some(Field::Value));
        assert!(err.to_string().contains("value"));
    }

    #[test]
    fn test_missing_fields_has_no_field() {
        let err = TelemetryRecord::parse("nothing here", "|").unwrap_err();
        assert_eq!(err.field(), None);
    }

    #[test]
    fn test_canonical_timestamp() {
        assert_eq!(
            canonical_timestamp(&fixed_time()),
            "2024-01-02T03:04:05.000000006Z"
        );
    }

    #[test]
    fn test_fingerprint_is_derived_from_time_and_line() {
        let record = TelemetryRecord::parse_at("133|0.65|0.43", "|", fixed_time()).unwrap();

        assert_eq!(record.timestamp_text(), "2024-01-02T03:04:05.000000006Z");
        assert_eq!(record.fingerprint(), "N_MZNIq1wADYK1p1WiKvhWusWXE=");
        assert_eq!(record.epoch_millis(), fixed_time().timestamp_millis());
    }

    #[test]
    fn test_same_line_different_time_differs() {
        let a = TelemetryRecord::parse_at("1|2|3", "|", fixed_time()).unwrap();
        let b = TelemetryRecord::parse_at("1|2|3", "|", fixed_time() + chrono::Duration::seconds(1))
            .unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
