//! Bridge for Arduino serial telemetry.
//!
//! Reads `value|voltage|current` lines from a serial port, fingerprints each
//! record and forwards it to a sink:
//!
//! - a gRPC `Well` service, which echoes the fingerprint back
//! - a Unix stream socket or stdout (newline-delimited JSON, or CBOR)
//! - a Zenoh key expression
//!
//! # Line format
//!
//! ```text
//! 133|0.65|0.43
//! ```
//!
//! Field 0 is an integer reading, fields 1 and 2 are voltage and current.
//! Extra fields are ignored.

pub mod config;
pub mod pipeline;
pub mod serial;
pub mod sink;

/// Generated gRPC types for the `well` package.
pub mod well {
    tonic::include_proto!("well");
}
