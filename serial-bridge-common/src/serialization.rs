use serde::{Serialize, de::DeserializeOwned};

use crate::error::{Error, Result};

/// Serialization format for messages written to local sinks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Newline-delimited JSON (default).
    #[default]
    Json,

    /// CBOR, self-delimiting binary.
    Cbor,
}

/// Encode a value to bytes using the specified format.
pub fn encode<T: Serialize>(value: &T, format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Json => serde_json::to_vec(value).map_err(Error::from),
        Format::Cbor => {
            let mut buf = Vec::new();
            ciborium::into_writer(value, &mut buf)?;
            Ok(buf)
        }
    }
}

/// Encode a value as one framed unit for a byte stream.
///
/// JSON gets a trailing newline so readers can split on lines; CBOR items
/// are self-delimiting and are written as-is.
pub fn encode_framed<T: Serialize>(value: &T, format: Format) -> Result<Vec<u8>> {
    let mut buf = encode(value, format)?;
    if format == Format::Json {
        buf.push(b'\n');
    }
    Ok(buf)
}

/// Decode bytes to a value using the specified format.
pub fn decode<T: DeserializeOwned>(data: &[u8], format: Format) -> Result<T> {
    match format {
        Format::Json => serde_json::from_slice(data).map_err(Error::from),
        Format::Cbor => ciborium::from_reader(data).map_err(|e| Error::Cbor(e.to_string())),
    }
}
