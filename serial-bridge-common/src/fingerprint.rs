//! Content and time derived record identifiers.
//!
//! A fingerprint is the SHA-1 digest of `<timestamp>|<raw line>`, encoded
//! with the URL-safe base64 alphabet. Sinks echo it back as proof of receipt.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use sha1::{Digest, Sha1};

/// Separator placed between the timestamp text and the raw line.
pub const FINGERPRINT_SEPARATOR: &str = "|";

/// Length of an encoded fingerprint (20 digest bytes, padded base64).
pub const FINGERPRINT_LEN: usize = 28;

/// Compute the fingerprint of a raw line captured at `timestamp_text`.
pub fn fingerprint(timestamp_text: &str, raw_line: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(timestamp_text.as_bytes());
    hasher.update(FINGERPRINT_SEPARATOR.as_bytes());
    hasher.update(raw_line.as_bytes());
    URL_SAFE.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        // sha1("a|b") contains bytes that map to '_' in the URL-safe alphabet
        assert_eq!(fingerprint("a", "b"), "mr5t4kqHE2S_QSocMBaYte0w27c=");
    }

    #[test]
    fn test_deterministic() {
        let t = "2024-01-02T03:04:05.000000006Z";
        assert_eq!(
            fingerprint(t, "133|0.65|0.43"),
            fingerprint(t, "133|0.65|0.43")
        );
    }

    #[test]
    fn test_distinct_inputs() {
        let t = "2024-01-02T03:04:05Z";
        assert_ne!(fingerprint(t, "1|2|3"), fingerprint(t, "1|2|4"));
        assert_ne!(fingerprint(t, "1|2|3"), fingerprint("2024-01-02T03:04:06Z", "1|2|3"));
    }

    #[test]
    fn test_url_safe_alphabet() {
        for i in 0..64 {
            let fp = fingerprint(&i.to_string(), "line");
            assert_eq!(fp.len(), FINGERPRINT_LEN);
            assert!(!fp.contains('+'));
            assert!(!fp.contains('/'));
        }
    }
}
