//! Base64 / data-URI image payload handling.
//!
//! Clients submit the captured image either as raw base64 or as a
//! `data:image/...;base64,` URI; the server normalizes both to raw bytes.
//! The reverse direction always produces bare base64 — format-prefix
//! metadata is the caller's concern.

use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("empty image payload")]
    Empty,
    #[error("image payload is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// Decode a submitted image payload into raw bytes.
///
/// Accepts raw base64 or a data URI; surrounding whitespace is tolerated.
pub fn decode_image_payload(payload: &str) -> Result<Vec<u8>, PayloadError> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Err(PayloadError::Empty);
    }

    let b64 = match trimmed.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => trimmed,
    };

    let bytes = base64::engine::general_purpose::STANDARD.decode(b64)?;
    if bytes.is_empty() {
        return Err(PayloadError::Empty);
    }
    Ok(bytes)
}

/// Encode raw image bytes as bare base64 (no data-URI prefix).
pub fn encode_image_payload(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_base64_roundtrip() {
        let bytes = vec![1u8, 2, 3, 255, 0, 128];
        let encoded = encode_image_payload(&bytes);
        assert_eq!(decode_image_payload(&encoded).unwrap(), bytes);
    }

    #[test]
    fn test_data_uri_accepted() {
        let bytes = b"jpegdata".to_vec();
        let uri = format!("data:image/jpeg;base64,{}", encode_image_payload(&bytes));
        assert_eq!(decode_image_payload(&uri).unwrap(), bytes);
    }

    #[test]
    fn test_png_data_uri_accepted() {
        let bytes = b"pngdata".to_vec();
        let uri = format!("data:image/png;base64,{}", encode_image_payload(&bytes));
        assert_eq!(decode_image_payload(&uri).unwrap(), bytes);
    }

    #[test]
    fn test_surrounding_whitespace_tolerated() {
        let encoded = format!("  {}\n", encode_image_payload(b"x"));
        assert_eq!(decode_image_payload(&encoded).unwrap(), b"x");
    }

    #[test]
    fn test_empty_payload_rejected() {
        assert!(matches!(decode_image_payload(""), Err(PayloadError::Empty)));
        assert!(matches!(
            decode_image_payload("   "),
            Err(PayloadError::Empty)
        ));
    }

    #[test]
    fn test_malformed_base64_rejected() {
        assert!(matches!(
            decode_image_payload("@@not-base64@@"),
            Err(PayloadError::InvalidBase64(_))
        ));
    }

    #[test]
    fn test_non_data_prefix_treated_as_base64() {
        // ";base64," present but no "data:" prefix — must not be stripped
        assert!(decode_image_payload("bogus;base64,AAAA").is_err());
    }

    #[test]
    fn test_encode_has_no_prefix() {
        let encoded = encode_image_payload(b"abc");
        assert!(!encoded.starts_with("data:"));
    }
}
