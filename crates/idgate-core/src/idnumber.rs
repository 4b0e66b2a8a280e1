//! Strict national-ID number (PIN) format validation.
//!
//! The accepted format is exactly `GHA-########-#`: the literal uppercase
//! prefix `GHA`, a hyphen, eight digits, a hyphen, one digit. Anything else
//! — wrong digit counts, lowercase, missing hyphens, surrounding whitespace
//! — is rejected. Earlier builds accepted any sufficiently long string; the
//! strict pattern is the only one honored now.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid ID number: expected format GHA-########-#")]
pub struct PinFormatError;

/// Validate a PIN against the strict format.
pub fn validate_pin(pin: &str) -> Result<(), PinFormatError> {
    let bytes = pin.as_bytes();
    // "GHA" + "-" + 8 digits + "-" + 1 digit
    if bytes.len() != 14 {
        return Err(PinFormatError);
    }
    if &bytes[0..3] != b"GHA" {
        return Err(PinFormatError);
    }
    if bytes[3] != b'-' || bytes[12] != b'-' {
        return Err(PinFormatError);
    }
    if !bytes[4..12].iter().all(u8::is_ascii_digit) {
        return Err(PinFormatError);
    }
    if !bytes[13].is_ascii_digit() {
        return Err(PinFormatError);
    }
    Ok(())
}

pub fn is_valid_pin(pin: &str) -> bool {
    validate_pin(pin).is_ok()
}
