//! Revert payload decoding
//!
//! Classifies the bytes returned by a REVERT instruction by their selector:
//! - `Error(string)` - standard revert with message (selector: 0x08c379a0)
//! - `Panic(uint256)` - Solidity panic with error code (selector: 0x4e487b71)
//! - Anything else - custom error, identified by selector only
//!
//! Decoding is best effort and never fails: a truncated or malformed payload
//! degrades to an empty reason or [`DecodedError::Unknown`] so the rest of
//! the trace can still be reconstructed.

use alloy::primitives::{hex, keccak256, Selector, U256};
use once_cell::sync::Lazy;
use tracing::debug;

use crate::errors::DecodeError;
use crate::types::DecodedError;

/// keccak256("Error(string)")[..4]
pub static ERROR_STRING_SELECTOR: Lazy<Selector> = Lazy::new(|| selector_of("Error(string)"));

/// keccak256("Panic(uint256)")[..4]
pub static PANIC_SELECTOR: Lazy<Selector> = Lazy::new(|| selector_of("Panic(uint256)"));

const WORD: usize = 32;

fn selector_of(signature: &str) -> Selector {
    Selector::from_slice(&keccak256(signature.as_bytes())[..4])
}

/// Decodes a revert payload
///
/// # Arguments
/// * `data` - Raw bytes returned by REVERT
///
/// # Returns
/// * `None` - Empty payload, nothing to decode
/// * `Some(DecodedError)` - Classified payload
pub fn decode_revert_data(data: &[u8]) -> Option<DecodedError> {
    if data.is_empty() {
        return None;
    }
    if data.len() < 4 {
        return Some(DecodedError::Unknown);
    }

    let selector = Selector::from_slice(&data[..4]);
    let body = &data[4..];

    if selector == *ERROR_STRING_SELECTOR {
        return Some(DecodedError::Revert {
            reason: decode_error_string(body),
        });
    }

    if selector == *PANIC_SELECTOR {
        return Some(match body.get(..WORD) {
            Some(word) => DecodedError::Panic {
                code: U256::from_be_slice(word),
            },
            None => {
                debug!(
                    "{}",
                    DecodeError::UndecodableRevert(format!("truncated Panic(uint256), {} bytes", body.len()))
                );
                DecodedError::Unknown
            }
        });
    }

    Some(DecodedError::CustomError {
        selector,
        name: None,
    })
}

/// Decodes a revert payload given as hex
///
/// `None`, `""` and `"0x"` mean "no error". Invalid hex degrades to
/// [`DecodedError::Unknown`].
pub fn decode_revert_hex(data: Option<&str>) -> Option<DecodedError> {
    let data = data?;
    let digits = data.strip_prefix("0x").unwrap_or(data);
    if digits.is_empty() {
        return None;
    }
    match hex::decode(digits) {
        Ok(bytes) => decode_revert_data(&bytes),
        Err(err) => {
            debug!("{}", DecodeError::UndecodableRevert(err.to_string()));
            Some(DecodedError::Unknown)
        }
    }
}

/// Reads `offset | length | bytes` and decodes the bytes as UTF-8
///
/// The offset word is skipped rather than followed. A missing length word
/// yields an empty string; a length past the end is clipped.
fn decode_error_string(body: &[u8]) -> String {
    let Some(length_word) = body.get(WORD..2 * WORD) else {
        debug!(len = body.len(), "truncated Error(string) payload");
        return String::new();
    };
    let length = usize::try_from(U256::from_be_slice(length_word)).unwrap_or(usize::MAX);
    let text = &body[2 * WORD..];
    let text = &text[..length.min(text.len())];
    String::from_utf8_lossy(text).into_owned()
}

/// Describes a Solidity panic code
pub fn panic_reason(code: U256) -> String {
    let Ok(code) = u64::try_from(code) else {
        return format!("Unknown error code (0x{code:x})");
    };
    match code {
        0x00 => "Generic compiler panic".to_string(),
        0x01 => "Assertion failed".to_string(),
        0x11 => "Arithmetic overflow".to_string(),
        0x12 => "Division by zero".to_string(),
        0x21 => "Invalid enum value".to_string(),
        0x22 => "Invalid storage byte array access".to_string(),
        0x31 => "Pop on empty array".to_string(),
        0x32 => "Array access out of bounds".to_string(),
        0x41 => "Out of memory".to_string(),
        0x51 => "Invalid internal function call".to_string(),
        code => format!("Unknown error code (0x{code:x})"),
    }
}
