//! Error types for struct-log trace reconstruction
//!
//! Two families of errors exist:
//! - [`TraceError`]: structural failures that abort reconstruction of a
//!   transaction (the input is not a struct-log trace at all)
//! - [`DecodeError`]: opcode-level decoding gaps. These are produced by the
//!   decoders and always downgraded at the call site to an "unknown" marker,
//!   so one malformed step never blanks the whole trace.

use thiserror::Error;

/// Top-level error type for trace reconstruction
#[derive(Debug, Error)]
pub enum TraceError {
    /// The document yields no `structLogs` sequence, neither inside a
    /// JSON-RPC `result` envelope nor at the top level
    #[error("Malformed trace input: {0}")]
    MalformedInput(String),
}

impl From<serde_json::Error> for TraceError {
    fn from(err: serde_json::Error) -> Self {
        TraceError::MalformedInput(err.to_string())
    }
}

/// Recoverable decoding failures
///
/// Never returned from the public builder APIs. Decoders use it internally
/// to say *why* something could not be decoded before the caller logs it
/// and falls back to raw hex.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Revert payload does not match any known layout
    #[error("Undecodable revert payload: {0}")]
    UndecodableRevert(String),

    /// Call input does not match any function in the ABI
    ///
    /// # Fields
    /// * `selector` - Leading 4 bytes of the call input
    /// * `reason` - Detailed error message
    #[error("Undecodable call {selector}: {reason}")]
    UndecodableCall {
        selector: String,
        reason: String,
    },

    /// The function is unknown or declares no outputs
    #[error("No outputs declared for function {0}")]
    MissingOutputs(String),
}
