//! Reconstruction configuration
//!
//! Provides the knobs shared by the builders:
//! - Opcode retention in the generic tree
//! - Return value decoding in the call trace
//! - Best-effort input decoding for calls without a matching ABI
//!
//! The configuration deserializes from any serde format, with every field
//! optional, so callers can embed it in their own settings file.

use serde::{Deserialize, Serialize};

/// Options for one reconstruction run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TraceConfig {
    /// Keep non-interesting opcodes (ADD, DUP, PUSH...) as `INTERNAL` nodes
    /// in the generic tree
    pub include_internal_ops: bool,
    /// Decode RETURN payloads against the ABI of the returning frame
    pub decode_return_values: bool,
    /// Without a matching ABI, expose the first word after the selector as
    /// a single `uint256` argument
    pub fallback_input_decoding: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            include_internal_ops: false,
            decode_return_values: true,
            fallback_input_decoding: true,
        }
    }
}

impl TraceConfig {
    /// Creates a configuration with default settings
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets whether non-interesting opcodes are kept in the generic tree
    ///
    /// # Returns
    /// * `Self` - Returns self for method chaining
    pub fn with_internal_ops(mut self, include: bool) -> Self {
        self.include_internal_ops = include;
        self
    }

    /// Sets whether RETURN payloads are decoded against the ABI
    pub fn with_return_decoding(mut self, decode: bool) -> Self {
        self.decode_return_values = decode;
        self
    }

    /// Sets whether calls without an ABI match get the single-word fallback
    pub fn with_fallback_decoding(mut self, fallback: bool) -> Self {
        self.fallback_input_decoding = fallback;
        self
    }
}
