//! Decoding and operand helpers shared by the builders
//!
//! # Modules
//!
//! - [`step_utils`]: Struct-log operand extraction
//!   - Stack items and packed addresses
//!   - Memory ranges for call input, revert and return payloads
//!   - Storage snapshot lookups
//!
//! - [`error_utils`]: Revert payload decoding
//!   - `Error(string)` reasons
//!   - Solidity panic code interpretation
//!   - Custom error selectors
//!
//! - [`abi_utils`]: ABI decoding of call inputs, outputs and custom errors
//!
//! - [`format_utils`]: Stable display formatting of decoded values
//!
//! - [`address_utils`]: Addresses touched by a trace, for metadata lookups

/// Struct-log operand extraction
pub mod step_utils;

/// Error parsing utilities
pub mod error_utils;

/// ABI decoding utilities
pub mod abi_utils;

/// Display formatting utilities
pub mod format_utils;

/// Address collection utilities
pub mod address_utils;
