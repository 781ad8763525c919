//! # Struct-Log Trace Reconstruction
//!
//! A library for rebuilding a readable execution model of an EVM transaction
//! from the flat, per-instruction output of `debug_traceTransaction`.
//!
//! ## Core Features
//!
//! - **Normalization**
//!   - JSON-RPC envelope or bare result documents
//!   - Numeric fields as integers or hex strings
//!
//! - **Call Trace**
//!   - Nested call frames with `trace_address` positions
//!   - Storage reads and writes with original and dirty values
//!   - Error origin detection and root-to-failure stack trace
//!   - ABI decoding of inputs, outputs and custom errors
//!
//! - **Generic Tree**
//!   - Depth-indexed opcode tree with gas deltas
//!   - Opcode statistics
//!   - Deepest-revert failure summary
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use structlog_trace::{analyze_trace, ContractRegistry, TraceConfig, TxContext};
//! use alloy::primitives::address;
//!
//! # fn example(raw: serde_json::Value) -> anyhow::Result<()> {
//! let ctx = TxContext {
//!     from: address!("C255fC198eEdAC7AF8aF0f6e0ca781794B094A61"),
//!     to: Some(address!("d878229c9c3575F224784DE610911B5607a3ad15")),
//!     ..Default::default()
//! };
//! let registry = ContractRegistry::new();
//!
//! let analysis = analyze_trace(&raw, &ctx, Some(&registry), &TraceConfig::default())?;
//!
//! for entry in &analysis.call_trace.stack_trace {
//!     println!("{} {:?} {:?}", entry.contract, entry.name, entry.error);
//! }
//! if let Some(failure) = analysis.failure {
//!     println!("Deepest revert at {}: {:?}", failure.failing_node_id, failure.decoded_reason);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Structure
//!
//! - `raw_trace`: Raw document normalization
//! - `inspectors`: Generic tree and call trace builders
//! - `processor`: Step driver and the one-shot analysis pipeline
//! - `types`: Core data structures and type definitions
//! - `traits`: Trait definitions for extensibility
//! - `config`: Reconstruction options
//! - `errors`: Error types and handling
//! - `utils`: Operand extraction, revert and ABI decoding, formatting

pub mod config;
pub mod errors;
pub mod inspectors;
pub mod processor;
pub mod raw_trace;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export only the essential types and functions
pub use config::TraceConfig;
pub use errors::{DecodeError, TraceError};
pub use inspectors::{CallInspector, TreeInspector};
pub use processor::{analyze_steps, analyze_trace, process_steps, TraceAnalysis};
pub use raw_trace::{parse_raw_trace, parse_raw_trace_str};
pub use traits::{Reset, StepInspector, TraceOutput};
pub use types::{
    CallTrace, CallTraceOutput, ContractRegistry, DecodedError, FailureInfo, GenericTraceTree,
    StructLog, TxContext,
};
