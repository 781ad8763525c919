//! Nested call trace reconstruction
//!
//! `CallInspector` rebuilds the message-call hierarchy of a transaction
//! from its struct logs with an explicit frame stack.
//!
//! # Architecture
//!
//! The implementation is split across several modules:
//! - `inspector`: the `StepInspector` hook (frames, storage leaves, reverts)
//! - `trace`: frame closing, failure tracking and stack trace construction
//! - `traits`: `Reset` and `TraceOutput` implementations
//!
//! # Features
//!
//! - Call hierarchy with `trace_address` positions
//! - Storage reads and writes per frame, with original and dirty values
//! - Revert payload decoding and failure origin tracking
//! - ABI decoding of inputs and return values when a registry is supplied

use std::collections::HashMap;

use crate::config::TraceConfig;
use crate::types::*;

mod inspector;
mod trace;
mod traits;

/// A frame that has been entered and not yet left
#[derive(Debug, Clone)]
struct OpenFrame {
    trace: CallTrace,
    /// Depth of the steps executing inside this frame
    depth: u64,
    /// Gas at the first step inside the frame
    gas_start: U256,
    /// Gas at the most recent step executed by this frame itself
    last_gas: U256,
    /// Selector of the decoded function, used to decode the return data
    selector: Option<Selector>,
}

/// Call trace builder
///
/// Holds all state for one transaction. The context and the optional
/// registry are borrowed for the lifetime of the inspector.
///
/// # State Management
///
/// - Frames: stack of open frames, root first
/// - Storage: per-address slot map of the last known value
/// - Failing: trace address of the frame where the failure originated, and
///   whether a caller kept running after it
#[derive(Debug, Clone)]
pub struct CallInspector<'a> {
    ctx: &'a TxContext,
    registry: Option<&'a ContractRegistry>,
    config: TraceConfig,
    frames: Vec<OpenFrame>,
    storage_before: HashMap<Address, HashMap<String, String>>,
    failing: Option<Vec<usize>>,
    /// Set once a caller of the failing frame writes state or calls again
    failure_handled: bool,
    /// Root frame once every frame has been closed
    completed: Option<CallTrace>,
}

impl<'a> CallInspector<'a> {
    /// Creates an inspector for the transaction described by `ctx`
    pub fn new(ctx: &'a TxContext) -> Self {
        Self {
            ctx,
            registry: None,
            config: TraceConfig::default(),
            frames: Vec::new(),
            storage_before: HashMap::new(),
            failing: None,
            failure_handled: false,
            completed: None,
        }
    }

    /// Attaches per-address ABIs and contract names
    pub fn with_registry(mut self, registry: &'a ContractRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_config(mut self, config: TraceConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the completed call tree, `None` before `finish`
    pub fn get_trace(&self) -> Option<&CallTrace> {
        self.completed.as_ref()
    }

    fn abi(&self, address: &Address) -> Option<&'a JsonAbi> {
        self.registry.and_then(|registry| registry.abi(address))
    }

    fn contract_name(&self, address: &Address) -> Option<String> {
        self.registry
            .and_then(|registry| registry.name(address))
            .map(str::to_string)
    }
}
