//! Depth-indexed generic trace tree
//!
//! `TreeInspector` turns a flat struct-log sequence into an opcode tree in
//! one forward pass. Parent linkage follows the most recent node seen one
//! depth above, not a true call stack: a node's parent is whichever node
//! occupied `depth - 1` when it was seen.
//!
//! # Architecture
//!
//! - `inspector`: the `StepInspector` hook that builds nodes
//! - `failure`: locates the deepest revert and its root path
//! - `traits`: `Reset` and `TraceOutput` implementations
//!
//! Uninteresting opcodes (arithmetic, stack shuffling, JUMPDEST...) are
//! dropped unless `include_internal_ops` is set. A dropped step still
//! occupies its depth slot, so anything seen one level below it attaches
//! to the dropped step's nearest retained ancestor.

use std::collections::{BTreeMap, HashMap};

use crate::config::TraceConfig;
use crate::types::*;

mod failure;
mod inspector;
mod traits;

pub use failure::find_failure;

/// Occupant of one depth level
///
/// `retained` is the arena index of the node itself when it was kept, or
/// of its nearest kept ancestor when it was dropped.
#[derive(Debug, Clone, Copy)]
struct DepthSlot {
    retained: Option<NodeId>,
}

/// Generic tree builder
///
/// Feed it with [`process_steps`](crate::processor::process_steps), then
/// read the result with [`TraceOutput::get_output`](crate::traits::TraceOutput).
#[derive(Debug, Clone, Default)]
pub struct TreeInspector {
    /// Keep every opcode instead of only the interesting ones
    include_internal_ops: bool,
    /// Retained nodes in step order
    nodes: Vec<GenericTraceNode>,
    /// Retained nodes without a parent
    roots: Vec<NodeId>,
    /// Most recent occupant of each depth
    depth_slots: HashMap<u64, DepthSlot>,
    max_depth: u64,
    total_steps: usize,
    total_gas_cost: U256,
    op_counts: BTreeMap<String, u64>,
}

impl TreeInspector {
    /// Creates a builder that drops uninteresting opcodes
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates a builder configured from `config`
    pub fn with_config(config: &TraceConfig) -> Self {
        Self {
            include_internal_ops: config.include_internal_ops,
            ..Default::default()
        }
    }

    /// Toggles retention of uninteresting opcodes
    pub fn include_internal_ops(mut self, include: bool) -> Self {
        self.include_internal_ops = include;
        self
    }

    /// Retained nodes collected so far
    pub fn nodes(&self) -> &[GenericTraceNode] {
        &self.nodes
    }

    /// Deepest revert among the nodes collected so far
    pub fn failure(&self) -> Option<FailureInfo> {
        find_failure(&self.nodes, &self.roots)
    }
}

impl GenericTraceTree {
    /// Deepest revert in this tree
    ///
    /// # Returns
    /// * `Some(FailureInfo)` - Failing node, its root path and decoded payload
    /// * `None` - No REVERT node was retained
    pub fn find_failure(&self) -> Option<FailureInfo> {
        find_failure(&self.nodes, &self.roots)
    }
}
