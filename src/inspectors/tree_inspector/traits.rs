//! Trait implementations for TreeInspector

use crate::inspectors::tree_inspector::TreeInspector;
use crate::traits::{Reset, TraceOutput};
use crate::types::{GenericTraceTree, U256};

impl Reset for TreeInspector {
    /// Clears nodes, depth slots and statistics, keeping the configuration
    fn reset(&mut self) {
        self.nodes = Vec::new();
        self.roots = Vec::new();
        self.depth_slots.clear();
        self.max_depth = 0;
        self.total_steps = 0;
        self.total_gas_cost = U256::ZERO;
        self.op_counts.clear();
    }
}

impl TraceOutput for TreeInspector {
    type Output = GenericTraceTree;

    fn get_output(&self) -> Self::Output {
        GenericTraceTree {
            nodes: self.nodes.clone(),
            roots: self.roots.clone(),
            max_depth: self.max_depth,
            total_steps: self.total_steps,
            total_gas_cost: self.total_gas_cost,
            op_counts: self.op_counts.clone(),
        }
    }
}
