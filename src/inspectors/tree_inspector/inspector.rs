//! `StepInspector` implementation for `TreeInspector`
//!
//! Every step updates the statistics and its depth slot. Interesting
//! steps (or every step with `include_internal_ops`) become nodes with
//! opcode-specific fields:
//! - SLOAD: slot from the top of the stack, value from the storage snapshot
//! - SSTORE: slot and new value from the top two stack items
//! - CALL family: caller, target, value and input sliced from memory
//! - RETURN: payload sliced from memory
//! - REVERT: payload sliced from memory and decoded

use tracing::trace;

use crate::inspectors::tree_inspector::{DepthSlot, TreeInspector};
use crate::traits::{Step, StepInspector};
use crate::types::*;
use crate::utils::error_utils::decode_revert_data;
use crate::utils::step_utils::{return_data, stack_item, storage_value, CallOperands};

impl StepInspector for TreeInspector {
    fn step(&mut self, step: &Step<'_>) {
        let log = step.log;
        let kind = OpKind::from_op(&log.op);

        let gas_before = step.gas_before();
        let gas_after = log.gas;
        let gas_cost = gas_before.saturating_sub(gas_after);

        self.total_steps += 1;
        self.max_depth = self.max_depth.max(log.depth);
        *self.op_counts.entry(log.op.clone()).or_insert(0) += 1;

        let parent = log
            .depth
            .checked_sub(1)
            .and_then(|above| self.depth_slots.get(&above))
            .and_then(|slot| slot.retained);

        if !self.include_internal_ops && !kind.is_interesting() {
            self.depth_slots
                .insert(log.depth, DepthSlot { retained: parent });
            return;
        }

        let index = self.nodes.len();
        let mut node = GenericTraceNode {
            id: format!("{}-{}-{}", step.index, log.depth, log.op),
            node_type: kind,
            op: log.op.clone(),
            depth: log.depth,
            step_index: step.index,
            pc: log.pc,
            gas_before,
            gas_after,
            gas_cost,
            parent_id: parent.and_then(|p| self.nodes.get(p)).map(|p| p.id.clone()),
            children: Vec::new(),
            error: log.error.clone(),
            from: None,
            to: None,
            value: None,
            input: None,
            output: None,
            storage_slot: None,
            storage_value: None,
            revert_data: None,
            decoded_error: None,
        };
        enrich(&mut node, kind, log);
        if kind.is_call() {
            node.from = parent
                .and_then(|p| self.nodes.get(p))
                .filter(|p| p.node_type.is_call())
                .and_then(|p| p.to);
        }

        trace!(id = %node.id, parent = ?node.parent_id, "tree node");

        match parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(parent) => parent.children.push(index),
            None => self.roots.push(index),
        }
        self.nodes.push(node);
        self.depth_slots.insert(
            log.depth,
            DepthSlot {
                retained: Some(index),
            },
        );
        self.total_gas_cost = self.total_gas_cost.saturating_add(gas_cost);
    }
}

/// Fills the opcode-specific fields of a node
fn enrich(node: &mut GenericTraceNode, kind: OpKind, log: &StructLog) {
    match kind {
        OpKind::SLoad => {
            let slot = stack_item(&log.stack, 0);
            node.storage_slot = Some(format!("0x{slot:x}"));
            node.storage_value = storage_value(log.storage.as_ref(), slot);
        }
        OpKind::SStore => {
            let slot = stack_item(&log.stack, 0);
            let value = stack_item(&log.stack, 1);
            node.storage_slot = Some(format!("0x{slot:x}"));
            node.storage_value = Some(format!("0x{value:x}"));
        }
        OpKind::Call | OpKind::CallCode | OpKind::DelegateCall | OpKind::StaticCall => {
            if let Some(operands) = CallOperands::from_stack(kind, &log.stack) {
                node.input = operands.input(log);
                node.to = operands.to;
                if matches!(kind, OpKind::Call | OpKind::CallCode) {
                    node.value = Some(operands.value);
                }
            }
        }
        OpKind::Return => {
            node.output = return_data(log).filter(|data| !data.is_empty());
        }
        OpKind::Revert => {
            if let Some(data) = return_data(log).filter(|data| !data.is_empty()) {
                node.decoded_error = decode_revert_data(&data);
                node.revert_data = Some(data);
            }
        }
        _ => {}
    }
}
