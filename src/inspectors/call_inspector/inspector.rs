//! `StepInspector` implementation for `CallInspector`
//!
//! Only frame boundaries and a handful of opcodes are represented:
//! - CALL, CALLCODE, DELEGATECALL, STATICCALL: open a frame when the next
//!   step runs deeper
//! - SLOAD, SSTORE: storage leaves under the open frame
//! - REVERT: revert leaf plus error details on the open frame
//! - RETURN: output (and decoded return values) of the open frame

use alloy::primitives::{Bytes, U256};
use tracing::{debug, trace};

use crate::inspectors::call_inspector::{CallInspector, OpenFrame};
use crate::traits::{Step, StepInspector};
use crate::types::*;
use crate::utils::abi_utils::{
    decode_function_call, decode_function_output, decode_function_result,
    fallback_decode_input, find_function_by_selector, resolve_custom_error,
};
use crate::utils::error_utils::decode_revert_data;
use crate::utils::step_utils::{pad_hex32, return_data, stack_item, storage_value, CallOperands};

/// Decoded call input: function name, arguments and selector
type InputDecoding = (Option<String>, Option<Vec<DecodedParam>>, Option<Selector>);

impl<'a> StepInspector for CallInspector<'a> {
    /// Opens the root frame for the transaction itself
    fn begin(&mut self, first: Option<&StructLog>) {
        let ctx = self.ctx;
        let to = ctx.to.unwrap_or(ctx.from);
        let (function_name, decoded_input, selector) = self.decode_input(&to, &ctx.input);
        let gas = first.map(|log| log.gas).unwrap_or_default();

        let root = CallTrace {
            hash: Some(ctx.hash),
            contract_name: self.contract_name(&to),
            function_name,
            function_pc: first.map(|log| log.pc),
            function_op: first.map(|log| log.op.clone()),
            absolute_position: 0,
            caller_pc: Some(0),
            caller_op: Some(OpKind::Call.to_string()),
            call_type: OpKind::Call,
            address: to,
            from: ctx.from,
            to,
            block_timestamp: ctx.block_timestamp,
            gas,
            input: (!ctx.input.is_empty()).then(|| ctx.input.clone()),
            decoded_input,
            ..Default::default()
        };

        self.frames.push(OpenFrame {
            trace: root,
            depth: first.map(|log| log.depth).unwrap_or(1),
            gas_start: gas,
            last_gas: gas,
            selector,
        });
    }

    fn step(&mut self, step: &Step<'_>) {
        let log = step.log;
        self.close_returned_frames(log.depth);
        if let Some(frame) = self.frames.last_mut() {
            frame.last_gas = log.gas;
        }

        let kind = OpKind::from_op(&log.op);
        if self.failing.is_some() && continues_execution(kind, step) {
            if let Some(address) = self.frames.last().map(|f| f.trace.trace_address.clone()) {
                self.record_continuation(&address);
            }
        }

        match kind {
            kind if kind.is_call() => {
                if step.enters_frame() {
                    self.open_frame(kind, step);
                }
            }
            OpKind::SLoad => self.record_sload(step),
            OpKind::SStore => self.record_sstore(step),
            OpKind::Revert => self.record_revert(step),
            OpKind::Return => self.record_return(log),
            _ => {}
        }
    }

    /// Closes every frame still open against the last step's gas
    fn finish(&mut self, last: Option<&StructLog>) {
        while let Some(frame) = self.frames.last() {
            let gas = last.map_or(frame.last_gas, |log| log.gas);
            self.close_top(gas);
        }
        self.mark_error_origin();
    }
}

/// Steps with effects a reverting caller would have thrown away
fn continues_execution(kind: OpKind, step: &Step<'_>) -> bool {
    match kind.category() {
        OpCategory::Logging | OpCategory::Creation => true,
        OpCategory::Call => step.enters_frame(),
        _ => kind == OpKind::SStore,
    }
}

impl<'a> CallInspector<'a> {
    /// Pushes a child frame for the call at `step`
    fn open_frame(&mut self, kind: OpKind, step: &Step<'_>) {
        let log = step.log;
        let Some(next) = step.next else {
            return;
        };
        let Some(operands) = CallOperands::from_stack(kind, &log.stack) else {
            return;
        };
        let Some(parent) = self.frames.last() else {
            debug!(step = step.index, "call outside of any frame");
            return;
        };

        let to = operands.to.unwrap_or_default();
        // DELEGATECALL and CALLCODE run the callee's code against the caller's storage
        let address = match kind {
            OpKind::DelegateCall | OpKind::CallCode => parent.trace.address,
            _ => to,
        };
        let from = parent.trace.address;
        let mut trace_address = parent.trace.trace_address.clone();
        trace_address.push(parent.trace.calls.len());

        let input = operands.input(log);
        let (function_name, decoded_input, selector) =
            self.decode_input(&to, input.as_ref().map_or(&[][..], |input| &input[..]));

        trace!(
            step = step.index,
            op = %kind,
            %to,
            trace_address = ?trace_address,
            "opening call frame"
        );

        let trace = CallTrace {
            contract_name: self.contract_name(&to),
            function_name,
            function_pc: Some(next.pc),
            function_op: Some(next.op.clone()),
            absolute_position: step.index + 1,
            caller_pc: Some(log.pc),
            caller_op: Some(log.op.clone()),
            call_type: kind,
            address,
            from,
            to,
            value: (!operands.value.is_zero()).then_some(operands.value),
            gas: next.gas,
            input,
            decoded_input,
            trace_address,
            ..Default::default()
        };

        self.frames.push(OpenFrame {
            trace,
            depth: next.depth,
            gas_start: next.gas,
            last_gas: next.gas,
            selector,
        });
    }

    fn record_sload(&mut self, step: &Step<'_>) {
        let log = step.log;
        let Some(address) = self.frames.last().map(|frame| frame.trace.address) else {
            return;
        };
        let slot = stack_item(&log.stack, 0);
        let slot_key = pad_hex32(slot);

        let known = self.storage_before.entry(address).or_default();
        let original = match storage_value(log.storage.as_ref(), slot) {
            Some(value) => {
                known.insert(slot_key.clone(), value.clone());
                Some(value)
            }
            None => known.get(&slot_key).cloned(),
        };

        let leaf = self.storage_leaf(OpKind::SLoad, step, address, slot_key, original, None);
        self.push_leaf(leaf);
    }

    fn record_sstore(&mut self, step: &Step<'_>) {
        let log = step.log;
        let Some(address) = self.frames.last().map(|frame| frame.trace.address) else {
            return;
        };
        let slot = stack_item(&log.stack, 0);
        let slot_key = pad_hex32(slot);
        let dirty = pad_hex32(stack_item(&log.stack, 1));

        let known = self.storage_before.entry(address).or_default();
        let original = known
            .get(&slot_key)
            .cloned()
            .or_else(|| storage_value(log.storage.as_ref(), slot))
            .unwrap_or_else(|| pad_hex32(U256::ZERO));
        known.insert(slot_key.clone(), dirty.clone());

        let leaf = self.storage_leaf(
            OpKind::SStore,
            step,
            address,
            slot_key,
            Some(original),
            Some(dirty),
        );
        self.push_leaf(leaf);
    }

    fn storage_leaf(
        &self,
        kind: OpKind,
        step: &Step<'_>,
        address: Address,
        slot: String,
        original: Option<String>,
        dirty: Option<String>,
    ) -> CallTrace {
        CallTrace {
            contract_name: self.contract_name(&address),
            absolute_position: step.index,
            call_type: kind,
            address,
            from: address,
            to: address,
            gas: step.log.gas,
            gas_used: step.log.gas_cost,
            storage_address: Some(address),
            storage_slot: Some(slot),
            storage_value_original: original,
            storage_value_dirty: dirty,
            ..Default::default()
        }
    }

    /// Attaches the revert to the open frame and appends a REVERT leaf
    fn record_revert(&mut self, step: &Step<'_>) {
        let log = step.log;
        let Some(code_address) = self.frames.last().map(|frame| frame.trace.to) else {
            return;
        };

        let data = return_data(log).unwrap_or_default();
        let decoded = decode_revert_data(&data).map(|err| self.resolve_error_name(err, &code_address));
        let error = decoded
            .as_ref()
            .and_then(DecodedError::reason)
            .filter(|reason| !reason.is_empty())
            .unwrap_or("Reverted")
            .to_string();
        let error_message = decoded.as_ref().map(DecodedError::message);
        let hex_data = (!data.is_empty()).then_some(data);

        let Some(frame) = self.frames.last_mut() else {
            return;
        };
        frame.trace.error = Some(error.clone());
        frame.trace.error_op = Some(OpKind::Revert.to_string());
        frame.trace.error_absolute_position = Some(step.index);
        frame.trace.error_hex_data = hex_data.clone();
        frame.trace.decoded_error = decoded.clone();
        frame.trace.error_message = error_message.clone();

        let leaf = CallTrace {
            contract_name: frame.trace.contract_name.clone(),
            absolute_position: step.index,
            call_type: OpKind::Revert,
            address: frame.trace.address,
            from: frame.trace.address,
            to: frame.trace.to,
            gas: log.gas,
            gas_used: log.gas_cost,
            output: hex_data.clone(),
            error: Some(error),
            error_op: Some(OpKind::Revert.to_string()),
            error_message,
            error_absolute_position: Some(step.index),
            error_hex_data: hex_data,
            decoded_error: decoded,
            ..Default::default()
        };
        let frame_address = frame.trace.trace_address.clone();

        debug!(
            step = step.index,
            trace_address = ?frame_address,
            error = ?leaf.error,
            "revert"
        );

        self.push_leaf(leaf);
        self.record_failing_frame(frame_address);
    }

    /// Records return data on the open frame
    fn record_return(&mut self, log: &StructLog) {
        let Some(output) = return_data(log).filter(|output| !output.is_empty()) else {
            return;
        };
        let decoded_output = if self.config.decode_return_values {
            self.frames
                .last()
                .and_then(|frame| self.decode_output(frame, &output))
        } else {
            None
        };
        if let Some(frame) = self.frames.last_mut() {
            frame.trace.output = Some(output);
            frame.trace.decoded_output = decoded_output;
        }
    }

    fn push_leaf(&mut self, mut leaf: CallTrace) {
        let Some(frame) = self.frames.last_mut() else {
            return;
        };
        leaf.trace_address = frame.trace.trace_address.clone();
        leaf.trace_address.push(frame.trace.calls.len());
        frame.trace.calls.push(leaf);
    }

    /// Decodes call input with the ABI registered for `to`
    ///
    /// Without a matching ABI entry the first argument word is read as a
    /// single `uint256` when fallback decoding is enabled.
    fn decode_input(&self, to: &Address, input: &[u8]) -> InputDecoding {
        if let Some(call) = self
            .abi(to)
            .and_then(|abi| decode_function_call(input, abi))
        {
            return (Some(call.name), Some(call.args), Some(call.selector));
        }
        if self.config.fallback_input_decoding {
            return (None, fallback_decode_input(input), None);
        }
        (None, None, None)
    }

    fn decode_output(&self, frame: &OpenFrame, output: &Bytes) -> Option<Vec<DecodedParam>> {
        let abi = self.abi(&frame.trace.to)?;
        match frame.selector {
            Some(selector) => {
                let function = find_function_by_selector(abi, selector)?;
                decode_function_output(function, output)
            }
            None => {
                let name = frame.trace.function_name.as_deref()?;
                decode_function_result(output, abi, name)
            }
        }
    }

    fn resolve_error_name(&self, error: DecodedError, code_address: &Address) -> DecodedError {
        match error {
            DecodedError::CustomError {
                selector,
                name: None,
            } => DecodedError::CustomError {
                selector,
                name: self
                    .abi(code_address)
                    .and_then(|abi| resolve_custom_error(selector, abi)),
            },
            other => other,
        }
    }
}
