//! Frame closing, failure tracking and stack traces
//!
//! A revert marks its frame as failing unless the frame already recorded
//! as failing sits below it: a revert bubbling up through its callers
//! keeps the deepest origin. A caller that writes storage, emits a log or
//! calls out again after the failure has caught it, so its own later
//! revert becomes the new origin. Once every frame is closed the failing
//! frame is flagged `error_origin` and the root-to-origin path becomes the
//! stack trace.

use tracing::trace;

use crate::inspectors::call_inspector::CallInspector;
use crate::types::*;

impl<'a> CallInspector<'a> {
    /// Closes frames whose depth is below the current step's depth
    ///
    /// The root frame is only closed by `finish`.
    pub(super) fn close_returned_frames(&mut self, depth: u64) {
        while self.frames.len() > 1 {
            match self.frames.last() {
                Some(frame) if depth < frame.depth => {
                    let gas = frame.last_gas;
                    self.close_top(gas);
                }
                _ => break,
            }
        }
    }

    /// Pops the innermost frame and moves it into its parent
    ///
    /// # Arguments
    /// * `gas_end` - Gas remaining when the frame stopped executing
    pub(super) fn close_top(&mut self, gas_end: U256) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        let mut closed = frame.trace;
        closed.gas_used = frame.gas_start.saturating_sub(gas_end);
        trace!(
            trace_address = ?closed.trace_address,
            gas_used = %closed.gas_used,
            "closing call frame"
        );

        match self.frames.last_mut() {
            Some(parent) => parent.trace.calls.push(closed),
            None => self.completed = Some(closed),
        }
    }

    /// Records `frame_address` as failing unless a descendant already is
    /// and that failure was never caught
    pub(super) fn record_failing_frame(&mut self, frame_address: Vec<usize>) {
        let propagated = !self.failure_handled
            && self
                .failing
                .as_ref()
                .is_some_and(|failing| is_strict_prefix(&frame_address, failing));
        if !propagated {
            self.failing = Some(frame_address);
            self.failure_handled = false;
        }
    }

    /// Notes that `frame_address` did observable work at this step
    ///
    /// If it is a caller of the failing frame, the failure was caught.
    pub(super) fn record_continuation(&mut self, frame_address: &[usize]) {
        if self.failure_handled {
            return;
        }
        let caught = self
            .failing
            .as_ref()
            .is_some_and(|failing| is_strict_prefix(frame_address, failing));
        if caught {
            trace!(failing = ?self.failing, caller = ?frame_address, "failure caught by caller");
            self.failure_handled = true;
        }
    }

    /// Flags the failing frame of the completed tree
    pub(super) fn mark_error_origin(&mut self) {
        let (Some(root), Some(failing)) = (self.completed.as_mut(), self.failing.as_ref()) else {
            return;
        };
        if let Some(origin) = trace_at_mut(root, failing) {
            origin.error_origin = true;
        }
    }

    /// Returns the trace address of the frame where the failure originated
    ///
    /// # Returns
    /// * `Some(vec![0, 2])` - Failure in the third entry of the root's first child
    /// * `Some(vec![])` - The transaction frame itself reverted
    /// * `None` - Nothing reverted
    pub fn get_error_trace_address(&self) -> Option<Vec<usize>> {
        self.failing.clone()
    }

    /// Builds the root-first path to the failing frame
    ///
    /// Performs a depth-first search over the completed tree for the frame
    /// flagged as error origin. Empty when nothing failed.
    pub fn stack_trace(&self) -> Vec<StackTraceEntry> {
        let Some(root) = self.completed.as_ref() else {
            return Vec::new();
        };
        let mut path = Vec::new();
        if !path_to_origin(root, &mut path) {
            return Vec::new();
        }
        path.into_iter().map(stack_entry).collect()
    }
}

fn is_strict_prefix(prefix: &[usize], address: &[usize]) -> bool {
    address.len() > prefix.len() && address.starts_with(prefix)
}

fn trace_at_mut<'t>(trace: &'t mut CallTrace, address: &[usize]) -> Option<&'t mut CallTrace> {
    address
        .iter()
        .try_fold(trace, |trace, index| trace.calls.get_mut(*index))
}

fn path_to_origin<'t>(trace: &'t CallTrace, path: &mut Vec<&'t CallTrace>) -> bool {
    path.push(trace);
    if trace.error_origin || trace.subcalls().any(|call| path_to_origin(call, path)) {
        return true;
    }
    path.pop();
    false
}

fn stack_entry(trace: &CallTrace) -> StackTraceEntry {
    StackTraceEntry {
        contract: trace.to,
        contract_name: trace.contract_name.clone(),
        name: trace.function_name.clone(),
        error: trace.error.clone(),
        error_message: trace.error_message.clone(),
        op: trace
            .error_op
            .clone()
            .unwrap_or_else(|| trace.call_type.to_string()),
        error_origin: trace.error_origin,
    }
}
