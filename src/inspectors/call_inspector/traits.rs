//! Trait implementations for CallInspector
//!
//! - `Reset`: drops frames, storage history and failure state so the
//!   inspector can run over another trace of the same transaction
//! - `TraceOutput`: the call tree, its stack trace and the failure location

use crate::inspectors::call_inspector::CallInspector;
use crate::traits::{Reset, TraceOutput};
use crate::types::CallTraceOutput;

impl<'a> Reset for CallInspector<'a> {
    fn reset(&mut self) {
        self.frames = Vec::new();
        self.storage_before.clear();
        self.failing = None;
        self.failure_handled = false;
        self.completed = None;
    }
}

impl<'a> TraceOutput for CallInspector<'a> {
    type Output = CallTraceOutput;

    /// Call tree, root-first stack trace and failing trace address
    ///
    /// Before `finish` has run the call tree is empty.
    fn get_output(&self) -> Self::Output {
        CallTraceOutput {
            call_trace: self.completed.clone().unwrap_or_default(),
            stack_trace: self.stack_trace(),
            error_trace_address: self.get_error_trace_address(),
        }
    }
}
