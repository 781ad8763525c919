//! Step inspector traits
//!
//! This module provides the traits every trace builder implements:
//! - `StepInspector`: receives each struct log of a trace, in order
//! - `Reset`: clears accumulated state so an instance can be reused
//! - `TraceOutput`: converts the collected state into a serializable result
//!
//! Builders keep all of their mutable state inside the inspector value, so
//! independent traces can be processed on separate threads without locking.

use crate::types::{StructLog, U256};

/// One struct log together with its neighbours
///
/// The look-ahead to `next` is what lets a builder tell a call that opens a
/// new frame from a call to an account without code.
#[derive(Debug, Clone, Copy)]
pub struct Step<'a> {
    /// Position in the trace
    pub index: usize,
    pub log: &'a StructLog,
    pub prev: Option<&'a StructLog>,
    pub next: Option<&'a StructLog>,
}

impl<'a> Step<'a> {
    /// Gas remaining before this step executes
    ///
    /// Step 0 uses its own `gas + gasCost`, later steps the previous step's.
    pub fn gas_before(&self) -> U256 {
        match self.prev {
            Some(prev) => prev.gas.saturating_add(prev.gas_cost),
            None => self.log.gas.saturating_add(self.log.gas_cost),
        }
    }

    /// Check if the next step runs one or more frames deeper
    pub fn enters_frame(&self) -> bool {
        self.next
            .map(|next| next.depth > self.log.depth)
            .unwrap_or(false)
    }
}

/// Hooks called by [`process_steps`](crate::processor::process_steps)
pub trait StepInspector {
    /// Called once before the first step, with the first step if any
    fn begin(&mut self, _first: Option<&StructLog>) {}

    /// Called for every struct log, in trace order
    fn step(&mut self, step: &Step<'_>);

    /// Called once after the last step, with the last step if any
    fn finish(&mut self, _last: Option<&StructLog>) {}
}

/// Trait for resetting inspector state between traces
///
/// Implementors should clear any accumulated state:
/// - Nodes and frames
/// - Per-depth and per-address tables
/// - Counters
pub trait Reset {
    /// Clears all accumulated state data
    fn reset(&mut self);
}

/// Trait for extracting the result of a completed pass
pub trait TraceOutput {
    type Output;

    fn get_output(&self) -> Self::Output;
}

/// Convenience bound for anything the driver can run
pub trait TraceInspector: StepInspector + Reset + TraceOutput {}

impl<T> TraceInspector for T where T: StepInspector + Reset + TraceOutput {}
