//! Struct-log inspectors
//!
//! This module provides two builders driven over the same step sequence:
//!
//! - `tree_inspector`: depth-indexed generic opcode tree, with failure
//!   location by deepest revert
//!
//! - `call_inspector`: nested call frames with storage leaves, decoded
//!   inputs and outputs, error propagation and a root-to-failure stack trace
//!
//! Both implement the `StepInspector`, `Reset` and `TraceOutput` traits and
//! are independent of each other.

pub mod call_inspector;
pub mod tree_inspector;

pub use call_inspector::*;
pub use tree_inspector::*;
