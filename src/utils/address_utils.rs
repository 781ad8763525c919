//! Contract address collection
//!
//! Metadata collaborators (ABI and name lookups) need to know which
//! accounts a transaction touched before the call trace is decoded.

use std::collections::BTreeSet;

use alloy::primitives::Address;

use crate::types::{OpKind, StructLog};
use crate::utils::step_utils::CallOperands;

/// Collects the unique addresses targeted by CALL-family steps
///
/// # Arguments
/// * `steps` - Normalized struct logs
/// * `tx_to` - Transaction target, included when present
///
/// # Returns
/// Sorted, de-duplicated addresses. Zero targets are skipped.
pub fn collect_contract_addresses(steps: &[StructLog], tx_to: Option<Address>) -> BTreeSet<Address> {
    let targets = steps.iter().filter_map(|log| {
        CallOperands::from_stack(OpKind::from_op(&log.op), &log.stack).and_then(|ops| ops.to)
    });
    tx_to.into_iter().chain(targets).collect()
}
