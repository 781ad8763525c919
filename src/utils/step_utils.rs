//! Operand extraction from struct-log snapshots
//!
//! Struct logs carry the stack with its top last and memory as a list of
//! 32-byte hex words. These helpers read opcode operands out of them:
//! - Stack items counted from the top
//! - Addresses packed in stack words
//! - Memory byte ranges (call input, revert and return payloads)
//! - Storage snapshot lookups tolerant of key formatting differences

use std::collections::BTreeMap;

use alloy::primitives::{hex, Address, Bytes, U256};
use tracing::debug;

use crate::types::{OpKind, StructLog};

/// Reads the stack item `index_from_top` positions below the top
///
/// Missing items read as zero.
pub fn stack_item(stack: &[U256], index_from_top: usize) -> U256 {
    stack
        .len()
        .checked_sub(index_from_top + 1)
        .and_then(|idx| stack.get(idx))
        .copied()
        .unwrap_or(U256::ZERO)
}

/// Reads an address from the low 20 bytes of a stack item
///
/// A zero word yields `None`.
pub fn stack_address(stack: &[U256], index_from_top: usize) -> Option<Address> {
    let word = stack_item(stack, index_from_top);
    if word.is_zero() {
        return None;
    }
    Some(word_to_address(word))
}

pub fn word_to_address(word: U256) -> Address {
    let bytes = word.to_be_bytes::<32>();
    Address::from_slice(&bytes[12..])
}

/// Formats a word as 0x-prefixed, zero-padded 32-byte hex
pub fn pad_hex32(word: U256) -> String {
    hex::encode_prefixed(word.to_be_bytes::<32>())
}

/// Extracts `size` bytes starting at `offset` from a memory snapshot
///
/// The words are concatenated into one hex string and sliced by
/// `offset * 2 .. (offset + size) * 2`, clipped to what was captured.
///
/// # Returns
/// * `None` - Memory not captured or `size` is zero
/// * `Some(empty)` - The range starts beyond captured memory
/// * `Some(bytes)` - The (possibly clipped) range
pub fn read_memory(memory: &[String], offset: U256, size: U256) -> Option<Bytes> {
    if memory.is_empty() || size.is_zero() {
        return None;
    }

    let joined: String = memory
        .iter()
        .map(|word| word.strip_prefix("0x").unwrap_or(word))
        .collect();

    let start = usize::try_from(offset)
        .ok()
        .and_then(|offset| offset.checked_mul(2));
    let Some(start) = start.filter(|start| *start < joined.len()) else {
        return Some(Bytes::new());
    };
    let end = usize::try_from(offset.saturating_add(size))
        .ok()
        .and_then(|end| end.checked_mul(2))
        .map_or(joined.len(), |end| end.min(joined.len()));

    let slice = joined.get(start..end)?;
    match hex::decode(slice) {
        Ok(bytes) => Some(bytes.into()),
        Err(err) => {
            debug!(%err, "memory snapshot is not valid hex");
            None
        }
    }
}

/// Looks a slot up in a storage snapshot
///
/// Tries the minimal hex form with and without `0x`, then the 32-byte padded
/// form with and without `0x`.
pub fn storage_value(storage: Option<&BTreeMap<String, String>>, slot: U256) -> Option<String> {
    let storage = storage?;
    let minimal = format!("{slot:x}");
    let padded = hex::encode(slot.to_be_bytes::<32>());
    [
        format!("0x{minimal}"),
        minimal,
        format!("0x{padded}"),
        padded,
    ]
    .iter()
    .find_map(|key| storage.get(key))
    .cloned()
}

/// Operands of a CALL-family instruction
///
/// Operand 0 is the top of the stack. CALL and CALLCODE take
/// `[gas, to, value, inOffset, inSize, outOffset, outSize]`;
/// DELEGATECALL and STATICCALL take the same list without `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOperands {
    pub gas: U256,
    pub to: Option<Address>,
    pub value: U256,
    pub in_offset: U256,
    pub in_size: U256,
    pub out_offset: U256,
    pub out_size: U256,
}

impl CallOperands {
    /// Reads the operands for `kind`, `None` when it is not a call opcode
    pub fn from_stack(kind: OpKind, stack: &[U256]) -> Option<Self> {
        let value_slots = match kind {
            OpKind::Call | OpKind::CallCode => 1,
            OpKind::DelegateCall | OpKind::StaticCall => 0,
            _ => return None,
        };
        Some(CallOperands {
            gas: stack_item(stack, 0),
            to: stack_address(stack, 1),
            value: if value_slots == 1 {
                stack_item(stack, 2)
            } else {
                U256::ZERO
            },
            in_offset: stack_item(stack, 2 + value_slots),
            in_size: stack_item(stack, 3 + value_slots),
            out_offset: stack_item(stack, 4 + value_slots),
            out_size: stack_item(stack, 5 + value_slots),
        })
    }

    /// Call input sliced from the step's memory
    pub fn input(&self, log: &StructLog) -> Option<Bytes> {
        read_memory(&log.memory, self.in_offset, self.in_size)
    }
}

/// Payload of a REVERT or RETURN step: `(offset, size)` from the top two
/// stack items, sliced from memory
pub fn return_data(log: &StructLog) -> Option<Bytes> {
    let offset = stack_item(&log.stack, 0);
    let size = stack_item(&log.stack, 1);
    read_memory(&log.memory, offset, size)
}
