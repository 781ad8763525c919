//! Raw `debug_traceTransaction` document normalization
//!
//! Nodes and exporters disagree on the shape of struct-log traces:
//! - The document may be a full JSON-RPC envelope (`{ result: { structLogs } }`)
//!   or the bare result object
//! - `pc`, `gas`, `gasCost` and `depth` may be JSON integers or hex strings
//! - Gas is kept as `U256`, so hex values wider than 64 bits survive intact
//! - Storage keys may come with or without a `0x` prefix
//!
//! Everything is normalized here into [`StructLog`] so the builders only ever
//! see one canonical shape.

use std::collections::BTreeMap;

use alloy::primitives::U256;
use serde::{de::IgnoredAny, Deserialize};
use serde_json::Value;
use tracing::debug;

use crate::errors::TraceError;
use crate::types::{NormalizedTrace, StructLog};

/// Integer field as found in the wild
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Int(u64),
    Text(String),
    Other(IgnoredAny),
}

impl RawNumber {
    fn to_u256(&self) -> U256 {
        match self {
            RawNumber::Int(n) => U256::from(*n),
            RawNumber::Text(s) => parse_hex_u256(s),
            RawNumber::Other(_) => U256::ZERO,
        }
    }

    /// Narrows to `u64`, saturating values that do not fit
    fn to_u64(&self) -> u64 {
        u64::try_from(self.to_u256()).unwrap_or(u64::MAX)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStructLog {
    #[serde(default)]
    pc: Option<RawNumber>,
    #[serde(default)]
    op: String,
    #[serde(default)]
    gas: Option<RawNumber>,
    #[serde(default)]
    gas_cost: Option<RawNumber>,
    #[serde(default)]
    depth: Option<RawNumber>,
    #[serde(default)]
    stack: Option<Value>,
    #[serde(default)]
    memory: Option<Value>,
    #[serde(default)]
    storage: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTraceResult {
    #[serde(default)]
    gas: Option<RawNumber>,
    #[serde(default)]
    failed: Option<bool>,
    #[serde(default)]
    return_value: Option<Value>,
    struct_logs: Vec<RawStructLog>,
}

const ZERO_WORD: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Parses a hex string (with or without `0x`), zero when unparseable
fn parse_hex_u256(value: &str) -> U256 {
    let digits = strip_0x(value.trim());
    if digits.is_empty() {
        return U256::ZERO;
    }
    U256::from_str_radix(digits, 16).unwrap_or(U256::ZERO)
}

fn strip_0x(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

fn with_0x(value: &str) -> String {
    if value.starts_with("0x") {
        value.to_string()
    } else {
        format!("0x{value}")
    }
}

fn number(field: &Option<RawNumber>) -> u64 {
    field.as_ref().map(RawNumber::to_u64).unwrap_or(0)
}

fn big_number(field: &Option<RawNumber>) -> U256 {
    field.as_ref().map(RawNumber::to_u256).unwrap_or(U256::ZERO)
}

/// Parses one stack word, zero when unparseable
fn parse_stack_word(word: &Value) -> U256 {
    match word {
        Value::String(s) => {
            let digits = strip_0x(s.trim());
            if digits.is_empty() {
                return U256::ZERO;
            }
            U256::from_str_radix(digits, 16).unwrap_or(U256::ZERO)
        }
        Value::Number(n) => n.as_u64().map(U256::from).unwrap_or(U256::ZERO),
        _ => U256::ZERO,
    }
}

fn normalize_stack(stack: Option<&Value>) -> Vec<U256> {
    match stack {
        Some(Value::Array(words)) => words.iter().map(parse_stack_word).collect(),
        _ => Vec::new(),
    }
}

fn normalize_memory(memory: Option<&Value>) -> Vec<String> {
    match memory {
        Some(Value::Array(words)) => words
            .iter()
            .map(|word| match word {
                Value::String(s) => s.clone(),
                // keep the word so later offsets stay aligned
                _ => ZERO_WORD.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn normalize_storage(storage: Option<&Value>) -> Option<BTreeMap<String, String>> {
    let Some(Value::Object(entries)) = storage else {
        return None;
    };
    let normalized = entries
        .iter()
        .map(|(slot, value)| {
            let value = match value {
                Value::String(s) => with_0x(s),
                other => format!("0x{other}"),
            };
            (with_0x(slot), value)
        })
        .collect();
    Some(normalized)
}

fn normalize_struct_log(raw: &RawStructLog) -> StructLog {
    StructLog {
        pc: number(&raw.pc),
        op: raw.op.clone(),
        gas: big_number(&raw.gas),
        gas_cost: big_number(&raw.gas_cost),
        depth: number(&raw.depth),
        stack: normalize_stack(raw.stack.as_ref()),
        memory: normalize_memory(raw.memory.as_ref()),
        storage: normalize_storage(raw.storage.as_ref()),
        error: match &raw.error {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        },
    }
}

/// Picks the object holding `structLogs`, envelope first
fn extract_result(document: &Value) -> Result<&Value, TraceError> {
    let has_struct_logs = |value: &Value| {
        value
            .get("structLogs")
            .map(Value::is_array)
            .unwrap_or(false)
    };

    if let Some(result) = document.get("result") {
        if has_struct_logs(result) {
            return Ok(result);
        }
    }
    if has_struct_logs(document) {
        return Ok(document);
    }
    Err(TraceError::MalformedInput(
        "missing result.structLogs or structLogs".to_string(),
    ))
}

/// Normalizes a raw trace document
///
/// # Arguments
/// * `document` - JSON-RPC envelope or bare `{ gas, returnValue, structLogs }`
///
/// # Returns
/// * `Ok(NormalizedTrace)` - Canonical steps, overall gas and return value
/// * `Err(TraceError::MalformedInput)` - If no `structLogs` sequence exists
pub fn parse_raw_trace(document: &Value) -> Result<NormalizedTrace, TraceError> {
    let result = extract_result(document)?;
    let raw = RawTraceResult::deserialize(result)?;

    let struct_logs: Vec<StructLog> = raw.struct_logs.iter().map(normalize_struct_log).collect();
    debug!(steps = struct_logs.len(), "normalized raw trace");

    Ok(NormalizedTrace {
        gas: big_number(&raw.gas),
        return_value: match raw.return_value {
            Some(Value::String(s)) => s,
            _ => "0x".to_string(),
        },
        failed: raw.failed,
        struct_logs,
    })
}

/// Normalizes a raw trace given as JSON text
///
/// Invalid JSON is reported as [`TraceError::MalformedInput`] as well.
pub fn parse_raw_trace_str(json: &str) -> Result<NormalizedTrace, TraceError> {
    let document: Value = serde_json::from_str(json)?;
    parse_raw_trace(&document)
}
