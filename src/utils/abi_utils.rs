//! ABI decoding of call inputs, return values and custom errors
//!
//! Most contracts seen in a trace are unverified or only partially
//! described, so nothing in here fails: every public function returns
//! `None` when the data cannot be matched against the ABI.

use alloy::{
    dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt},
    json_abi::{Function, JsonAbi, Param},
    primitives::{hex, Selector, U256},
};
use serde::Serialize;
use tracing::debug;

use crate::errors::DecodeError;
use crate::types::DecodedParam;
use crate::utils::format_utils::format_value;

/// A call input matched against an ABI function
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedCall {
    pub name: String,
    /// Canonical signature, e.g. `transfer(address,uint256)`
    pub signature: String,
    pub selector: Selector,
    pub args: Vec<DecodedParam>,
}

/// Leading 4 bytes of call data
pub fn selector_of(input: &[u8]) -> Option<Selector> {
    input.get(..4).map(Selector::from_slice)
}

/// Finds the function whose selector matches
pub fn find_function_by_selector(abi: &JsonAbi, selector: Selector) -> Option<&Function> {
    abi.functions().find(|function| function.selector() == selector)
}

/// Decodes call input against an ABI
///
/// # Arguments
/// * `input` - Full call data, selector included
/// * `abi` - Contract ABI
///
/// # Returns
/// * `Some(DecodedCall)` - Function name, typed arguments and signature
/// * `None` - Unknown selector or arguments that do not decode
pub fn decode_function_call(input: &[u8], abi: &JsonAbi) -> Option<DecodedCall> {
    match try_decode_function_call(input, abi) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            debug!(%err, "call input left undecoded");
            None
        }
    }
}

fn try_decode_function_call(input: &[u8], abi: &JsonAbi) -> Result<DecodedCall, DecodeError> {
    let selector = selector_of(input).ok_or_else(|| DecodeError::UndecodableCall {
        selector: hex::encode_prefixed(input),
        reason: "input shorter than a selector".to_string(),
    })?;
    let function =
        find_function_by_selector(abi, selector).ok_or_else(|| DecodeError::UndecodableCall {
            selector: selector.to_string(),
            reason: "no matching function in ABI".to_string(),
        })?;
    let values =
        function
            .abi_decode_input(&input[4..])
            .map_err(|err| DecodeError::UndecodableCall {
                selector: selector.to_string(),
                reason: err.to_string(),
            })?;

    Ok(DecodedCall {
        name: function.name.clone(),
        signature: function.signature(),
        selector,
        args: decoded_params(&function.inputs, &values, "param"),
    })
}

/// Decodes return data of `function`
///
/// Returns `None` when the function declares no outputs or the data does
/// not decode.
pub fn decode_function_output(function: &Function, output: &[u8]) -> Option<Vec<DecodedParam>> {
    if function.outputs.is_empty() {
        debug!(function = %function.name, "{}", DecodeError::MissingOutputs(function.name.clone()));
        return None;
    }
    match function.abi_decode_output(output) {
        Ok(values) => Some(decoded_params(&function.outputs, &values, "return")),
        Err(err) => {
            debug!(function = %function.name, %err, "return data left undecoded");
            None
        }
    }
}

/// Decodes return data given only the function name
///
/// The first overload of `function_name` declaring outputs is used.
pub fn decode_function_result(
    output: &[u8],
    abi: &JsonAbi,
    function_name: &str,
) -> Option<Vec<DecodedParam>> {
    let function = abi
        .function(function_name)?
        .iter()
        .find(|function| !function.outputs.is_empty())?;
    decode_function_output(function, output)
}

/// Resolves a custom error selector to its ABI name
pub fn resolve_custom_error(selector: Selector, abi: &JsonAbi) -> Option<String> {
    abi.errors()
        .find(|error| error.selector() == selector)
        .map(|error| error.name.clone())
}

/// Best-effort input decoding without an ABI
///
/// Treats the first word after the selector as a single `uint256`.
pub fn fallback_decode_input(input: &[u8]) -> Option<Vec<DecodedParam>> {
    let word = input.get(4..36)?;
    let value = U256::from_be_slice(word).to_string();
    Some(vec![DecodedParam {
        name: "param0".to_string(),
        ty: "uint256".to_string(),
        display: format_value(&value, "uint256"),
        value,
    }])
}

fn decoded_params(params: &[Param], values: &[DynSolValue], unnamed: &str) -> Vec<DecodedParam> {
    params
        .iter()
        .zip(values)
        .enumerate()
        .map(|(idx, (param, value))| {
            let ty = param.selector_type().into_owned();
            let value = value_to_string(value);
            DecodedParam {
                name: if param.name.is_empty() {
                    format!("{unnamed}{idx}")
                } else {
                    param.name.clone()
                },
                display: format_value(&value, &ty),
                ty,
                value,
            }
        })
        .collect()
}

/// Exact textual form of a decoded value
///
/// Addresses are checksummed, integers decimal, bytes 0x-hex.
pub fn value_to_string(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Address(address) => address.to_checksum(None),
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::Uint(u, _) => u.to_string(),
        DynSolValue::Int(i, _) => i.to_string(),
        DynSolValue::FixedBytes(word, size) => hex::encode_prefixed(&word[..*size]),
        DynSolValue::Bytes(bytes) => hex::encode_prefixed(bytes),
        DynSolValue::String(s) => s.clone(),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) => {
            let items: Vec<String> = items.iter().map(value_to_string).collect();
            format!("[{}]", items.join(", "))
        }
        DynSolValue::Tuple(items) => {
            let items: Vec<String> = items.iter().map(value_to_string).collect();
            format!("({})", items.join(", "))
        }
        other => format!("{other:?}"),
    }
}
