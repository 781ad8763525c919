//! Display formatting for decoded values
//!
//! Downstream consumers (UI panels, summarizers) rely on these rules being
//! stable:
//! - Addresses: first 10 characters, `...`, last 8 characters
//! - Integers below 1,000,000: plain decimal
//! - Larger integers: decimal with `,` thousands separators
//! - Any other value longer than 30 characters: first 20 characters + `...`

use alloy::primitives::U256;

use crate::types::DecodedParam;

/// Integers at or above this value are rendered with separators
pub const GROUPING_THRESHOLD: u64 = 1_000_000;
/// Values longer than this are truncated
pub const MAX_VALUE_LEN: usize = 30;
/// Number of characters kept when truncating
pub const TRUNCATED_LEN: usize = 20;

const ADDRESS_PREFIX_LEN: usize = 10;
const ADDRESS_SUFFIX_LEN: usize = 8;

/// Renders `name(param = value, ...)`
///
/// Returns the bare function name when there are no parameters, and `None`
/// when the function itself is unknown.
pub fn format_decoded_input(function_name: Option<&str>, params: &[DecodedParam]) -> Option<String> {
    let name = function_name?;
    if params.is_empty() {
        return Some(name.to_string());
    }
    let rendered: Vec<String> = params
        .iter()
        .map(|param| {
            let label = if param.name.is_empty() {
                "param"
            } else {
                param.name.as_str()
            };
            format!("{label} = {}", format_value(&param.value, &param.ty))
        })
        .collect();
    Some(format!("{name}({})", rendered.join(", ")))
}

/// Formats one value for display according to its Solidity type
pub fn format_value(value: &str, ty: &str) -> String {
    if ty == "address" {
        if let Some(address) = normalize_address(value) {
            return shorten_address(&address);
        }
    }
    if ty.starts_with("uint") || ty.starts_with("int") {
        if let Some(formatted) = format_integer(value) {
            return formatted;
        }
    }
    truncate(value)
}

/// `0x1234567...` + last 8 characters
pub fn shorten_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= ADDRESS_PREFIX_LEN + ADDRESS_SUFFIX_LEN {
        return address.to_string();
    }
    let prefix: String = chars[..ADDRESS_PREFIX_LEN].iter().collect();
    let suffix: String = chars[chars.len() - ADDRESS_SUFFIX_LEN..].iter().collect();
    format!("{prefix}...{suffix}")
}

/// Cuts values longer than [`MAX_VALUE_LEN`] characters
pub fn truncate(value: &str) -> String {
    if value.chars().count() > MAX_VALUE_LEN {
        let kept: String = value.chars().take(TRUNCATED_LEN).collect();
        format!("{kept}...")
    } else {
        value.to_string()
    }
}

/// Inserts `,` every three digits from the right
pub fn group_thousands(digits: &str) -> String {
    let (sign, digits) = match digits.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", digits),
    };
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}")
}

/// Accepts a 20-byte address or a 32-byte word holding one
fn normalize_address(value: &str) -> Option<String> {
    let digits = value.strip_prefix("0x")?;
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    match digits.len() {
        40 => Some(value.to_string()),
        64 => Some(format!("0x{}", &digits[24..])),
        _ => None,
    }
}

/// Decimal or 0x-hex integer, plain below the threshold, grouped above
fn format_integer(value: &str) -> Option<String> {
    let decimal = match value.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16).ok()?.to_string(),
        None => {
            let magnitude = value.strip_prefix('-').unwrap_or(value);
            if magnitude.is_empty() || !magnitude.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            value.to_string()
        }
    };

    let magnitude = decimal.strip_prefix('-').unwrap_or(&decimal);
    let below_threshold = magnitude
        .parse::<u64>()
        .map(|n| n < GROUPING_THRESHOLD)
        .unwrap_or(false);
    if below_threshold {
        Some(decimal)
    } else {
        Some(group_thousands(&decimal))
    }
}
