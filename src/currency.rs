// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Decimal amount codec.
//!
//! Converts user-entered decimal strings into integer base units and formats
//! amounts for display. Both directions **truncate** excess fractional digits;
//! they never round. Amounts shown to the user and amounts signed over must
//! agree digit for digit, so do not change this to rounding.

use std::sync::LazyLock;

use alloy::primitives::U256;
use regex::Regex;

/// Grammar accepted for decimal amounts: optional sign, no leading zeros,
/// optional fraction with at least one digit. No `+`, no separators.
static NUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?(0|[1-9]\d*)(\.\d+)?$").expect("static numeric pattern is valid")
});

/// Errors produced when parsing a decimal amount.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("`{0}` is not a decimal number")]
    Malformed(String),

    #[error("negative amounts are not allowed: `{0}`")]
    Negative(String),

    #[error("amount `{0}` does not fit in 256 bits")]
    Overflow(String),
}

/// Returns `true` when `value` matches the decimal amount grammar.
pub fn is_numeric(value: &str) -> bool {
    NUMERIC.is_match(value)
}

/// Parse a decimal string into base units with `scale` fractional digits.
///
/// Fractional digits beyond `scale` are dropped, so `"1.239"` at scale 2 is
/// `123`. This is lossy on purpose and matches [`format_for_display`].
///
/// # Errors
/// * [`AmountError::Malformed`] - input fails the grammar (empty, `+1`, `1.2.3`, `1,000`)
/// * [`AmountError::Negative`] - input has a leading `-`
/// * [`AmountError::Overflow`] - result exceeds `U256::MAX`
pub fn to_base_units(amount: &str, scale: u8) -> Result<U256, AmountError> {
    if !is_numeric(amount) {
        return Err(AmountError::Malformed(amount.to_string()));
    }
    if amount.starts_with('-') {
        return Err(AmountError::Negative(amount.to_string()));
    }

    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));
    let scale = scale as usize;
    let truncated = &fraction[..fraction.len().min(scale)];
    let digits = format!("{whole}{truncated:0<scale$}");

    U256::from_str_radix(&digits, 10).map_err(|_| AmountError::Overflow(amount.to_string()))
}

/// Render base units as a decimal string with exactly `scale` fractional digits.
///
/// `format_units(U256::from(150), 2)` is `"1.50"`; scale 0 yields an integer string.
pub fn format_units(value: U256, scale: u8) -> String {
    if scale == 0 {
        return value.to_string();
    }

    let divisor = U256::from(10u64).pow(U256::from(scale));
    let whole = value / divisor;
    let remainder = value % divisor;

    format!("{}.{:0>width$}", whole, remainder, width = scale as usize)
}

/// Prefix and postfix decorations for [`format_for_display`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayOptions<'a> {
    pub prefix: Option<&'a str>,
    pub postfix: Option<&'a str>,
}

impl<'a> DisplayOptions<'a> {
    /// Options with only a prefix, e.g. a currency sign.
    pub fn prefix(prefix: &'a str) -> Self {
        Self {
            prefix: Some(prefix),
            postfix: None,
        }
    }

    /// Options with only a postfix, e.g. a ticker.
    pub fn postfix(postfix: &'a str) -> Self {
        Self {
            prefix: None,
            postfix: Some(postfix),
        }
    }
}

/// Format a decimal string for display.
///
/// Inserts `,` thousands separators in the integer part and pads or truncates
/// the fractional part to `display_decimals` digits. Input that fails the
/// decimal grammar is returned unchanged; this is a display fallback, not an
/// error path.
pub fn format_for_display(value: &str, display_decimals: usize, options: &DisplayOptions<'_>) -> String {
    if !is_numeric(value) {
        return value.to_string();
    }

    let (sign, unsigned) = match value.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", value),
    };
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let whole = if whole.is_empty() { "0" } else { whole };
    let fraction = if fraction.is_empty() { "0" } else { fraction };

    let mut out = String::new();
    out.push_str(options.prefix.unwrap_or_default());
    out.push_str(sign);
    out.push_str(&group_thousands(whole));
    if display_decimals > 0 {
        let kept = &fraction[..fraction.len().min(display_decimals)];
        out.push('.');
        out.push_str(&format!("{kept:0<display_decimals$}"));
    }
    out.push_str(options.postfix.unwrap_or_default());
    out
}

/// Shorten a hex address for display: `0x12345...cdef0`.
pub fn shorten_address(address: &str) -> String {
    if address.len() <= 12 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}...{}", &address[..7], &address[address.len() - 5..])
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
