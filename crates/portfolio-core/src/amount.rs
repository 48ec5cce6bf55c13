//! Base-unit conversion and USD valuation.
//!
//! Amounts stay decimal strings all the way from the raw integer; only the
//! USD product goes through `f64`.

use alloy_primitives::U256;

const NO_DATA: &str = "N/A";

/// Formats `value` base units as a whole-unit decimal string with trailing
/// zeros trimmed (`1_000_000` at 6 decimals is `"1"`, `1_500` is `"0.0015"`).
pub fn format_units(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }

    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
    } else {
        digits
    };

    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{int_part}.{frac_part}")
    }
}

/// Parses a base-unit integer string (as reported by token-account RPCs).
pub fn parse_base_units(raw: &str) -> Option<U256> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    U256::from_str_radix(raw, 10).ok()
}

/// Reads a directory price. Missing, empty, `"N/A"`, non-numeric and
/// non-finite values all mean "no price".
pub fn parse_price(price: Option<&str>) -> Option<f64> {
    let price = price?.trim();
    if price.is_empty() || price == NO_DATA {
        return None;
    }
    price.parse::<f64>().ok().filter(|p| p.is_finite())
}

/// `amount * price`, or `None` when either side is unusable.
pub fn usd_value(amount: &str, price: Option<f64>) -> Option<f64> {
    let amount = amount.parse::<f64>().ok()?;
    let usd = amount * price?;
    usd.is_finite().then_some(usd)
}
