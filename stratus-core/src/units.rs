//! Human-readable binary size units.
//!
//! Sizes appear throughout diagnostics and configuration: threshold tables,
//! capability ranges, and user threshold overrides. `usize::MAX` is the
//! "infinity" sentinel and renders as `"inf"`.

use crate::error::SelectError;

const SUFFIXES: [&str; 7] = ["", "K", "M", "G", "T", "P", "E"];

/// Format a size with binary-unit suffixes: `"0"`, `"1023"`, `"4K"`,
/// `"16M"`, `"inf"`.
///
/// Sizes that are not whole multiples of a unit print as plain bytes.
#[must_use]
pub fn format_size(size: usize) -> String {
    if size == usize::MAX {
        return "inf".to_string();
    }
    if size == 0 {
        return "0".to_string();
    }

    let mut value = size;
    let mut unit = 0;
    while value % 1024 == 0 && unit < SUFFIXES.len() - 1 {
        value /= 1024;
        unit += 1;
    }
    format!("{}{}", value, SUFFIXES[unit])
}

/// Format an inclusive message-length range: `"0..4K"`, `"4097..inf"`.
#[must_use]
pub fn format_range(start: usize, end: usize) -> String {
    format!("{}..{}", format_size(start), format_size(end))
}

/// Parse a size string: plain bytes or a binary-unit suffix (`"4K"`,
/// `"16m"`), with `"inf"` mapping to `usize::MAX`.
pub fn parse_size(value: &str) -> Result<usize, SelectError> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("inf") {
        return Ok(usize::MAX);
    }

    let (digits, multiplier) = match value.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => {
            let shift = match c.to_ascii_uppercase() {
                'K' => 10,
                'M' => 20,
                'G' => 30,
                'T' => 40,
                _ => return Err(SelectError::InvalidSize(value.to_string())),
            };
            (&value[..value.len() - 1], 1usize << shift)
        }
        _ => (value, 1),
    };

    digits
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| SelectError::InvalidSize(value.to_string()))
}
