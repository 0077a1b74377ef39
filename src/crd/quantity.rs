//! Kubernetes resource quantity parsing.
//!
//! Accepts the quantity grammar used by memory and bandwidth fields: an
//! optional sign, a decimal number and either a binary (`Ki`..`Ei`),
//! decimal (`k`..`E`) or milli (`m`) suffix, or a decimal exponent (`e3`,
//! `E-2`).

use std::sync::LazyLock;

use regex::Regex;

static QUANTITY_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^([+-]?)([0-9]+)(?:\.([0-9]*))?(?:(Ki|Mi|Gi|Ti|Pi|Ei|k|M|G|T|P|E|m)|[eE]([+-]?[0-9]+))?$",
    )
    .ok()
});

/// Digits of a fraction kept exactly; later digits only affect rounding.
const FRACTION_DIGITS: usize = 18;

/// Parse a quantity string into its value in base units.
///
/// Fractional results are rounded up, away from zero, so `500m` is 1.
/// Returns `None` when the string is malformed or the value does not fit
/// in an `i64`.
pub fn parse_quantity(value: &str) -> Option<i64> {
    let re = QUANTITY_RE.as_ref()?;
    let caps = re.captures(value.trim())?;

    let negative = caps.get(1).is_some_and(|m| m.as_str() == "-");
    let whole: i128 = caps.get(2)?.as_str().parse().ok()?;
    let fraction = caps.get(3).map_or("", |m| m.as_str());

    let (numerator, denominator) = match (caps.get(4), caps.get(5)) {
        (Some(suffix), _) => suffix_scale(suffix.as_str())?,
        (None, Some(exponent)) => exponent_scale(exponent.as_str().parse().ok()?)?,
        (None, None) => (1, 1),
    };

    let (kept, dropped) = fraction.split_at(fraction.len().min(FRACTION_DIGITS));
    let fraction_scale = 10_i128.checked_pow(u32::try_from(kept.len()).ok()?)?;
    let fraction_value: i128 = if kept.is_empty() { 0 } else { kept.parse().ok()? };

    let scaled = whole
        .checked_mul(fraction_scale)?
        .checked_add(fraction_value)?
        .checked_mul(numerator)?;
    let divisor = fraction_scale.checked_mul(denominator)?;
    let mut total = scaled / divisor;
    if scaled % divisor != 0 || dropped.bytes().any(|b| b != b'0') {
        total += 1;
    }

    let total = if negative { -total } else { total };
    i64::try_from(total).ok()
}

/// Multiplier and divisor for a unit suffix.
fn suffix_scale(suffix: &str) -> Option<(i128, i128)> {
    let scale = match suffix {
        "m" => (1, 1000),
        "k" => (1_000, 1),
        "M" => (1_000_000, 1),
        "G" => (1_000_000_000, 1),
        "T" => (1_000_000_000_000, 1),
        "P" => (1_000_000_000_000_000, 1),
        "E" => (1_000_000_000_000_000_000, 1),
        "Ki" => (1 << 10, 1),
        "Mi" => (1 << 20, 1),
        "Gi" => (1 << 30, 1),
        "Ti" => (1 << 40, 1),
        "Pi" => (1 << 50, 1),
        "Ei" => (1 << 60, 1),
        _ => return None,
    };
    Some(scale)
}

/// Multiplier and divisor for a decimal exponent.
fn exponent_scale(exponent: i32) -> Option<(i128, i128)> {
    let power = 10_i128.checked_pow(exponent.unsigned_abs())?;
    if exponent >= 0 {
        Some((power, 1))
    } else {
        Some((1, power))
    }
}

/// Format a byte count the way the API server would print it, using the
/// largest binary suffix that divides it exactly.
pub fn format_binary(bytes: i64) -> String {
    const SUFFIXES: [(&str, i64); 6] = [
        ("Ei", 1 << 60),
        ("Pi", 1 << 50),
        ("Ti", 1 << 40),
        ("Gi", 1 << 30),
        ("Mi", 1 << 20),
        ("Ki", 1 << 10),
    ];
    if bytes != 0 {
        for (suffix, unit) in SUFFIXES {
            if bytes % unit == 0 {
                return format!("{}{suffix}", bytes / unit);
            }
        }
    }
    bytes.to_string()
}
