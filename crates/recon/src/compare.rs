// Pairwise value comparison.
// Pure functions: numeric coercion, tolerance equality, difference.

use crate::model::{Difference, Value};

/// Absolute tolerance used when a config does not set one.
pub const DEFAULT_TOLERANCE: f64 = 0.01;

/// Relative tolerance applied on top of the absolute one, scaled by the
/// larger magnitude of the two operands.
pub const RELATIVE_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Coercion
// ---------------------------------------------------------------------------

/// Parse a number out of a text cell:
/// - Strip `$`, commas, whitespace
/// - Handle `(123.45)` → `-123.45`
/// - `nan`, `inf` and exponents are accepted as `f64::from_str` accepts them
/// - Returns None if non-numeric characters remain after stripping
pub fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Some(f64::NAN);
    }

    let (is_negative, inner) = if trimmed.starts_with('(') && trimmed.ends_with(')') {
        (true, &trimmed[1..trimmed.len() - 1])
    } else {
        (false, trimmed)
    };

    let cleaned: String = inner
        .chars()
        .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return None;
    }
    if is_negative && cleaned.starts_with(['-', '+']) {
        return None;
    }

    let value: f64 = cleaned.parse().ok()?;
    Some(if is_negative { -value } else { value })
}

/// Numeric view of a value. `Null` coerces to NaN; `None` means the value is
/// not numeric and callers fall back to text comparison.
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Null => Some(f64::NAN),
        Value::Text(s) => parse_number(s),
    }
}

/// True when the value is numerically exactly zero.
pub fn is_zero(value: &Value) -> bool {
    coerce_number(value) == Some(0.0)
}

fn normalized_text(value: &Value) -> String {
    value.to_string().trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// Equality
// ---------------------------------------------------------------------------

/// Tolerance equality of two already-coerced numbers.
pub fn numbers_equal(x: f64, y: f64, tolerance: f64) -> bool {
    if x.is_nan() || y.is_nan() {
        return x.is_nan() && y.is_nan();
    }
    if x.is_infinite() || y.is_infinite() {
        return x == y;
    }
    let scale = x.abs().max(y.abs());
    (x - y).abs() <= tolerance + RELATIVE_EPSILON * scale
}

/// Equality judgment between two cells.
///
/// Both numeric: NaN equals only NaN, otherwise `|a-b| <= tolerance + 1e-9 * max(|a|,|b|)`.
/// Either non-numeric: case-insensitive comparison of the trimmed text.
pub fn values_equal(a: &Value, b: &Value, tolerance: f64) -> bool {
    match (coerce_number(a), coerce_number(b)) {
        (Some(x), Some(y)) => numbers_equal(x, y, tolerance),
        _ => normalized_text(a) == normalized_text(b),
    }
}

/// `a - b`, or why there is no numeric delta. A delta that is not finite
/// (an infinity on either side, or overflow) is `NotANumber`.
pub fn difference(a: &Value, b: &Value) -> Difference {
    match (coerce_number(a), coerce_number(b)) {
        (Some(x), Some(y)) => {
            let delta = x - y;
            if delta.is_finite() {
                Difference::Numeric(delta)
            } else {
                Difference::NotANumber
            }
        }
        _ => Difference::NonNumeric,
    }
}
