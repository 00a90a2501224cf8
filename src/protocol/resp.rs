//! Double formatting
//!
//! Doubles are rendered with the shortest digit string that parses back to
//! the same value. Integral values carry no fractional part (`1`, not `1.0`).
//! Decimal exponents in `[-6, 21)` use plain notation, others scientific
//! notation with an explicit exponent sign (`1e+21`, `1.5e-7`). Negative
//! zero keeps its sign (`-0`).

/// Upper bound on the length of a formatted double
pub const MAX_DOUBLE_LEN: usize = 32;

const DECIMAL_LOW_EXP: i32 = -6;
const DECIMAL_HIGH_EXP: i32 = 21;

/// Render `value` as Redis does for doubles and scores
pub fn format_double(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let scientific = format!("{:e}", value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exp)) => (mantissa, exp.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if (DECIMAL_LOW_EXP..DECIMAL_HIGH_EXP).contains(&exponent) {
        format!("{}", value)
    } else if exponent > 0 {
        format!("{}e+{}", mantissa, exponent)
    } else {
        format!("{}e{}", mantissa, exponent)
    }
}
