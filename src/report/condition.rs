//! Condition values and their normalization

use std::fmt;

use crate::config::TARGET_CONDITION;

/// A run condition value as stored in RCDB
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Time(String),
}

impl fmt::Display for ConditionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionValue::Text(s) | ConditionValue::Time(s) => f.write_str(s),
            ConditionValue::Int(v) => write!(f, "{v}"),
            ConditionValue::Float(v) => f.write_str(&format_float(*v)),
            ConditionValue::Bool(true) => f.write_str("True"),
            ConditionValue::Bool(false) => f.write_str("False"),
        }
    }
}

/// Format a float the way Python's `repr` does.
///
/// Whole numbers keep a decimal point ("1.0", not "1"). Magnitudes below 1e-4
/// or from 1e16 up switch to exponent form with a signed two-digit exponent
/// ("1e-05", "1.5e+16").
pub fn format_float(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let magnitude = v.abs();
    if v != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let shortest = format!("{v:e}");
        let (mantissa, exponent) = shortest.split_once('e').unwrap_or((shortest.as_str(), "0"));
        let exponent: i32 = exponent.parse().unwrap_or(0);
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exponent.abs());
    }

    if v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

/// Apply the known value fixes for a condition.
///
/// `target` labels are trimmed and "12C" collapses to "C". Every other
/// condition passes through unchanged. Applying this twice is the same as once.
pub fn normalize(key: &str, value: ConditionValue) -> ConditionValue {
    match value {
        ConditionValue::Text(text) if key == TARGET_CONDITION => {
            let trimmed = text.trim();
            if trimmed == "12C" {
                ConditionValue::Text("C".to_string())
            } else {
                ConditionValue::Text(trimmed.to_string())
            }
        }
        other => other,
    }
}
