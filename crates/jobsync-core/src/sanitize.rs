//! Coercion of untrusted numeric fields.
//!
//! Backend payloads are loosely typed: numbers arrive as strings, booleans,
//! `null`, or not at all. Every function here is total and never panics,
//! so callers can feed raw JSON straight through.
//!
//! | Input                          | Result                 |
//! |--------------------------------|------------------------|
//! | finite number                  | the number             |
//! | string                         | trimmed; `""` is `0`, otherwise parsed if finite |
//! | `true` / `false`               | `1` / `0`              |
//! | `null`, array, object, garbage | fallback               |

use serde_json::Value;

/// Lower bound of a progress percentage.
pub const PROGRESS_MIN: f64 = 0.0;

/// Upper bound of a progress percentage.
pub const PROGRESS_MAX: f64 = 100.0;

/// Coerce a JSON value to a finite number, or `None`.
pub fn num_opt(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse::<f64>().ok()?
            }
        }
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    n.is_finite().then_some(n)
}

/// Coerce a JSON value to a finite number, falling back to `fallback`.
pub fn num(value: &Value, fallback: f64) -> f64 {
    num_opt(value).unwrap_or(fallback)
}

/// Coerce a JSON value and clamp it into `[min, max]`.
///
/// Values that cannot be coerced become `min`.
pub fn clamp(value: &Value, min: f64, max: f64) -> f64 {
    clamp_f64(num(value, min), min, max)
}

/// Clamp an already-typed float into `[min, max]`. `NaN` becomes `min`.
///
/// Unlike [`f64::clamp`] this never panics, even for `min > max`.
pub fn clamp_f64(value: f64, min: f64, max: f64) -> f64 {
    // f64::max returns the non-NaN operand
    value.max(min).min(max)
}

/// Clamp a JSON value into the progress range.
pub fn progress(value: &Value) -> f64 {
    clamp(value, PROGRESS_MIN, PROGRESS_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_num_coercions() {
        assert_eq!(num(&json!(42), -1.0), 42.0);
        assert_eq!(num(&json!(3.5), -1.0), 3.5);
        assert_eq!(num(&json!("17"), -1.0), 17.0);
        assert_eq!(num(&json!("  8.25 "), -1.0), 8.25);
        assert_eq!(num(&json!(""), -1.0), 0.0);
        assert_eq!(num(&json!(true), -1.0), 1.0);
        assert_eq!(num(&json!(false), -1.0), 0.0);
    }

    #[test]
    fn test_num_fallbacks() {
        assert_eq!(num(&Value::Null, -1.0), -1.0);
        assert_eq!(num(&json!("abc"), -1.0), -1.0);
        assert_eq!(num(&json!("NaN"), -1.0), -1.0);
        assert_eq!(num(&json!("inf"), -1.0), -1.0);
        assert_eq!(num(&json!([1, 2]), -1.0), -1.0);
        assert_eq!(num(&json!({"v": 1}), -1.0), -1.0);
    }

    #[test]
    fn test_num_opt_for_optional_fields() {
        assert_eq!(num_opt(&json!(1024)), Some(1024.0));
        assert_eq!(num_opt(&Value::Null), None);
        assert_eq!(num_opt(&json!("1e400")), None);
    }

    #[test]
    fn test_clamp_always_in_range() {
        let inputs = [
            json!(-5),
            json!(0),
            json!(42),
            json!(100),
            json!(250.5),
            json!("77"),
            json!("not a number"),
            json!("-Infinity"),
            json!(true),
            json!(false),
            Value::Null,
            json!([]),
            json!({}),
        ];

        for input in &inputs {
            let v = clamp(input, 0.0, 100.0);
            assert!(v.is_finite(), "{input} produced non-finite {v}");
            assert!((0.0..=100.0).contains(&v), "{input} produced {v}");
        }
    }

    #[test]
    fn test_clamp_values() {
        assert_eq!(clamp(&json!(-5), 0.0, 100.0), 0.0);
        assert_eq!(clamp(&json!(250), 0.0, 100.0), 100.0);
        assert_eq!(clamp(&json!("55.5"), 0.0, 100.0), 55.5);
        assert_eq!(clamp(&Value::Null, 0.0, 100.0), 0.0);
    }

    #[test]
    fn test_clamp_f64_handles_nan_and_infinity() {
        assert_eq!(clamp_f64(f64::NAN, 0.0, 100.0), 0.0);
        assert_eq!(clamp_f64(f64::INFINITY, 0.0, 100.0), 100.0);
        assert_eq!(clamp_f64(f64::NEG_INFINITY, 0.0, 100.0), 0.0);
    }

    #[test]
    fn test_clamp_f64_inverted_bounds_does_not_panic() {
        assert_eq!(clamp_f64(50.0, 100.0, 0.0), 0.0);
    }
}
