//! Display precision handling
//!
//! Values are truncated toward zero, never rounded, so a gauge showing one
//! decimal never claims a reading the sensor has not reached yet.

/// Slack applied before truncating so binary float artifacts
/// (0.29 * 100 = 28.999999999999996) do not lose a digit
const TRUNCATION_EPSILON: f64 = 1e-9;

/// Truncate a value to `precision` decimal places
///
/// # Examples
/// - 0.299 at 2 → 0.29
/// - -1.57 at 1 → -1.5
/// - 1726.75 at 0 → 1726
pub fn truncate_to_precision(value: f64, precision: u8) -> f64 {
    if !value.is_finite() {
        return value;
    }

    let factor = 10_f64.powi(precision as i32);
    let scaled = value * factor;
    let truncated = (scaled + scaled.signum() * TRUNCATION_EPSILON).trunc() / factor;

    // keep -0.0 out of displays
    if truncated == 0.0 {
        0.0
    } else {
        truncated
    }
}

/// Format a value with exactly `precision` decimals after truncation
pub fn format_truncated(value: f64, precision: u8) -> String {
    format!(
        "{:.*}",
        precision as usize,
        truncate_to_precision(value, precision)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncates_not_rounds() {
        assert_eq!(truncate_to_precision(0.299, 2), 0.29);
        assert_eq!(truncate_to_precision(1726.75, 0), 1726.0);
        assert_eq!(truncate_to_precision(14.19, 1), 14.1);
    }

    #[test]
    fn test_negative_truncates_toward_zero() {
        assert_eq!(truncate_to_precision(-1.57, 1), -1.5);
        assert_eq!(truncate_to_precision(-14.355, 2), -14.35);
    }

    #[test]
    fn test_float_artifacts_survive() {
        assert_eq!(truncate_to_precision(0.29, 2), 0.29);
        assert_eq!(truncate_to_precision(100.0 * 0.145 - 14.5, 2), 0.0);
        assert_eq!(truncate_to_precision(14.1, 1), 14.1);
    }

    #[test]
    fn test_negative_zero_normalized() {
        let v = truncate_to_precision(-0.04, 1);
        assert_eq!(v, 0.0);
        assert!(v.is_sign_positive());
    }

    #[test]
    fn test_non_finite_passthrough() {
        assert_eq!(truncate_to_precision(f64::INFINITY, 2), f64::INFINITY);
        assert!(truncate_to_precision(f64::NAN, 2).is_nan());
    }

    #[test]
    fn test_format_truncated() {
        assert_eq!(format_truncated(0.299, 2), "0.29");
        assert_eq!(format_truncated(12.0, 1), "12.0");
        assert_eq!(format_truncated(-0.04, 1), "0.0");
    }
}
