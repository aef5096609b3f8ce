/// Truncate `float` to `decimals` places, rounding toward zero unless `round_up`.
///
/// A bias of a few ulps of the scaled value absorbs representation error so
/// that e.g. `1.9999999999999998` floors to `2.0` rather than `1.9999`. Values
/// genuinely below the next step are never rounded up.
pub fn truncate_float(float: f64, decimals: u32, round_up: bool) -> f64 {
    let pow10 = 10f64.powi(decimals as i32);
    let scaled = float * pow10;
    let bias = scaled.abs().max(1.0) * 4.0 * f64::EPSILON;
    let truncated = if round_up {
        (scaled - bias).ceil()
    } else {
        (scaled + bias).floor()
    };
    truncated / pow10
}

/// Round `float` to the nearest value with `decimals` places
pub fn round_float(float: f64, decimals: u32) -> f64 {
    let pow10 = 10f64.powi(decimals as i32);
    (float * pow10).round() / pow10
}

/// Render a decimal for the wire with exactly `decimals` places
pub fn format_decimal(float: f64, decimals: u32) -> String {
    format!("{:.*}", decimals as usize, float)
}

/// Smallest representable step for `decimals` places
pub fn tick_size(decimals: u32) -> f64 {
    10f64.powi(-(decimals as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_float_floors() {
        assert_eq!(truncate_float(1.23456, 3, false), 1.234);
        assert_eq!(truncate_float(1.23456, 3, true), 1.235);
        assert_eq!(truncate_float(0.00009, 4, false), 0.0);
    }

    #[test]
    fn test_truncate_float_absorbs_representation_error() {
        let value = 0.1 + 0.2; // 0.30000000000000004
        assert_eq!(truncate_float(value, 2, false), 0.3);
        assert_eq!(truncate_float(1.9999999999999998, 4, false), 2.0);
    }

    #[test]
    fn test_truncate_float_near_step_still_floors() {
        // Half a nano-step short of 2.0 is a real shortfall, not noise
        assert_eq!(truncate_float(1.99999999999995, 4, false), 1.9999);
        assert_eq!(truncate_float(0.12349999999, 4, false), 0.1234);
        assert_eq!(truncate_float(1.00000000001, 4, true), 1.0001);
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(102.0, 2), "102.00");
        assert_eq!(format_decimal(1.96078, 4), "1.9608");
        assert_eq!(format_decimal(5.0, 0), "5");
    }

    #[test]
    fn test_tick_size() {
        assert!((tick_size(2) - 0.01).abs() < 1e-12);
        assert_eq!(tick_size(0), 1.0);
    }
}
