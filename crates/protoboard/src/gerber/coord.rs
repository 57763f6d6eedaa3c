/// Coordinate format from the %FS (Format Specification) command.
///
/// Example: `%FSLAX46Y46*%` means leading-zero suppression, absolute mode,
/// 4 integer digits + 6 decimal digits for both X and Y.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateFormat {
    pub x_integer: u8,
    pub x_decimal: u8,
    pub y_integer: u8,
    pub y_decimal: u8,
}

impl Default for CoordinateFormat {
    fn default() -> Self {
        // Everything this crate writes uses 4.6
        Self {
            x_integer: 4,
            x_decimal: 6,
            y_integer: 4,
            y_decimal: 6,
        }
    }
}

/// Raw units per millimeter in the 4.6 format.
pub const SCALE: f64 = 1_000_000.0;

/// Width of a formatted coordinate field, sign included.
pub const FIELD_WIDTH: usize = 9;

/// Largest magnitude, in mm, the 4.6 format can carry.
pub const MAX_COORDINATE_MM: f64 = 9999.999999;

/// Slack (in raw units) that keeps decimal inputs like `1.234567` from
/// truncating to `1234566` because of binary representation error.
const TRUNCATION_GUARD: f64 = 1e-3;

/// Encode millimeters as a raw 4.6 coordinate, truncating toward zero.
pub fn encode(mm: f64) -> i64 {
    let scaled = mm * SCALE;
    (scaled + scaled.signum() * TRUNCATION_GUARD).trunc() as i64
}

/// Format a raw coordinate as a zero-padded field.
pub fn format_coordinate(raw: i64) -> String {
    format!("{raw:0width$}", width = FIELD_WIDTH)
}

/// Converts raw Gerber integer coordinates to millimeters.
#[derive(Debug, Clone, Default)]
pub struct CoordinateConverter {
    pub format: CoordinateFormat,
}

impl CoordinateConverter {
    /// Convert a raw Gerber coordinate integer to mm.
    ///
    /// The raw value is an integer where the last N digits are the decimal part,
    /// as specified by the format. With the 4.6 format, 1234567 means 1.234567.
    pub fn to_mm(&self, raw: i64, is_x: bool) -> f64 {
        let decimal_digits = if is_x {
            self.format.x_decimal
        } else {
            self.format.y_decimal
        };
        raw as f64 / 10f64.powi(decimal_digits as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_truncates_toward_zero() {
        assert_eq!(encode(1.0000009), 1_000_000);
        assert_eq!(encode(-1.0000009), -1_000_000);
        assert_eq!(encode(0.0000009), 0);
    }

    #[test]
    fn test_encode_decimal_inputs_exactly() {
        assert_eq!(encode(1.234567), 1_234_567);
        assert_eq!(encode(2.54), 2_540_000);
        assert_eq!(encode(0.3), 300_000);
        assert_eq!(encode(-0.75), -750_000);
    }

    #[test]
    fn test_format_coordinate() {
        assert_eq!(format_coordinate(1_270_000), "001270000");
        assert_eq!(format_coordinate(0), "000000000");
        assert_eq!(format_coordinate(-750_000), "-00750000");
        assert_eq!(format_coordinate(encode(MAX_COORDINATE_MM)), "9999999999");
    }

    #[test]
    fn test_decimal_values_survive_encode_decode() {
        let conv = CoordinateConverter::default();
        for v in [0.0, 1.234567, -3.81, 10.16, 0.000001, 123.456789, -0.038] {
            let raw = encode(v);
            let back = conv.to_mm(raw, true);
            assert_eq!(back, v, "value {v} did not survive encoding");
            assert_eq!(encode(back), raw);
        }
    }

    #[test]
    fn test_default_format_mm() {
        let conv = CoordinateConverter::default();
        // FSLAX46Y46, MM: raw 1000000 = 1.000000 mm
        assert!((conv.to_mm(1_000_000, true) - 1.0).abs() < 1e-9);
        assert!((conv.to_mm(1_000_000, false) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_negative_coordinate() {
        let conv = CoordinateConverter::default();
        assert!((conv.to_mm(-2_500_000, true) - (-2.5)).abs() < 1e-9);
    }
}
