//! Coordinate frame conversions and position serialization
//!
//! Pure helpers shared by the protocol engine: machine↔work frame
//! transforms under a work coordinate offset, parsing of the
//! comma-separated position lists found in status reports, and the
//! fixed-precision serialization used to build command arguments.

use crate::types::{Coordinate, PositionPair, MAX_AXES};

/// Wire separator between position values.
pub const VALUE_SEPARATOR: char = ',';

/// Fixed number of decimal places for serialized floats.
pub const FLOAT_PRECISION: usize = 3;

/// Tolerance for position comparisons.
const POSITION_EPSILON: f64 = 1e-6;

/// WPos = MPos - WCO
pub fn to_work_coordinate(machine_coordinate: f64, offset: f64) -> f64 {
    machine_coordinate - offset
}

/// MPos = WPos + WCO
pub fn to_machine_coordinate(work_coordinate: f64, offset: f64) -> f64 {
    work_coordinate + offset
}

/// Approximate float equality for position comparisons.
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < POSITION_EPSILON
}

/// Parse a comma-separated position list into `coordinate` by slot index.
///
/// A list carrying more values than [`MAX_AXES`] is treated as malformed
/// and the call is a no-op. An empty field leaves its slot untouched. A
/// field that fails numeric parsing stops extraction; slots already
/// written are kept.
pub fn extract_position(text: &str, coordinate: &mut Coordinate) {
    let value_count = text.matches(VALUE_SEPARATOR).count() + 1;
    if value_count > MAX_AXES {
        return;
    }

    for (i, field) in text.split(VALUE_SEPARATOR).enumerate() {
        if field.is_empty() {
            continue;
        }

        match field.trim().parse::<f64>() {
            Ok(value) => coordinate[i] = value,
            Err(_) => return,
        }
    }
}

/// Render a sparse position list as `<AxisChar><value> ` tokens in input
/// order, each space-terminated, values at fixed 3-decimal precision.
/// Pairs addressing `Axis::Unknown` are skipped.
pub fn serialize_position(position: &[PositionPair]) -> String {
    let mut out = String::new();
    for (axis, value) in position {
        if let Some(c) = axis.to_char() {
            out.push(c);
            out.push_str(&format!("{:.*} ", FLOAT_PRECISION, value));
        }
    }
    out
}

/// Render a full coordinate snapshot as axis-prefixed tokens.
pub fn serialize_coordinate(coordinate: &Coordinate) -> String {
    let mut out = String::new();
    for (i, value) in coordinate.iter().enumerate().take(MAX_AXES) {
        out.push(['X', 'Y', 'Z', 'A', 'B', 'C'][i]);
        out.push_str(&format!("{:.*} ", FLOAT_PRECISION, value));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Axis;
    use proptest::prelude::*;

    #[test]
    fn test_frame_conversions() {
        assert_eq!(to_work_coordinate(10.0, 4.0), 6.0);
        assert_eq!(to_machine_coordinate(6.0, 4.0), 10.0);
    }

    proptest! {
        #[test]
        fn prop_frame_round_trip(value in -10_000.0f64..10_000.0, offset in -10_000.0f64..10_000.0) {
            let machine = to_machine_coordinate(value, offset);
            prop_assert!(approx_eq(to_work_coordinate(machine, offset), value));
        }
    }

    #[test]
    fn test_extract_position_basic() {
        let mut coordinate = [0.0; MAX_AXES];
        extract_position("10,20.5,-30", &mut coordinate);
        assert_eq!(coordinate, [10.0, 20.5, -30.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_extract_position_too_many_values_is_noop() {
        let mut coordinate = [1.0; MAX_AXES];
        extract_position("1,2,3,4,5,6,7", &mut coordinate);
        assert_eq!(coordinate, [1.0; MAX_AXES]);
    }

    #[test]
    fn test_extract_position_empty_field_keeps_slot() {
        let mut coordinate = [9.0; MAX_AXES];
        extract_position("12,,34", &mut coordinate);
        assert_eq!(coordinate, [12.0, 9.0, 34.0, 9.0, 9.0, 9.0]);
    }

    #[test]
    fn test_extract_position_stops_at_bad_value() {
        let mut coordinate = [0.0; MAX_AXES];
        extract_position("1.5,abc,3", &mut coordinate);
        assert_eq!(coordinate, [1.5, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_serialize_position_format() {
        let position = [(Axis::X, 10.0), (Axis::Y, 50.0)];
        assert_eq!(serialize_position(&position), "X10.000 Y50.000 ");
    }

    #[test]
    fn test_serialize_position_skips_unknown_axis() {
        let position = [(Axis::Unknown, 1.0), (Axis::Z, -0.5)];
        assert_eq!(serialize_position(&position), "Z-0.500 ");
    }

    #[test]
    fn test_serialize_coordinate() {
        let coordinate = [1.0, 2.0, 3.0, 0.0, 0.0, 0.0];
        assert_eq!(
            serialize_coordinate(&coordinate),
            "X1.000 Y2.000 Z3.000 A0.000 B0.000 C0.000 "
        );
    }
}
