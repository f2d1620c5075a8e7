//! Shared data model for the GRBL protocol
//!
//! Axes, machine states, coordinate frames, and the auxiliary G-code
//! argument enums. Token conversions are total: an unrecognized wire
//! token maps to the `Unknown` variant so callers can branch without
//! error handling.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of axes a status report may carry.
pub const MAX_AXES: usize = 6;

/// A position snapshot, one slot per axis, in axis order (X..C).
///
/// Represents either a machine-frame or work-frame position depending
/// on context.
pub type Coordinate = [f64; MAX_AXES];

/// A sparse instruction to move/set a single axis.
pub type PositionPair = (Axis, f64);

/// An (I, J) arc center point.
pub type Point = (f64, f64);

/// A machine axis, also used as its single wire character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
    A,
    B,
    C,
    /// Unrecognized axis character
    Unknown,
}

const AXIS_CHARS: [char; MAX_AXES] = ['X', 'Y', 'Z', 'A', 'B', 'C'];

impl Axis {
    /// Wire character for this axis, `None` for `Unknown`.
    pub fn to_char(self) -> Option<char> {
        match self {
            Axis::Unknown => None,
            _ => Some(AXIS_CHARS[self as usize]),
        }
    }

    /// Parse a wire character; unrecognized input yields `Axis::Unknown`.
    pub fn from_char(c: char) -> Self {
        match c.to_ascii_uppercase() {
            'X' => Axis::X,
            'Y' => Axis::Y,
            'Z' => Axis::Z,
            'A' => Axis::A,
            'B' => Axis::B,
            'C' => Axis::C,
            _ => Axis::Unknown,
        }
    }

    /// Slot index into a [`Coordinate`], `None` for `Unknown`.
    pub fn index(self) -> Option<usize> {
        match self {
            Axis::Unknown => None,
            _ => Some(self as usize),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_char() {
            Some(c) => write!(f, "{}", c),
            None => write!(f, "N/A"),
        }
    }
}

/// Machine state as reported in a status report.
///
/// The engine only observes these; it never forces a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineState {
    Idle,
    Run,
    Hold,
    Jog,
    Alarm,
    Door,
    Check,
    Home,
    Sleep,
    /// Unrecognized state token
    Unknown,
}

const MACHINE_STATE_TOKENS: [(&str, MachineState); 9] = [
    ("Idle", MachineState::Idle),
    ("Run", MachineState::Run),
    ("Hold", MachineState::Hold),
    ("Jog", MachineState::Jog),
    ("Alarm", MachineState::Alarm),
    ("Door", MachineState::Door),
    ("Check", MachineState::Check),
    ("Home", MachineState::Home),
    ("Sleep", MachineState::Sleep),
];

impl MachineState {
    /// Parse a status-report token; unrecognized input yields `Unknown`.
    ///
    /// Sub-state suffixes such as `Hold:0` or `Door:1` match on the part
    /// before the colon.
    pub fn from_token(token: &str) -> Self {
        let base = token.split(':').next().unwrap_or(token);
        MACHINE_STATE_TOKENS
            .iter()
            .find(|(t, _)| *t == base)
            .map(|(_, s)| *s)
            .unwrap_or(MachineState::Unknown)
    }

    /// Wire token for this state, `"N/A"` for `Unknown`.
    pub fn token(self) -> &'static str {
        MACHINE_STATE_TOKENS
            .iter()
            .find(|(_, s)| *s == self)
            .map(|(t, _)| *t)
            .unwrap_or("N/A")
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// Which coordinate frame a status report's position field is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinateMode {
    /// `MPos` - machine frame
    Machine,
    /// `WPos` - work frame
    Work,
    /// `WCO` - work coordinate offset
    WorkCoordinateOffset,
    /// Unrecognized mode token
    Unknown,
}

impl CoordinateMode {
    /// Parse a status-report mode token; unrecognized input yields `Unknown`.
    pub fn from_token(token: &str) -> Self {
        match token {
            "MPos" => CoordinateMode::Machine,
            "WPos" => CoordinateMode::Work,
            "WCO" => CoordinateMode::WorkCoordinateOffset,
            _ => CoordinateMode::Unknown,
        }
    }

    /// Wire token for this mode, `"N/A"` for `Unknown`.
    pub fn token(self) -> &'static str {
        match self {
            CoordinateMode::Machine => "MPos",
            CoordinateMode::Work => "WPos",
            CoordinateMode::WorkCoordinateOffset => "WCO",
            CoordinateMode::Unknown => "N/A",
        }
    }
}

impl fmt::Display for CoordinateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// Unit of measurement (G20/G21).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitOfMeasurement {
    Inches,
    Millimeters,
}

/// Distance mode (G90/G91).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMode {
    Absolute,
    Incremental,
}

/// Arc interpolation direction (G2/G3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArcMovement {
    Clockwise,
    CounterClockwise,
}

/// Whether a work coordinate origin is given absolutely or relative to
/// the current position (G10 L2 / G10 L20).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinateOffset {
    Absolute,
    Relative,
}

/// Work coordinate system slot (G54..G59, addressed as P1..P6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinateSystem {
    P1,
    P2,
    P3,
    P4,
    P5,
    P6,
}

impl CoordinateSystem {
    /// 1-based P number sent on the wire.
    pub fn number(self) -> i32 {
        self as i32 + 1
    }
}

/// Plane selection (G17/G18/G19).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Plane {
    XY,
    ZX,
    YZ,
}

/// Spindle rotation direction (M3/M4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationDirection {
    Clockwise,
    CounterClockwise,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_round_trip() {
        for c in ['X', 'Y', 'Z', 'A', 'B', 'C'] {
            assert_eq!(Axis::from_char(c).to_char(), Some(c));
        }
        assert_eq!(Axis::from_char('x'), Axis::X);
        assert_eq!(Axis::from_char('Q'), Axis::Unknown);
        assert_eq!(Axis::Unknown.to_char(), None);
    }

    #[test]
    fn test_machine_state_tokens() {
        assert_eq!(MachineState::from_token("Idle"), MachineState::Idle);
        assert_eq!(MachineState::from_token("Sleep"), MachineState::Sleep);
        assert_eq!(MachineState::from_token("Hold:0"), MachineState::Hold);
        assert_eq!(MachineState::from_token("Door:3"), MachineState::Door);
        assert_eq!(MachineState::from_token("idle"), MachineState::Unknown);
        assert_eq!(MachineState::from_token(""), MachineState::Unknown);
        assert_eq!(MachineState::Run.token(), "Run");
        assert_eq!(MachineState::Unknown.token(), "N/A");
    }

    #[test]
    fn test_coordinate_mode_tokens() {
        assert_eq!(CoordinateMode::from_token("MPos"), CoordinateMode::Machine);
        assert_eq!(CoordinateMode::from_token("WPos"), CoordinateMode::Work);
        assert_eq!(
            CoordinateMode::from_token("WCO"),
            CoordinateMode::WorkCoordinateOffset
        );
        assert_eq!(CoordinateMode::from_token("mpos"), CoordinateMode::Unknown);
    }

    #[test]
    fn test_coordinate_system_number() {
        assert_eq!(CoordinateSystem::P1.number(), 1);
        assert_eq!(CoordinateSystem::P6.number(), 6);
    }
}
