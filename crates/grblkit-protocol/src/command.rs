//! GRBL command model
//!
//! Enumerates the supported G-codes, M-codes, and `$` system commands
//! together with their literal wire tokens, plus the handful of wire
//! constants used when composing command arguments. Pure lookup, no
//! state: every command has exactly one token.

use grblkit_core::coords::{serialize_position, FLOAT_PRECISION};
use grblkit_core::PositionPair;
use serde::{Deserialize, Serialize};

/// Feed rate argument indicator.
pub const FEED_RATE_INDICATOR: char = 'F';

/// Arc radius argument indicator.
pub const RADIUS_INDICATOR: char = 'R';

/// Coordinate system argument indicator.
pub const COORDINATE_SYSTEM_INDICATOR: char = 'P';

/// A GRBL/FluidNC command with a fixed wire token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// `?` - realtime status report query
    StatusReport,
    /// `G0` - rapid positioning
    RapidPositioning,
    /// `G1` - linear interpolation at feed rate
    LinearInterpolation,
    /// `G2` - clockwise circular interpolation
    ClockwiseArc,
    /// `G3` - counterclockwise circular interpolation
    CounterClockwiseArc,
    /// `G4` - dwell
    Dwell,
    /// `G10 L2` - set work coordinate offsets (absolute)
    SetWorkCoordinateOffsetsAbsolute,
    /// `G10 L20` - set work coordinate offsets (relative to current position)
    SetWorkCoordinateOffsetsRelative,
    /// `G17` - XY plane selection
    PlaneSelectionXY,
    /// `G18` - ZX plane selection
    PlaneSelectionZX,
    /// `G19` - YZ plane selection
    PlaneSelectionYZ,
    /// `G20` - units in inches
    UnitsInches,
    /// `G21` - units in millimeters
    UnitsMillimeters,
    /// `G53` - move in machine coordinates
    MoveInMachineCoordinates,
    /// `G90` - absolute distance mode
    DistanceModeAbsolute,
    /// `G91` - incremental distance mode
    DistanceModeIncremental,
    /// `G92` - set coordinate offset
    CoordinateOffset,
    /// `G92.1` - clear coordinate system offsets
    ClearCoordinateOffset,
    /// `M3` - spindle on, clockwise
    SpindleOnClockwise,
    /// `M4` - spindle on, counterclockwise
    SpindleOnCounterClockwise,
    /// `M5` - spindle stop
    SpindleStop,
    /// `$H` - run homing cycle
    RunHomingCycle,
    /// `$X` - clear alarm lock
    ClearAlarm,
    /// `$J=` - jogging motion
    Jog,
    /// `$I` - view build info
    ViewBuildInfo,
    /// `$Bye` - reboot the controller (FluidNC)
    Reboot,
    /// Ctrl-X - soft reset
    SoftReset,
    /// `!` - feed hold
    Pause,
    /// `~` - cycle start / resume
    Resume,
}

impl Command {
    /// Literal wire token for this command.
    pub fn token(self) -> &'static str {
        match self {
            Command::StatusReport => "?",
            Command::RapidPositioning => "G0",
            Command::LinearInterpolation => "G1",
            Command::ClockwiseArc => "G2",
            Command::CounterClockwiseArc => "G3",
            Command::Dwell => "G4",
            Command::SetWorkCoordinateOffsetsAbsolute => "G10 L2",
            Command::SetWorkCoordinateOffsetsRelative => "G10 L20",
            Command::PlaneSelectionXY => "G17",
            Command::PlaneSelectionZX => "G18",
            Command::PlaneSelectionYZ => "G19",
            Command::UnitsInches => "G20",
            Command::UnitsMillimeters => "G21",
            Command::MoveInMachineCoordinates => "G53",
            Command::DistanceModeAbsolute => "G90",
            Command::DistanceModeIncremental => "G91",
            Command::CoordinateOffset => "G92",
            Command::ClearCoordinateOffset => "G92.1",
            Command::SpindleOnClockwise => "M3",
            Command::SpindleOnCounterClockwise => "M4",
            Command::SpindleStop => "M5",
            Command::RunHomingCycle => "$H",
            Command::ClearAlarm => "$X",
            Command::Jog => "$J=",
            Command::ViewBuildInfo => "$I",
            Command::Reboot => "$Bye",
            Command::SoftReset => "\u{18}",
            Command::Pause => "!",
            Command::Resume => "~",
        }
    }
}

/// Per-call composer for command lines.
///
/// Appends the command token, indicator-prefixed numeric arguments at
/// fixed 3-decimal precision, and serialized position lists, each token
/// space-terminated. Local to each command method; nothing is shared
/// between calls.
#[derive(Debug, Default)]
pub struct CommandWriter {
    buf: String,
}

impl CommandWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command token.
    pub fn command(&mut self, command: Command) -> &mut Self {
        self.buf.push_str(command.token());
        self.buf.push(' ');
        self
    }

    /// Append a raw token (space-terminated).
    pub fn token(&mut self, token: &str) -> &mut Self {
        self.buf.push_str(token);
        self.buf.push(' ');
        self
    }

    /// Append an indicator-prefixed float at fixed precision.
    pub fn value(&mut self, indicator: char, value: f64) -> &mut Self {
        self.buf.push(indicator);
        self.buf.push_str(&format!("{:.*} ", FLOAT_PRECISION, value));
        self
    }

    /// Append an indicator-prefixed integer.
    pub fn int_value(&mut self, indicator: char, value: i32) -> &mut Self {
        self.buf.push(indicator);
        self.buf.push_str(&format!("{} ", value));
        self
    }

    /// Append a serialized position list (already space-terminated).
    pub fn position(&mut self, position: &[PositionPair]) -> &mut Self {
        self.buf.push_str(&serialize_position(position));
        self
    }

    /// The composed command line.
    pub fn as_str(&self) -> &str {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grblkit_core::Axis;

    #[test]
    fn test_command_tokens() {
        assert_eq!(Command::RapidPositioning.token(), "G0");
        assert_eq!(Command::ClearCoordinateOffset.token(), "G92.1");
        assert_eq!(Command::SetWorkCoordinateOffsetsRelative.token(), "G10 L20");
        assert_eq!(Command::Jog.token(), "$J=");
        assert_eq!(Command::SoftReset.token(), "\u{18}");
    }

    #[test]
    fn test_writer_composition() {
        let mut writer = CommandWriter::new();
        writer
            .command(Command::LinearInterpolation)
            .value(FEED_RATE_INDICATOR, 1000.0)
            .position(&[(Axis::X, 10.0), (Axis::Y, 50.0)]);
        assert_eq!(writer.as_str(), "G1 F1000.000 X10.000 Y50.000 ");
    }

    #[test]
    fn test_writer_int_value() {
        let mut writer = CommandWriter::new();
        writer
            .command(Command::Dwell)
            .int_value(COORDINATE_SYSTEM_INDICATOR, 3);
        assert_eq!(writer.as_str(), "G4 P3 ");
    }
}
