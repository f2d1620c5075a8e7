//! # GrblKit Core
//!
//! Core types, coordinate utilities, and errors for GrblKit.
//! Provides the data model shared by the protocol engine and the
//! transport adapters: axes, machine states, coordinate frames, and
//! the conversions between them.

pub mod coords;
pub mod error;
pub mod types;

pub use coords::{
    approx_eq, extract_position, serialize_coordinate, serialize_position, to_machine_coordinate,
    to_work_coordinate,
};
pub use error::{ConnectionError, Error, ProtocolError, Result};
pub use types::{
    ArcMovement, Axis, Coordinate, CoordinateMode, CoordinateOffset, CoordinateSystem,
    DistanceMode, MachineState, Plane, Point, PositionPair, RotationDirection, UnitOfMeasurement,
    MAX_AXES,
};
