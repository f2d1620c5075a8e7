//! GRBL protocol engine
//!
//! Owns the input accumulator, drives periodic status polling, decodes
//! controller replies into machine/work coordinate state, and implements
//! the send-and-await-acknowledgement handshake on top of a byte
//! [`Transport`].
//!
//! Single-threaded and cooperative: the host calls [`GrblMachine::update`]
//! from its loop; the engine never spawns tasks. The only call that
//! stalls the caller is the acknowledgement handshake, a bounded polling
//! loop of at most [`COMMAND_RESPONSE_TIMEOUT`].

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use grblkit_core::coords::{approx_eq, extract_position, to_machine_coordinate, to_work_coordinate};
use grblkit_core::{
    ArcMovement, Axis, Coordinate, CoordinateMode, CoordinateOffset, CoordinateSystem,
    DistanceMode, MachineState, Plane, Point, PositionPair, Result, RotationDirection,
    UnitOfMeasurement, MAX_AXES,
};

use crate::command::{
    Command, CommandWriter, COORDINATE_SYSTEM_INDICATOR, FEED_RATE_INDICATOR, RADIUS_INDICATOR,
};
use crate::response::{classify, Response, StatusFields};
use crate::transport::Transport;

/// How long a command handshake waits for an `ok` before giving up.
pub const COMMAND_RESPONSE_TIMEOUT: Duration = Duration::from_millis(100);

/// Wall-clock budget for draining input per `update()` call.
const MAX_DRAIN_DURATION: Duration = Duration::from_millis(100);

/// Floor for the status poll interval; requests below it are clamped up.
const STATUS_REPORT_MIN_INTERVAL: Duration = Duration::from_millis(50);

/// Default status poll interval.
const STATUS_REPORT_DEFAULT_INTERVAL: Duration = Duration::from_millis(200);

type PositionCallback = Box<dyn FnMut(MachineState, CoordinateMode, &Coordinate)>;
type StateChangeCallback = Box<dyn FnMut(MachineState, MachineState)>;
type LineCallback = Box<dyn FnMut(&str)>;

/// One in-flight acknowledgement handshake.
///
/// Waiters form a FIFO: line processing completes the oldest pending
/// slot on `ok`/`error`. The `&mut self` receivers already serialize
/// handshakes, so the queue is the ordering mechanism rather than a
/// concurrency guard.
#[derive(Debug)]
struct AckWaiter {
    id: u64,
    acknowledged: Option<bool>,
}

/// Client-side protocol engine for a GRBL/FluidNC controller.
pub struct GrblMachine {
    transport: Box<dyn Transport>,
    pending: String,
    machine_state: MachineState,
    machine_coordinate: Coordinate,
    work_coordinate: Coordinate,
    work_coordinate_offset: Coordinate,
    current_feed_rate: f64,
    current_spindle_speed: u32,
    status_report_interval: Duration,
    last_status_report_at: Option<Instant>,
    ack_waiters: VecDeque<AckWaiter>,
    next_waiter_id: u64,
    on_position_updated: Option<PositionCallback>,
    on_machine_state_changed: Option<StateChangeCallback>,
    on_response: Option<LineCallback>,
    on_gcode_sent: Option<LineCallback>,
}

impl GrblMachine {
    /// Create an engine over a transport. State lives for the duration
    /// of the connection; reconnecting is the transport's decision.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            pending: String::new(),
            machine_state: MachineState::Unknown,
            machine_coordinate: [0.0; MAX_AXES],
            work_coordinate: [0.0; MAX_AXES],
            work_coordinate_offset: [0.0; MAX_AXES],
            current_feed_rate: 0.0,
            current_spindle_speed: 0,
            status_report_interval: STATUS_REPORT_DEFAULT_INTERVAL,
            last_status_report_at: None,
            ack_waiters: VecDeque::new(),
            next_waiter_id: 0,
            on_position_updated: None,
            on_machine_state_changed: None,
            on_response: None,
            on_gcode_sent: None,
        }
    }

    // --- Observers -------------------------------------------------------

    /// Observer fired after a status report updates a coordinate frame,
    /// with the snapshot that was just decoded.
    pub fn on_position_updated(
        &mut self,
        callback: impl FnMut(MachineState, CoordinateMode, &Coordinate) + 'static,
    ) {
        self.on_position_updated = Some(Box::new(callback));
    }

    /// Observer fired with (previous, current) before the stored machine
    /// state is overwritten.
    pub fn on_machine_state_changed(
        &mut self,
        callback: impl FnMut(MachineState, MachineState) + 'static,
    ) {
        self.on_machine_state_changed = Some(Box::new(callback));
    }

    /// Observer fired with each raw trimmed line about to be processed.
    /// Side-channel for logging/UI; must not call back into the engine.
    pub fn on_response(&mut self, callback: impl FnMut(&str) + 'static) {
        self.on_response = Some(Box::new(callback));
    }

    /// Observer fired with each command line about to be sent.
    pub fn on_gcode_sent(&mut self, callback: impl FnMut(&str) + 'static) {
        self.on_gcode_sent = Some(Box::new(callback));
    }

    // --- Framing ---------------------------------------------------------

    /// Feed one received byte into the accumulator. A newline terminates
    /// the current line and triggers processing.
    pub fn encode_byte(&mut self, byte: u8) {
        self.pending.push(byte as char);

        if byte == b'\n' {
            self.process_pending_line();
        }
    }

    /// Feed a chunk of received text. Processes every complete line it
    /// contains; observable behavior is identical to feeding the same
    /// bytes one at a time.
    pub fn encode(&mut self, data: &str) {
        let mut rest = data;
        while !rest.is_empty() {
            match rest.find('\n') {
                Some(pos) => {
                    self.pending.push_str(&rest[..=pos]);
                    self.process_pending_line();
                    rest = &rest[pos + 1..];
                }
                None => {
                    self.pending.push_str(rest);
                    break;
                }
            }
        }
    }

    /// Raw undelimited bytes received since the last processed line.
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Process and clear the accumulated line.
    fn process_pending_line(&mut self) {
        let raw = std::mem::take(&mut self.pending);
        let line = raw.trim();

        if let Some(callback) = self.on_response.as_mut() {
            callback(line);
        }

        if line.is_empty() {
            return;
        }

        match classify(line) {
            Some(Response::Ok) => self.complete_oldest_waiter(true),
            Some(Response::Error) => {
                tracing::warn!(line, "command rejected by controller");
                self.complete_oldest_waiter(false);
            }
            Some(Response::Status(fields)) => self.apply_status(&fields),
            None => {
                // Controllers emit banners and informational messages;
                // not an error.
                tracing::debug!(line, "dropping unrecognized line");
            }
        }
    }

    /// Apply one classified status report to engine state.
    ///
    /// Token validation happens before any coordinate write so a bad
    /// report never leaves partially-applied state.
    fn apply_status(&mut self, fields: &StatusFields<'_>) {
        let next_state = MachineState::from_token(fields.state);
        if next_state == MachineState::Unknown {
            tracing::debug!(token = fields.state, "unrecognized machine state");
            return;
        }

        let mode = CoordinateMode::from_token(fields.mode);
        if mode == CoordinateMode::Unknown {
            tracing::debug!(token = fields.mode, "unrecognized coordinate mode");
            return;
        }

        if next_state != self.machine_state {
            let previous = self.machine_state;
            if let Some(callback) = self.on_machine_state_changed.as_mut() {
                callback(previous, next_state);
            }
        }
        self.machine_state = next_state;

        let snapshot = match mode {
            CoordinateMode::Machine => {
                extract_position(fields.positions, &mut self.machine_coordinate);
                self.recompute_work_frame();
                self.machine_coordinate
            }
            CoordinateMode::Work => {
                extract_position(fields.positions, &mut self.work_coordinate);
                for i in 0..MAX_AXES {
                    self.machine_coordinate[i] = to_machine_coordinate(
                        self.work_coordinate[i],
                        self.work_coordinate_offset[i],
                    );
                }
                self.work_coordinate
            }
            CoordinateMode::WorkCoordinateOffset => {
                extract_position(fields.positions, &mut self.work_coordinate_offset);
                self.recompute_work_frame();
                self.work_coordinate_offset
            }
            CoordinateMode::Unknown => unreachable!("rejected above"),
        };

        if let Some(feed_rate) = fields.feed_rate {
            self.current_feed_rate = feed_rate;
        }
        if let Some(spindle_speed) = fields.spindle_speed {
            self.current_spindle_speed = spindle_speed;
        }
        if let Some(offset) = fields.offset {
            extract_position(offset, &mut self.work_coordinate_offset);
            self.recompute_work_frame();
        }

        if let Some(callback) = self.on_position_updated.as_mut() {
            callback(next_state, mode, &snapshot);
        }
    }

    fn recompute_work_frame(&mut self) {
        for i in 0..MAX_AXES {
            self.work_coordinate[i] =
                to_work_coordinate(self.machine_coordinate[i], self.work_coordinate_offset[i]);
        }
    }

    // --- Polling ---------------------------------------------------------

    /// Drive the engine: request a status report when the poll interval
    /// has elapsed, then drain available input within a bounded budget.
    /// Non-blocking; call repeatedly from the host loop.
    pub fn update(&mut self) {
        let poll_due = self
            .last_status_report_at
            .map_or(true, |at| at.elapsed() >= self.status_report_interval);

        if poll_due {
            // Fire-and-forget: a poll must never burn the handshake wait.
            if let Err(error) = self.send_command(Command::StatusReport) {
                tracing::error!(%error, "status poll failed");
            }
            self.last_status_report_at = Some(Instant::now());
        }

        self.drain_incoming();
    }

    /// Drain currently available bytes, bounded so a burst of input
    /// cannot starve the host loop. Leftover bytes are picked up on the
    /// next call.
    fn drain_incoming(&mut self) {
        let started = Instant::now();
        while self.transport.available() > 0 && started.elapsed() < MAX_DRAIN_DURATION {
            match self.transport.read_byte() {
                Some(byte) => self.encode_byte(byte),
                None => break,
            }
        }
    }

    /// Set the status poll interval. Requests below the 50 ms floor are
    /// clamped up.
    pub fn set_status_report_interval(&mut self, interval: Duration) {
        self.status_report_interval = interval.max(STATUS_REPORT_MIN_INTERVAL);
    }

    // --- Sending ---------------------------------------------------------

    /// Send a command without waiting for acknowledgement.
    pub fn send_command(&mut self, command: Command) -> Result<()> {
        self.send_raw(command.token())
    }

    /// Send raw command text (newline-terminated on the wire) without
    /// waiting for acknowledgement.
    pub fn send_raw(&mut self, command: &str) -> Result<()> {
        if let Some(callback) = self.on_gcode_sent.as_mut() {
            callback(command);
        }

        // One buffer per line so frame-oriented transports send a
        // single message.
        let mut line = String::with_capacity(command.len() + 1);
        line.push_str(command);
        line.push('\n');
        self.transport.write_all(line.as_bytes())
    }

    /// Send a command and wait up to 100 ms for acknowledgement.
    pub fn send_command_expecting_ok(&mut self, command: Command) -> bool {
        self.send_raw_expecting_ok(command.token())
    }

    /// Send raw command text and busy-poll the transport until an `ok`
    /// arrives (true), an `error` arrives (false), or the timeout
    /// elapses (false). Status reports interleaved with the
    /// acknowledgement are decoded and dispatched as usual.
    pub fn send_raw_expecting_ok(&mut self, command: &str) -> bool {
        if let Err(error) = self.send_raw(command) {
            tracing::error!(%error, command, "failed to send command");
            return false;
        }

        let ticket = self.enqueue_waiter();
        let sent_at = Instant::now();
        let mut outcome = None;

        while outcome.is_none() && sent_at.elapsed() < COMMAND_RESPONSE_TIMEOUT {
            if self.transport.available() > 0 {
                if let Some(byte) = self.transport.read_byte() {
                    self.encode_byte(byte);
                }
            }
            outcome = self.waiter_outcome(ticket);
        }

        self.discard_waiter(ticket);
        outcome.unwrap_or(false)
    }

    fn send_writer_expecting_ok(&mut self, writer: &CommandWriter) -> bool {
        self.send_raw_expecting_ok(writer.as_str())
    }

    fn enqueue_waiter(&mut self) -> u64 {
        let id = self.next_waiter_id;
        self.next_waiter_id += 1;
        self.ack_waiters.push_back(AckWaiter {
            id,
            acknowledged: None,
        });
        id
    }

    fn complete_oldest_waiter(&mut self, acknowledged: bool) {
        if let Some(waiter) = self
            .ack_waiters
            .iter_mut()
            .find(|waiter| waiter.acknowledged.is_none())
        {
            waiter.acknowledged = Some(acknowledged);
        }
    }

    fn waiter_outcome(&self, id: u64) -> Option<bool> {
        self.ack_waiters
            .iter()
            .find(|waiter| waiter.id == id)
            .and_then(|waiter| waiter.acknowledged)
    }

    fn discard_waiter(&mut self, id: u64) {
        self.ack_waiters.retain(|waiter| waiter.id != id);
    }

    // --- G-codes ---------------------------------------------------------

    /// G20/G21
    pub fn set_unit_of_measurement(&mut self, unit: UnitOfMeasurement) -> bool {
        let command = match unit {
            UnitOfMeasurement::Inches => Command::UnitsInches,
            UnitOfMeasurement::Millimeters => Command::UnitsMillimeters,
        };
        self.send_command_expecting_ok(command)
    }

    /// G90/G91
    pub fn set_distance_mode(&mut self, distance_mode: DistanceMode) -> bool {
        let command = match distance_mode {
            DistanceMode::Absolute => Command::DistanceModeAbsolute,
            DistanceMode::Incremental => Command::DistanceModeIncremental,
        };
        self.send_command_expecting_ok(command)
    }

    /// G92
    pub fn set_coordinate_offset(&mut self, position: &[PositionPair]) -> bool {
        let mut writer = CommandWriter::new();
        writer.command(Command::CoordinateOffset).position(position);
        self.send_writer_expecting_ok(&writer)
    }

    /// G92.1
    pub fn clear_coordinate_offset(&mut self) -> bool {
        self.send_command_expecting_ok(Command::ClearCoordinateOffset)
    }

    /// G0
    pub fn linear_rapid_positioning(&mut self, position: &[PositionPair]) -> bool {
        let mut writer = CommandWriter::new();
        writer.command(Command::RapidPositioning).position(position);
        self.send_writer_expecting_ok(&writer)
    }

    /// G1
    pub fn linear_interpolation_positioning(
        &mut self,
        feed_rate: f64,
        position: &[PositionPair],
    ) -> bool {
        let mut writer = CommandWriter::new();
        writer
            .command(Command::LinearInterpolation)
            .value(FEED_RATE_INDICATOR, feed_rate)
            .position(position);
        self.send_writer_expecting_ok(&writer)
    }

    /// G53
    pub fn linear_positioning_in_machine_coordinates(
        &mut self,
        position: &[PositionPair],
    ) -> bool {
        let mut writer = CommandWriter::new();
        writer
            .command(Command::MoveInMachineCoordinates)
            .position(position);
        self.send_writer_expecting_ok(&writer)
    }

    /// G2/G3 with a radius argument.
    pub fn arc_positioning_radius(
        &mut self,
        direction: ArcMovement,
        end_position: &[PositionPair],
        radius: f64,
        feed_rate: f64,
    ) -> bool {
        let mut writer = CommandWriter::new();
        writer
            .command(arc_command(direction))
            .position(end_position)
            .value(RADIUS_INDICATOR, radius)
            .value(FEED_RATE_INDICATOR, feed_rate);
        self.send_writer_expecting_ok(&writer)
    }

    /// G2/G3 with an (I, J) center point.
    pub fn arc_positioning_center(
        &mut self,
        direction: ArcMovement,
        end_position: &[PositionPair],
        center_point: Point,
        feed_rate: f64,
    ) -> bool {
        let mut writer = CommandWriter::new();
        writer
            .command(arc_command(direction))
            .position(end_position)
            .value('I', center_point.0)
            .value('J', center_point.1)
            .value(FEED_RATE_INDICATOR, feed_rate);
        self.send_writer_expecting_ok(&writer)
    }

    /// G4
    pub fn dwell(&mut self, duration_seconds: u16) -> bool {
        let mut writer = CommandWriter::new();
        writer
            .command(Command::Dwell)
            .int_value('P', i32::from(duration_seconds));
        self.send_writer_expecting_ok(&writer)
    }

    /// G10 L2 / G10 L20
    pub fn set_coordinate_system_origin(
        &mut self,
        coordinate_offset: CoordinateOffset,
        coordinate_system: CoordinateSystem,
        position: &[PositionPair],
    ) -> bool {
        let command = match coordinate_offset {
            CoordinateOffset::Absolute => Command::SetWorkCoordinateOffsetsAbsolute,
            CoordinateOffset::Relative => Command::SetWorkCoordinateOffsetsRelative,
        };

        let mut writer = CommandWriter::new();
        writer
            .command(command)
            .int_value(COORDINATE_SYSTEM_INDICATOR, coordinate_system.number())
            .position(position);
        self.send_writer_expecting_ok(&writer)
    }

    /// G17/G18/G19
    pub fn set_plane(&mut self, plane: Plane) -> bool {
        let command = match plane {
            Plane::XY => Command::PlaneSelectionXY,
            Plane::ZX => Command::PlaneSelectionZX,
            Plane::YZ => Command::PlaneSelectionYZ,
        };
        self.send_command_expecting_ok(command)
    }

    // --- M-codes ---------------------------------------------------------

    /// M3/M4
    pub fn spindle_on(&mut self, direction: RotationDirection) -> bool {
        let command = match direction {
            RotationDirection::Clockwise => Command::SpindleOnClockwise,
            RotationDirection::CounterClockwise => Command::SpindleOnCounterClockwise,
        };
        self.send_command_expecting_ok(command)
    }

    /// M5
    pub fn spindle_off(&mut self) -> bool {
        self.send_command_expecting_ok(Command::SpindleStop)
    }

    // --- $ and realtime commands ----------------------------------------

    /// `$Bye` (FluidNC)
    pub fn reboot(&mut self) -> bool {
        self.send_command_expecting_ok(Command::Reboot)
    }

    /// Ctrl-X
    pub fn soft_reset(&mut self) -> bool {
        self.send_command_expecting_ok(Command::SoftReset)
    }

    /// `!`
    pub fn pause(&mut self) -> bool {
        self.send_command_expecting_ok(Command::Pause)
    }

    /// `~`
    pub fn resume(&mut self) -> bool {
        self.send_command_expecting_ok(Command::Resume)
    }

    /// `$H`, all axes. Homing can outlast the acknowledgement window by
    /// a wide margin, so this is fire-and-forget.
    pub fn run_homing_cycle(&mut self) -> Result<()> {
        self.send_command(Command::RunHomingCycle)
    }

    /// `$H<axis>`, single axis.
    pub fn run_homing_cycle_axis(&mut self, axis: Axis) -> bool {
        let Some(axis_char) = axis.to_char() else {
            return false;
        };

        let command = format!("{}{}", Command::RunHomingCycle.token(), axis_char);
        self.send_raw_expecting_ok(&command)
    }

    /// `$I`
    pub fn view_build_info(&mut self) -> bool {
        self.send_command_expecting_ok(Command::ViewBuildInfo)
    }

    /// `$X`
    pub fn clear_alarm(&mut self) -> bool {
        self.send_command_expecting_ok(Command::ClearAlarm)
    }

    /// `$J=`
    pub fn jog(&mut self, feed_rate: f64, position: &[PositionPair]) -> bool {
        let mut writer = CommandWriter::new();
        writer
            .command(Command::Jog)
            .value(FEED_RATE_INDICATOR, feed_rate)
            .position(position);
        self.send_writer_expecting_ok(&writer)
    }

    // --- State accessors -------------------------------------------------

    /// Last observed machine state.
    pub fn machine_state(&self) -> MachineState {
        self.machine_state
    }

    /// Current position in the machine frame.
    pub fn machine_coordinate(&self) -> &Coordinate {
        &self.machine_coordinate
    }

    /// Machine-frame position of one axis; 0.0 for `Axis::Unknown`.
    pub fn machine_coordinate_axis(&self, axis: Axis) -> f64 {
        axis.index()
            .map_or(0.0, |i| self.machine_coordinate[i])
    }

    /// Current position in the work frame.
    pub fn work_coordinate(&self) -> &Coordinate {
        &self.work_coordinate
    }

    /// Work-frame position of one axis; 0.0 for `Axis::Unknown`.
    pub fn work_coordinate_axis(&self, axis: Axis) -> f64 {
        axis.index().map_or(0.0, |i| self.work_coordinate[i])
    }

    /// Current work coordinate offset.
    pub fn work_coordinate_offset(&self) -> &Coordinate {
        &self.work_coordinate_offset
    }

    /// Offset of one axis; 0.0 for `Axis::Unknown`.
    pub fn work_coordinate_offset_axis(&self, axis: Axis) -> f64 {
        axis.index()
            .map_or(0.0, |i| self.work_coordinate_offset[i])
    }

    /// Feed rate from the most recent `FS:` status segment.
    pub fn current_feed_rate(&self) -> f64 {
        self.current_feed_rate
    }

    /// Spindle speed from the most recent `FS:` status segment.
    pub fn current_spindle_speed(&self) -> u32 {
        self.current_spindle_speed
    }

    /// Whether the machine frame matches every given pair within
    /// floating-point tolerance.
    pub fn machine_is_at(&self, position: &[PositionPair]) -> bool {
        position
            .iter()
            .all(|&(axis, value)| approx_eq(self.machine_coordinate_axis(axis), value))
    }
}

fn arc_command(direction: ArcMovement) -> Command {
    match direction {
        ArcMovement::Clockwise => Command::ClockwiseArc,
        ArcMovement::CounterClockwise => Command::CounterClockwiseArc,
    }
}
