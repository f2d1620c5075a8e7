use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use grblkit_core::{Axis, CoordinateMode, MachineState};
use grblkit_protocol::{GrblMachine, Transport};
use proptest::prelude::*;

// Mock transport for testing
struct MockTransport {
    sent: Arc<Mutex<Vec<u8>>>,
    incoming: Arc<Mutex<VecDeque<u8>>>,
}

impl Transport for MockTransport {
    fn available(&mut self) -> usize {
        self.incoming.lock().unwrap().len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.incoming.lock().unwrap().pop_front()
    }

    fn write_byte(&mut self, byte: u8) -> grblkit_core::Result<()> {
        self.sent.lock().unwrap().push(byte);
        Ok(())
    }
}

struct TestIo {
    sent: Arc<Mutex<Vec<u8>>>,
    incoming: Arc<Mutex<VecDeque<u8>>>,
}

impl TestIo {
    fn queue_response(&self, text: &str) {
        self.incoming.lock().unwrap().extend(text.bytes());
    }

    fn sent_lines(&self) -> Vec<String> {
        let sent = self.sent.lock().unwrap();
        String::from_utf8_lossy(&sent)
            .split('\n')
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn machine_with_mock() -> (GrblMachine, TestIo) {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let incoming = Arc::new(Mutex::new(VecDeque::new()));

    let transport = MockTransport {
        sent: Arc::clone(&sent),
        incoming: Arc::clone(&incoming),
    };

    (
        GrblMachine::new(Box::new(transport)),
        TestIo { sent, incoming },
    )
}

#[test]
fn test_partial_line_accumulates_without_event() {
    let (mut machine, _io) = machine_with_mock();

    let lines = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&lines);
    machine.on_response(move |line| seen.lock().unwrap().push(line.to_string()));

    machine.encode("foo");

    assert_eq!(machine.pending(), "foo");
    assert!(lines.lock().unwrap().is_empty());
}

#[test]
fn test_terminated_line_fires_one_event() {
    let (mut machine, _io) = machine_with_mock();

    let lines = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&lines);
    machine.on_response(move |line| seen.lock().unwrap().push(line.to_string()));

    machine.encode("foo\r\n");

    assert_eq!(machine.pending(), "");
    assert_eq!(*lines.lock().unwrap(), vec!["foo".to_string()]);
}

#[test]
fn test_chunk_with_noise_and_trailing_fragment() {
    let (mut machine, _io) = machine_with_mock();

    let lines = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&lines);
    machine.on_response(move |line| seen.lock().unwrap().push(line.to_string()));

    machine.encode("\r  \n   TEST   \n\r");

    // Lines are surfaced trimmed; the stray trailing CR stays buffered
    // until a newline arrives.
    assert_eq!(
        *lines.lock().unwrap(),
        vec![String::new(), "TEST".to_string()]
    );
    assert_eq!(machine.pending(), "\r");
}

#[test]
fn test_byte_and_chunk_feeding_are_equivalent() {
    let data = "ok\r\n<Idle|MPos:1.000,2.000,3.000>\r\npartial";

    let (mut by_chunk, _io1) = machine_with_mock();
    by_chunk.encode(data);

    let (mut by_byte, _io2) = machine_with_mock();
    for byte in data.bytes() {
        by_byte.encode_byte(byte);
    }

    assert_eq!(by_chunk.machine_state(), by_byte.machine_state());
    assert_eq!(by_chunk.machine_coordinate(), by_byte.machine_coordinate());
    assert_eq!(by_chunk.pending(), by_byte.pending());
    assert_eq!(by_chunk.pending(), "partial");
}

#[test]
fn test_machine_position_report_updates_both_frames() {
    let (mut machine, _io) = machine_with_mock();

    machine.encode("<Idle|MPos:10.000,20.000,30.000>\n");

    assert_eq!(machine.machine_state(), MachineState::Idle);
    assert_eq!(machine.machine_coordinate_axis(Axis::X), 10.0);
    assert_eq!(machine.machine_coordinate_axis(Axis::Y), 20.0);
    assert_eq!(machine.machine_coordinate_axis(Axis::Z), 30.0);
    // No offset yet, so the work frame tracks the machine frame.
    assert_eq!(machine.work_coordinate_axis(Axis::X), 10.0);
}

#[test]
fn test_work_position_report_derives_machine_frame() {
    let (mut machine, _io) = machine_with_mock();

    machine.encode("<Idle|MPos:0,0,0|WCO:5.000,0.000,0.000>\n");
    machine.encode("<Run|WPos:10.000,20.000,30.000>\n");

    assert_eq!(machine.work_coordinate_axis(Axis::X), 10.0);
    assert_eq!(machine.machine_coordinate_axis(Axis::X), 15.0);
    assert_eq!(machine.machine_coordinate_axis(Axis::Y), 20.0);
}

#[test]
fn test_wco_segment_rebases_work_frame() {
    let (mut machine, _io) = machine_with_mock();

    machine.encode("<Idle|MPos:10.000,0.000,0.000|WCO:2.000,0.000,0.000>\n");

    assert_eq!(machine.machine_coordinate_axis(Axis::X), 10.0);
    assert_eq!(machine.work_coordinate_offset_axis(Axis::X), 2.0);
    assert_eq!(machine.work_coordinate_axis(Axis::X), 8.0);
}

#[test]
fn test_fs_segment_updates_feed_and_spindle() {
    let (mut machine, _io) = machine_with_mock();

    machine.encode("<Run|MPos:0,0,0|FS:1500.0,12000>\n");

    assert_eq!(machine.current_feed_rate(), 1500.0);
    assert_eq!(machine.current_spindle_speed(), 12000);

    // A report without FS leaves the last values in place.
    machine.encode("<Run|MPos:1,1,1>\n");
    assert_eq!(machine.current_feed_rate(), 1500.0);
}

#[test]
fn test_unknown_state_token_leaves_state_untouched() {
    let (mut machine, _io) = machine_with_mock();

    machine.encode("<Idle|MPos:1.000,2.000,3.000>\n");
    machine.encode("<Bogus|MPos:9.000,9.000,9.000>\n");

    assert_eq!(machine.machine_state(), MachineState::Idle);
    assert_eq!(machine.machine_coordinate_axis(Axis::X), 1.0);
}

#[test]
fn test_unknown_mode_token_leaves_coordinates_untouched() {
    let (mut machine, _io) = machine_with_mock();

    machine.encode("<Idle|MPos:1.000,2.000,3.000>\n");
    machine.encode("<Run|QPos:9.000,9.000,9.000>\n");

    // The whole report is rejected, state token included.
    assert_eq!(machine.machine_state(), MachineState::Idle);
    assert_eq!(machine.machine_coordinate_axis(Axis::X), 1.0);
}

#[test]
fn test_substate_token_decodes() {
    let (mut machine, _io) = machine_with_mock();

    machine.encode("<Hold:0|MPos:0,0,0>\n");

    assert_eq!(machine.machine_state(), MachineState::Hold);
}

#[test]
fn test_position_observer_receives_decoded_snapshot() {
    let (mut machine, _io) = machine_with_mock();

    let updates = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&updates);
    machine.on_position_updated(move |state, mode, position| {
        seen.lock().unwrap().push((state, mode, *position));
    });

    machine.encode("<Run|MPos:1.000,2.000,3.000>\n");

    let updates = updates.lock().unwrap();
    assert_eq!(updates.len(), 1);
    let (state, mode, position) = updates[0];
    assert_eq!(state, MachineState::Run);
    assert_eq!(mode, CoordinateMode::Machine);
    assert_eq!(position[0], 1.0);
    assert_eq!(position[2], 3.0);
}

#[test]
fn test_state_change_observer_sees_previous_and_next() {
    let (mut machine, _io) = machine_with_mock();

    let changes = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&changes);
    machine.on_machine_state_changed(move |previous, next| {
        seen.lock().unwrap().push((previous, next));
    });

    machine.encode("<Idle|MPos:0,0,0>\n");
    machine.encode("<Idle|MPos:1,0,0>\n");
    machine.encode("<Run|MPos:2,0,0>\n");

    // Fires only on actual transitions.
    assert_eq!(
        *changes.lock().unwrap(),
        vec![
            (MachineState::Unknown, MachineState::Idle),
            (MachineState::Idle, MachineState::Run),
        ]
    );
}

#[test]
fn test_send_command_expecting_ok_acknowledged() {
    let (mut machine, io) = machine_with_mock();

    io.queue_response("ok\r\n");
    assert!(machine.clear_alarm());
    assert_eq!(io.sent_lines(), vec!["$X".to_string()]);
}

#[test]
fn test_send_command_expecting_ok_rejected() {
    let (mut machine, io) = machine_with_mock();

    io.queue_response("error:9\r\n");
    assert!(!machine.clear_alarm());
}

#[test]
fn test_send_command_expecting_ok_times_out() {
    let (mut machine, io) = machine_with_mock();

    let started = std::time::Instant::now();
    assert!(!machine.clear_alarm());
    assert!(started.elapsed() >= grblkit_protocol::COMMAND_RESPONSE_TIMEOUT);
    assert_eq!(io.sent_lines(), vec!["$X".to_string()]);
}

#[test]
fn test_status_report_interleaved_with_acknowledgement() {
    let (mut machine, io) = machine_with_mock();

    io.queue_response("<Run|MPos:1.000,2.000,3.000>\r\nok\r\n");
    assert!(machine.resume());

    // The interleaved report was decoded, not discarded.
    assert_eq!(machine.machine_state(), MachineState::Run);
    assert_eq!(machine.machine_coordinate_axis(Axis::Y), 2.0);
}

#[test]
fn test_linear_interpolation_command_serialization() {
    let (mut machine, io) = machine_with_mock();

    io.queue_response("ok\r\n");
    assert!(machine.linear_interpolation_positioning(
        1000.0,
        &[(Axis::X, 10.0), (Axis::Y, 50.0)]
    ));

    assert_eq!(
        io.sent_lines(),
        vec!["G1 F1000.000 X10.000 Y50.000 ".to_string()]
    );
}

#[test]
fn test_jog_command_serialization() {
    let (mut machine, io) = machine_with_mock();

    io.queue_response("ok\r\n");
    assert!(machine.jog(500.0, &[(Axis::X, -1.5)]));

    assert_eq!(io.sent_lines(), vec!["$J= F500.000 X-1.500 ".to_string()]);
}

#[test]
fn test_homing_cycle_is_fire_and_forget() {
    let (mut machine, io) = machine_with_mock();

    // No acknowledgement queued; the call must still succeed.
    machine.run_homing_cycle().unwrap();
    assert_eq!(io.sent_lines(), vec!["$H".to_string()]);
}

#[test]
fn test_homing_cycle_axis() {
    let (mut machine, io) = machine_with_mock();

    io.queue_response("ok\r\n");
    assert!(machine.run_homing_cycle_axis(Axis::Z));
    assert_eq!(io.sent_lines(), vec!["$HZ".to_string()]);
}

#[test]
fn test_homing_cycle_unknown_axis_sends_nothing() {
    let (mut machine, io) = machine_with_mock();

    assert!(!machine.run_homing_cycle_axis(Axis::Unknown));
    assert!(io.sent_lines().is_empty());
}

#[test]
fn test_update_polls_status_once_per_interval() {
    let (mut machine, io) = machine_with_mock();
    machine.set_status_report_interval(std::time::Duration::from_millis(0));

    machine.update();
    std::thread::sleep(std::time::Duration::from_millis(10));
    // The interval is clamped up to the 50ms floor, so no second poll yet.
    machine.update();

    assert_eq!(io.sent_lines(), vec!["?".to_string()]);
}

#[test]
fn test_update_drains_queued_input() {
    let (mut machine, io) = machine_with_mock();

    io.queue_response("<Idle|MPos:4.000,5.000,6.000>\r\n");
    machine.update();

    assert_eq!(machine.machine_state(), MachineState::Idle);
    assert_eq!(machine.machine_coordinate_axis(Axis::Z), 6.0);
}

#[test]
fn test_gcode_sent_observer() {
    let (mut machine, io) = machine_with_mock();

    let sent = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&sent);
    machine.on_gcode_sent(move |line| seen.lock().unwrap().push(line.to_string()));

    io.queue_response("ok\r\n");
    machine.spindle_off();

    assert_eq!(*sent.lock().unwrap(), vec!["M5".to_string()]);
}

#[test]
fn test_view_build_info() {
    let (mut machine, io) = machine_with_mock();

    io.queue_response("ok\r\n");
    assert!(machine.view_build_info());
    assert_eq!(io.sent_lines(), vec!["$I".to_string()]);
}

#[test]
fn test_machine_is_at_with_tolerance() {
    let (mut machine, _io) = machine_with_mock();

    machine.encode("<Idle|MPos:10.000,20.000,0.000>\n");

    assert!(machine.machine_is_at(&[(Axis::X, 10.0), (Axis::Y, 20.0)]));
    assert!(machine.machine_is_at(&[(Axis::X, 10.0000001)]));
    assert!(!machine.machine_is_at(&[(Axis::X, 10.1)]));
}

proptest! {
    #[test]
    fn prop_framing_is_delivery_shape_independent(
        data in "[ -~\r\n]{0,64}",
        split in 0usize..64,
    ) {
        let split = split.min(data.len());

        let (mut whole, _io1) = machine_with_mock();
        whole.encode(&data);

        let (mut parts, _io2) = machine_with_mock();
        parts.encode(&data[..split]);
        parts.encode(&data[split..]);

        prop_assert_eq!(whole.pending(), parts.pending());
        prop_assert_eq!(whole.machine_state(), parts.machine_state());
        prop_assert_eq!(whole.machine_coordinate(), parts.machine_coordinate());
    }
}

#[test]
fn test_banner_lines_are_ignored() {
    let (mut machine, _io) = machine_with_mock();

    machine.encode("Grbl 3.8 ['$' for help]\r\n[MSG:INFO: Caution: Unlocked]\r\n");
    machine.encode("<Idle|MPos:1,1,1>\n");

    assert_eq!(machine.machine_state(), MachineState::Idle);
}
