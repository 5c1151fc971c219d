//! Segment preparation and step execution properties.

use crate::{machine_config, Ticker};
use cnc_motion::config::MotionConstraints;
use cnc_motion::planner::{LineData, Planner};
use cnc_motion::stepper::{SegmentPreparer, SimHal, Stepper, SEGMENT_QUEUE_CAPACITY};
use cnc_motion::system::{MachineState, RunState};
use cnc_motion::{Machine, N_AXIS};
use embedded_hal_mock::eh1::delay::NoopDelay;
use proptest::prelude::*;

const STEPS_PER_MM: f32 = 40.0;

fn to_steps(target: &[f32; N_AXIS]) -> [i32; N_AXIS] {
    core::array::from_fn(|axis| (target[axis] * STEPS_PER_MM).round() as i32)
}

/// Test that refilling a full segment ring changes nothing.
#[test]
fn test_fill_is_idempotent_when_full() {
    let config = machine_config(STEPS_PER_MM, 3000.0, 200.0);
    let constraints = MotionConstraints::from_config(&config);
    let state = MachineState::new();
    state.set_run_state(RunState::CYCLE);
    let stepper = Stepper::new(SimHal::new(), &config);
    let mut prep = SegmentPreparer::new(&config.stepper);
    let mut planner = Planner::new();

    planner
        .buffer_line(&[-50.0, 0.0, 0.0], &LineData::feed(3000.0), &constraints, &mut prep)
        .unwrap();
    prep.fill_segment_buffer(&mut planner, &stepper, &state);

    assert!(stepper.is_full());
    assert_eq!(stepper.segment_count(), SEGMENT_QUEUE_CAPACITY);
    let millimeters = planner.current_block().unwrap().millimeters;
    let rate = prep.realtime_rate();

    prep.fill_segment_buffer(&mut planner, &stepper, &state);

    assert_eq!(stepper.segment_count(), SEGMENT_QUEUE_CAPACITY);
    assert_eq!(planner.current_block().unwrap().millimeters, millimeters);
    assert_eq!(prep.realtime_rate(), rate);
}

/// Test that an empty planner leaves the ring empty.
#[test]
fn test_fill_without_blocks() {
    let config = machine_config(STEPS_PER_MM, 3000.0, 200.0);
    let state = MachineState::new();
    let stepper = Stepper::new(SimHal::new(), &config);
    let mut prep = SegmentPreparer::new(&config.stepper);
    let mut planner = Planner::new();

    prep.fill_segment_buffer(&mut planner, &stepper, &state);
    assert_eq!(stepper.segment_count(), 0);
    assert_eq!(prep.ramp_shape(), None);
}

fn path_strategy() -> impl Strategy<Value = Vec<([f32; N_AXIS], f32)>> {
    prop::collection::vec(
        (prop::array::uniform3(-30.0f32..0.0), 200.0f32..3000.0),
        1..4,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Every planned step is emitted exactly once, with or without
    /// smoothing.
    #[test]
    fn prop_steps_conserved(path in path_strategy(), smoothing in any::<bool>()) {
        let mut config = machine_config(STEPS_PER_MM, 3000.0, 200.0);
        config.stepper.step_smoothing = smoothing;
        let state = MachineState::new();
        let stepper = Stepper::new(SimHal::new(), &config);
        let mut machine =
            Machine::new(config, &state, &stepper, Ticker::new(&stepper, &state), NoopDelay::new())
                .unwrap();

        let mut expected_pulses = [0u64; N_AXIS];
        let mut last = [0i32; N_AXIS];
        for (target, feed) in &path {
            machine.line(target, &LineData::feed(*feed)).unwrap();
            let steps = to_steps(target);
            for axis in 0..N_AXIS {
                expected_pulses[axis] += u64::from((steps[axis] - last[axis]).unsigned_abs());
            }
            last = steps;
        }
        machine.buffer_synchronize().unwrap();

        prop_assert_eq!(state.position(), last);
        prop_assert_eq!(stepper.with_hal(|hal| hal.pulses), expected_pulses);
        prop_assert_eq!(machine.queue_depth(), 0);
        prop_assert_eq!(stepper.segment_count(), 0);
        prop_assert_eq!(state.run_state(), RunState::IDLE);
    }

    /// A reset at any tick leaves every queue empty and the planner on the
    /// machine position, and the machine can move on from there.
    #[test]
    fn prop_reset_at_any_tick(path in path_strategy(), ticks in 0usize..3000) {
        let config = machine_config(STEPS_PER_MM, 3000.0, 200.0);
        let state = MachineState::new();
        let stepper = Stepper::new(SimHal::new(), &config);
        let mut machine =
            Machine::new(config, &state, &stepper, Ticker::new(&stepper, &state), NoopDelay::new())
                .unwrap();

        for (target, feed) in &path {
            machine.line(target, &LineData::feed(*feed)).unwrap();
        }
        machine.auto_cycle_start();
        for _ in 0..ticks {
            machine.execute_realtime();
            stepper.on_tick(&state);
        }

        machine.request_reset();
        machine.execute_realtime();
        prop_assert!(state.abort());

        machine.reinitialize();
        prop_assert!(!state.abort());
        prop_assert_eq!(machine.queue_depth(), 0);
        prop_assert_eq!(stepper.segment_count(), 0);
        prop_assert!(!stepper.is_running());
        prop_assert_eq!(machine.planner().position(), state.position());
        prop_assert!(state.run_state().is_any(RunState::ALARM | RunState::IDLE));

        prop_assert!(machine.unlock());
        machine.line(&[0.0, 0.0, 0.0], &LineData::feed(3000.0)).unwrap();
        machine.buffer_synchronize().unwrap();
        prop_assert_eq!(state.position(), [0, 0, 0]);
    }
}
