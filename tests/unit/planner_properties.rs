//! Look-ahead planner properties over generated paths.

use cnc_motion::config::units::{Millimeters, MmPerMin, MmPerSecSquared};
use cnc_motion::config::{AxisConfig, Axes, MachineConfig, MotionConstraints};
use cnc_motion::planner::{BufferStatus, LineData, PlanBlock, Planner};
use cnc_motion::N_AXIS;
use proptest::prelude::*;

fn constraints(junction_deviation: f32) -> MotionConstraints {
    let mut config = MachineConfig {
        axes: Axes::uniform(AxisConfig::new(100.0, MmPerMin(6000.0), MmPerSecSquared(100.0))),
        ..MachineConfig::default()
    };
    config.planner.junction_deviation = Millimeters(junction_deviation);
    MotionConstraints::from_config(&config)
}

fn queue(planner: &mut Planner, constraints: &MotionConstraints, target: [f32; N_AXIS], feed: f32) {
    planner
        .buffer_line(&target, &LineData::feed(feed), constraints, &mut ())
        .unwrap();
}

fn close_enough(lhs: f32, rhs: f32) -> bool {
    lhs <= rhs + 1e-4 * lhs.abs().max(rhs.abs()) + 1.0
}

fn move_strategy() -> impl Strategy<Value = ([f32; N_AXIS], f32)> {
    (
        prop::array::uniform3(-100.0f32..0.0),
        10.0f32..8000.0,
    )
}

/// Test that colinear moves join at the lesser nominal speed.
#[test]
fn test_colinear_junction_takes_lesser_nominal() {
    let constraints = constraints(0.01);
    let mut planner = Planner::new();
    queue(&mut planner, &constraints, [-10.0, 0.0, 0.0], 800.0);
    queue(&mut planner, &constraints, [-20.0, 0.0, 0.0], 600.0);

    let second = planner.blocks().nth(1).unwrap();
    assert_eq!(second.max_entry_speed_sqr, 600.0 * 600.0);
}

/// Test that a straight continuation keeps full speed even when the
/// acceleration is low.
#[test]
fn test_colinear_junction_at_low_acceleration() {
    let config = MachineConfig {
        axes: Axes::uniform(AxisConfig::new(80.0, MmPerMin(1000.0), MmPerSecSquared(500.0 / 3600.0))),
        ..MachineConfig::default()
    };
    let constraints = MotionConstraints::from_config(&config);
    let mut planner = Planner::new();
    queue(&mut planner, &constraints, [-100.0, 0.0, 0.0], 1000.0);
    queue(&mut planner, &constraints, [-200.0, 0.0, 0.0], 1000.0);
    queue(&mut planner, &constraints, [-300.0, 0.0, 0.0], 700.0);

    let blocks: Vec<PlanBlock> = planner.blocks().copied().collect();
    assert_eq!(blocks[1].max_entry_speed_sqr, 1000.0 * 1000.0);
    assert_eq!(blocks[2].max_entry_speed_sqr, 700.0 * 700.0);
}

/// Test that a right-angle corner is slower than either move and tends to
/// the minimum junction speed as the deviation shrinks.
#[test]
fn test_corner_junction_below_nominals() {
    let corner = |deviation: f32| {
        let constraints = constraints(deviation);
        let mut planner = Planner::new();
        queue(&mut planner, &constraints, [-10.0, 0.0, 0.0], 3000.0);
        queue(&mut planner, &constraints, [-10.0, -10.0, 0.0], 3000.0);
        let block = *planner.blocks().nth(1).unwrap();
        block
    };

    let wide = corner(0.01);
    assert!(wide.max_junction_speed_sqr > 0.0);
    assert!(wide.max_junction_speed_sqr < 3000.0 * 3000.0);
    assert_eq!(wide.max_entry_speed_sqr, wide.max_junction_speed_sqr);

    let tight = corner(1e-6);
    assert!(tight.max_junction_speed_sqr < wide.max_junction_speed_sqr);
    assert!(tight.max_junction_speed_sqr < 1.0);
}

/// Test that reversing direction plans a stop at the junction.
#[test]
fn test_reversal_stops() {
    let constraints = constraints(0.01);
    let mut planner = Planner::new();
    queue(&mut planner, &constraints, [-10.0, 0.0, 0.0], 3000.0);
    queue(&mut planner, &constraints, [0.0, 0.0, 0.0], 3000.0);

    let second = planner.blocks().nth(1).unwrap();
    assert_eq!(second.max_entry_speed_sqr, 0.0);
    assert_eq!(second.entry_speed_sqr, 0.0);
}

/// Test that the queue rejects moves once full and keeps its position.
#[test]
fn test_full_queue_rejects() {
    let constraints = constraints(0.01);
    let mut planner = Planner::new();
    let mut x = 0.0;
    while !planner.is_full() {
        x -= 1.0;
        queue(&mut planner, &constraints, [x, 0.0, 0.0], 1000.0);
    }

    let position = planner.position();
    let result = planner.buffer_line(&[x - 1.0, 0.0, 0.0], &LineData::feed(1000.0), &constraints, &mut ());
    assert!(result.is_err());
    assert_eq!(planner.position(), position);
    assert_eq!(planner.block_count(), cnc_motion::BLOCK_BUFFER_SIZE - 1);
}

/// Test that a move shorter than half a step queues nothing.
#[test]
fn test_sub_step_move_is_empty() {
    let constraints = constraints(0.01);
    let mut planner = Planner::new();
    let status = planner
        .buffer_line(&[-0.004, 0.0, 0.0], &LineData::feed(1000.0), &constraints, &mut ())
        .unwrap();
    assert_eq!(status, BufferStatus::EmptyBlock);
    assert!(planner.is_empty());
}

fn check_profile(blocks: &[PlanBlock]) -> Result<(), TestCaseError> {
    for (i, block) in blocks.iter().enumerate() {
        prop_assert!(block.entry_speed_sqr >= 0.0);
        prop_assert!(block.entry_speed_sqr <= block.max_entry_speed_sqr);
        prop_assert!(block.max_entry_speed_sqr <= block.nominal_speed_sqr);

        // Each block can reach its successor's entry, and the last one
        // can stop
        let exit = blocks.get(i + 1).map_or(0.0, |next| next.entry_speed_sqr);
        let reach = 2.0 * block.acceleration * block.millimeters;
        prop_assert!(
            close_enough(block.entry_speed_sqr, exit + reach),
            "block {} cannot slow from {} to {}",
            i,
            block.entry_speed_sqr,
            exit
        );
        prop_assert!(
            close_enough(exit, block.entry_speed_sqr + reach),
            "block {} cannot speed from {} to {}",
            i,
            block.entry_speed_sqr,
            exit
        );
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Entry speeds stay within their limits and the profile is feasible
    /// after every append.
    #[test]
    fn prop_entry_speeds_bounded(moves in prop::collection::vec(move_strategy(), 1..15)) {
        let constraints = constraints(0.01);
        let mut planner = Planner::new();

        for (target, feed) in moves {
            queue(&mut planner, &constraints, target, feed);
            let blocks: Vec<PlanBlock> = planner.blocks().copied().collect();
            check_profile(&blocks)?;
        }
    }

    /// Appending never changes a block the planner reported settled.
    #[test]
    fn prop_settled_blocks_unchanged(moves in prop::collection::vec(move_strategy(), 2..15)) {
        let constraints = constraints(0.01);
        let mut planner = Planner::new();

        for (target, feed) in moves {
            let settled: Vec<f32> = planner
                .blocks()
                .take(planner.settled_count())
                .map(|block| block.entry_speed_sqr)
                .collect();

            queue(&mut planner, &constraints, target, feed);

            for (i, (before, after)) in settled.iter().zip(planner.blocks()).enumerate() {
                prop_assert_eq!(*before, after.entry_speed_sqr, "settled block {} changed", i);
            }
        }
    }

    /// The planner position is the rounded target, whatever the path.
    #[test]
    fn prop_position_tracks_target(moves in prop::collection::vec(move_strategy(), 1..15)) {
        let constraints = constraints(0.01);
        let mut planner = Planner::new();

        for (target, feed) in moves {
            queue(&mut planner, &constraints, target, feed);
            let expected: [i32; N_AXIS] = core::array::from_fn(|axis| (target[axis] * 100.0).round() as i32);
            prop_assert_eq!(planner.position(), expected);
        }
    }
}
