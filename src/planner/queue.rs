//! Look-ahead block queue.
//!
//! A fixed ring of [`PlanBlock`]s indexed by `tail` (the block being
//! executed), `head` (the next free slot) and `planned`. Every block from
//! the tail up to and including `planned` is optimally planned: no future
//! append can change its entry speed, so recomputes stop there.

use libm::{fabsf, sqrtf};

use super::block::{BufferStatus, LineData, PlanBlock, RateMode};
use crate::axes::AxisMask;
use crate::config::{Kinematics, MotionConstraints};
use crate::error::{PlannerError, Result};
use crate::{BLOCK_BUFFER_SIZE, N_AXIS};

/// Feed rate used for rapids before axis limiting.
const SOME_LARGE_VALUE: f32 = 1.0e38;

/// Cosine above which two moves are treated as a full reversal.
const REVERSAL_COS: f32 = 0.99;

/// Cosine below which the next move continues straight on. The nominal
/// speeds alone limit such a junction.
const STRAIGHT_COS: f32 = -0.999_999;

/// Hook into whatever is currently slicing the tail block.
///
/// Called when a replan is about to touch the executing block. The
/// implementor must stop using the block's ramp (it will be re-derived) and
/// return the speed it is currently moving at, which becomes the block's new
/// entry speed. `None` means nothing is executing.
pub trait ExecutingBlock {
    /// Give up the current ramp and report the current speed in mm/min.
    fn notify_entry_speed_updated(&mut self) -> Option<f32>;
}

impl ExecutingBlock for () {
    fn notify_entry_speed_updated(&mut self) -> Option<f32> {
        None
    }
}

#[inline]
const fn next_index(idx: usize) -> usize {
    if idx + 1 == BLOCK_BUFFER_SIZE {
        0
    } else {
        idx + 1
    }
}

#[inline]
const fn prev_index(idx: usize) -> usize {
    if idx == 0 {
        BLOCK_BUFFER_SIZE - 1
    } else {
        idx - 1
    }
}

/// The look-ahead motion planner.
#[derive(Debug, Clone)]
pub struct Planner {
    blocks: [PlanBlock; BLOCK_BUFFER_SIZE],
    tail: usize,
    head: usize,
    next_head: usize,
    planned: usize,

    /// Planner position in axis steps. Leads the machine position by the
    /// queued moves.
    position: [i32; N_AXIS],
    previous_unit_vec: [f32; N_AXIS],
    previous_nominal_speed_sqr: f32,
}

impl Default for Planner {
    fn default() -> Self {
        Self::new()
    }
}

impl Planner {
    /// Create an empty planner at the origin.
    pub const fn new() -> Self {
        Self {
            blocks: [PlanBlock::EMPTY; BLOCK_BUFFER_SIZE],
            tail: 0,
            head: 0,
            next_head: 1,
            planned: 0,
            position: [0; N_AXIS],
            previous_unit_vec: [0.0; N_AXIS],
            previous_nominal_speed_sqr: 0.0,
        }
    }

    /// Empty the queue. The planner position is kept.
    pub fn reset(&mut self) {
        self.tail = 0;
        self.head = 0;
        self.next_head = 1;
        self.planned = 0;
        self.previous_unit_vec = [0.0; N_AXIS];
        self.previous_nominal_speed_sqr = 0.0;
    }

    /// Queue a straight move to `target` (absolute, mm).
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::BufferFull`] when no slot is free. The
    /// request is not consumed; retry after running the realtime
    /// coordinator.
    pub fn buffer_line<E: ExecutingBlock>(
        &mut self,
        target: &[f32; N_AXIS],
        line: &LineData,
        constraints: &MotionConstraints,
        exec: &mut E,
    ) -> Result<BufferStatus> {
        if self.is_full() {
            return Err(PlannerError::BufferFull.into());
        }

        let mut block = PlanBlock {
            line_number: line.line_number,
            acceleration: SOME_LARGE_VALUE,
            ..PlanBlock::EMPTY
        };

        // Step targets are absolute so rounding never accumulates
        let mut target_steps = [0i32; N_AXIS];
        let mut axis_delta = [0i32; N_AXIS];
        for axis in 0..N_AXIS {
            target_steps[axis] = constraints.mm_to_steps(axis, target[axis]);
            axis_delta[axis] = target_steps[axis] - self.position[axis];
        }

        let motor_delta = constraints.kinematics.axes_to_motors(axis_delta);
        for (axis, &delta) in motor_delta.iter().enumerate() {
            block.steps[axis] = delta.unsigned_abs();
            block.step_event_count = block.step_event_count.max(block.steps[axis]);
            if delta < 0 {
                block.direction_bits |= AxisMask::axis(axis);
            }
        }

        if block.step_event_count == 0 {
            return Ok(BufferStatus::EmptyBlock);
        }

        // Length and direction come from the rounded steps so the block
        // length matches what the steppers will actually trace
        let mut unit_vec = [0.0f32; N_AXIS];
        let mut length_sqr = 0.0;
        for (axis, u) in unit_vec.iter_mut().enumerate() {
            *u = constraints.steps_to_mm(axis, axis_delta[axis]);
            length_sqr += *u * *u;
        }
        block.millimeters = sqrtf(length_sqr);
        let inverse_millimeters = 1.0 / block.millimeters;

        let mut feed_rate = match line.rate_mode {
            RateMode::Feed => line.feed_rate,
            RateMode::InverseTime => line.feed_rate * block.millimeters,
            RateMode::Rapid => SOME_LARGE_VALUE,
        };
        if feed_rate < constraints.minimum_feed_rate {
            feed_rate = constraints.minimum_feed_rate;
        }

        let mut junction_cos_theta = 0.0;
        for axis in 0..N_AXIS {
            if unit_vec[axis] != 0.0 {
                unit_vec[axis] *= inverse_millimeters;
                let inverse_unit = fabsf(1.0 / unit_vec[axis]);

                feed_rate = feed_rate.min(constraints.max_rate[axis] * inverse_unit);
                block.acceleration = block
                    .acceleration
                    .min(constraints.acceleration[axis] * inverse_unit);

                junction_cos_theta -= self.previous_unit_vec[axis] * unit_vec[axis];
            }
        }

        if self.is_empty() {
            // Starting from rest
            block.entry_speed_sqr = 0.0;
            block.max_junction_speed_sqr = 0.0;
        } else if junction_cos_theta < STRAIGHT_COS {
            block.max_junction_speed_sqr = SOME_LARGE_VALUE;
        } else if junction_cos_theta > REVERSAL_COS {
            block.max_junction_speed_sqr = constraints.minimum_junction_speed_sqr;
        } else {
            // Centripetal approximation: fit a circle tangent to both moves
            // whose closest point deviates by the junction deviation
            let cos_theta = junction_cos_theta.max(-REVERSAL_COS);
            let sin_theta_d2 = sqrtf(0.5 * (1.0 - cos_theta));
            let junction_sqr = block.acceleration * constraints.junction_deviation * sin_theta_d2
                / (1.0 - sin_theta_d2);
            block.max_junction_speed_sqr = constraints.minimum_junction_speed_sqr.max(junction_sqr);
        }

        block.nominal_speed_sqr = feed_rate * feed_rate;
        block.max_entry_speed_sqr = block
            .max_junction_speed_sqr
            .min(block.nominal_speed_sqr)
            .min(self.previous_nominal_speed_sqr);

        trace!(
            "plan: {} steps, {} mm, nominal^2 {}, junction^2 {}",
            block.step_event_count,
            block.millimeters,
            block.nominal_speed_sqr,
            block.max_junction_speed_sqr
        );

        self.blocks[self.head] = block;
        self.previous_unit_vec = unit_vec;
        self.previous_nominal_speed_sqr = block.nominal_speed_sqr;
        self.position = target_steps;

        self.head = self.next_head;
        self.next_head = next_index(self.head);

        self.recalculate(exec);

        Ok(BufferStatus::Queued)
    }

    /// Two-pass relaxation of the entry speeds.
    ///
    /// The reverse pass walks from the newest block down to `planned`,
    /// capping each entry speed by what can be shed over the block. The
    /// forward pass walks back up, capping by what can be gained, and moves
    /// `planned` past every block that can no longer change.
    fn recalculate<E: ExecutingBlock>(&mut self, exec: &mut E) {
        let mut idx = prev_index(self.head);

        // Only the settled block is queued
        if idx == self.planned {
            return;
        }

        // The newest block always plans to a full stop
        let last = &mut self.blocks[idx];
        last.entry_speed_sqr = last.max_entry_speed_sqr.min(last.reachable_speed_sqr(0.0));

        let mut next_entry_sqr = last.entry_speed_sqr;
        idx = prev_index(idx);
        while idx != self.planned {
            let current = &mut self.blocks[idx];
            if current.entry_speed_sqr != current.max_entry_speed_sqr {
                current.entry_speed_sqr = current
                    .reachable_speed_sqr(next_entry_sqr)
                    .min(current.max_entry_speed_sqr);
            }
            next_entry_sqr = current.entry_speed_sqr;
            idx = prev_index(idx);
        }

        if self.planned == self.tail {
            self.notify_executing(exec);
        }

        let mut idx = self.planned;
        let mut next_idx = next_index(idx);
        while next_idx != self.head {
            let current = self.blocks[idx];
            let next = &mut self.blocks[next_idx];

            if current.entry_speed_sqr < next.entry_speed_sqr {
                let entry_speed_sqr = current.reachable_speed_sqr(current.entry_speed_sqr);
                if entry_speed_sqr < next.entry_speed_sqr {
                    // Acceleration limited: this block is now optimal
                    next.entry_speed_sqr = entry_speed_sqr;
                    self.planned = next_idx;
                }
            }

            if next.entry_speed_sqr == next.max_entry_speed_sqr {
                self.planned = next_idx;
            }

            idx = next_idx;
            next_idx = next_index(next_idx);
        }
    }

    /// Hand the executing block's current speed back to the queue.
    ///
    /// The tail block's entry speed becomes the speed the segment preparer
    /// reached, and the preparer drops its ramp so it is re-derived from
    /// the updated block.
    pub fn notify_executing<E: ExecutingBlock>(&mut self, exec: &mut E) {
        if let Some(speed) = exec.notify_entry_speed_updated() {
            if !self.is_empty() {
                self.blocks[self.tail].entry_speed_sqr = speed * speed;
            }
        }
    }

    /// Re-plan the queue from the executing block after a stop.
    pub fn cycle_reinitialize<E: ExecutingBlock>(&mut self, exec: &mut E) {
        self.notify_executing(exec);
        self.planned = self.tail;
        self.recalculate(exec);
    }

    /// The block being executed, if any.
    pub fn current_block(&self) -> Option<&PlanBlock> {
        if self.is_empty() {
            None
        } else {
            Some(&self.blocks[self.tail])
        }
    }

    /// Mutable access to the block being executed.
    pub fn current_block_mut(&mut self) -> Option<&mut PlanBlock> {
        if self.is_empty() {
            None
        } else {
            Some(&mut self.blocks[self.tail])
        }
    }

    /// Drop the executed block and reclaim its slot.
    pub fn discard_current_block(&mut self) {
        if !self.is_empty() {
            let idx = next_index(self.tail);
            if self.tail == self.planned {
                self.planned = idx;
            }
            self.tail = idx;
        }
    }

    /// Exit speed squared of the executing block: the next block's entry
    /// speed, or zero when it is the last one.
    pub fn exec_block_exit_speed_sqr(&self) -> f32 {
        let idx = next_index(self.tail);
        if self.is_empty() || idx == self.head {
            0.0
        } else {
            self.blocks[idx].entry_speed_sqr
        }
    }

    /// Check if no slot is free.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.tail == self.next_head
    }

    /// Check if no block is queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Number of queued blocks, the executing one included.
    #[inline]
    pub fn block_count(&self) -> usize {
        (self.head + BLOCK_BUFFER_SIZE - self.tail) % BLOCK_BUFFER_SIZE
    }

    /// Number of blocks, counted from the tail, whose entry speed can no
    /// longer be changed by appending moves.
    pub fn settled_count(&self) -> usize {
        let through_planned = (self.planned + BLOCK_BUFFER_SIZE - self.tail) % BLOCK_BUFFER_SIZE + 1;
        through_planned.min(self.block_count())
    }

    /// Queued blocks, tail first.
    pub fn blocks(&self) -> impl Iterator<Item = &PlanBlock> + '_ {
        (0..self.block_count()).map(move |i| &self.blocks[(self.tail + i) % BLOCK_BUFFER_SIZE])
    }

    /// Planner position in axis steps.
    #[inline]
    pub fn position(&self) -> [i32; N_AXIS] {
        self.position
    }

    /// Set the planner position from the machine position (motor steps).
    pub fn sync_position(&mut self, motor_steps: [i32; N_AXIS], kinematics: Kinematics) {
        self.position = kinematics.motors_to_axes(motor_steps);
    }
}
