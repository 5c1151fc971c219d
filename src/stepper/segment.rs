//! Step segments and block execution snapshots.

use crate::axes::AxisMask;
use crate::{N_AXIS, SEGMENT_BUFFER_SIZE};

/// Segments the ring can hold. One slot of the buffer stays free.
pub const SEGMENT_QUEUE_CAPACITY: usize = SEGMENT_BUFFER_SIZE - 1;

/// Block snapshots kept for the executor. A segment can only reference a
/// block whose snapshot is still here, so one per queued segment suffices.
pub const ST_BLOCK_BUFFER_SIZE: usize = SEGMENT_BUFFER_SIZE - 1;

/// Immutable copy of the planner block data the step interrupt needs.
///
/// Taken once when the preparer starts slicing a block, so the planner may
/// discard the block while its last segments still execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StBlock {
    /// Per-motor direction, bit set means negative.
    pub direction_bits: AxisMask,
    /// Per-motor step counts, pre-shifted for step smoothing.
    pub steps: [u32; N_AXIS],
    /// Dominant step count, pre-shifted for step smoothing.
    pub step_event_count: u32,
}

/// A constant-rate slice of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Segment {
    /// Timer ticks to execute, already scaled by the smoothing level.
    pub n_step: u32,
    /// Timer reload value per tick.
    pub cycles_per_tick: u32,
    /// Snapshot this segment belongs to.
    pub st_block_index: u8,
    /// Smoothing level: the tick rate is `2^level` times the step rate.
    pub smoothing_level: u8,
}
