//! Planner block and line request types.

use crate::axes::AxisMask;
use crate::N_AXIS;

/// How the feed rate of a line request is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RateMode {
    /// Feed rate in mm/min.
    #[default]
    Feed,
    /// Feed rate is the inverse of the move duration in minutes.
    InverseTime,
    /// Move as fast as the axis limits allow. The feed rate is ignored.
    Rapid,
}

/// Rate and bookkeeping data for one line request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineData {
    /// Requested rate, interpreted according to `rate_mode`.
    pub feed_rate: f32,
    /// Rate interpretation.
    pub rate_mode: RateMode,
    /// Program line number carried through to status reports.
    pub line_number: Option<i32>,
}

impl LineData {
    /// Line at `feed_rate` mm/min.
    pub fn feed(feed_rate: f32) -> Self {
        Self {
            feed_rate,
            rate_mode: RateMode::Feed,
            line_number: None,
        }
    }

    /// Line completing in `1 / inverse_time` minutes.
    pub fn inverse_time(inverse_time: f32) -> Self {
        Self {
            feed_rate: inverse_time,
            rate_mode: RateMode::InverseTime,
            line_number: None,
        }
    }

    /// Rapid positioning move.
    pub fn rapid() -> Self {
        Self {
            feed_rate: 0.0,
            rate_mode: RateMode::Rapid,
            line_number: None,
        }
    }

    /// Attach a program line number.
    pub fn with_line_number(mut self, line_number: i32) -> Self {
        self.line_number = Some(line_number);
        self
    }
}

/// One queued linear move.
///
/// Speeds are stored squared, in (mm/min)², so the recompute passes never
/// need a square root.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanBlock {
    /// Per-motor direction, bit set means negative.
    pub direction_bits: AxisMask,
    /// Per-motor step counts.
    pub steps: [u32; N_AXIS],
    /// Largest per-motor step count. Drives the line-tracing counters.
    pub step_event_count: u32,

    /// Planned entry speed squared.
    pub entry_speed_sqr: f32,
    /// Entry speed cap from the junction and both nominal speeds.
    pub max_entry_speed_sqr: f32,
    /// Junction speed cap from the direction change.
    pub max_junction_speed_sqr: f32,
    /// Programmed speed squared after axis limiting.
    pub nominal_speed_sqr: f32,
    /// Axis-limited acceleration in mm/min².
    pub acceleration: f32,
    /// Remaining length in mm. Shrinks as segments are prepared.
    pub millimeters: f32,

    /// Program line number, if one was given.
    pub line_number: Option<i32>,
}

impl PlanBlock {
    /// A zeroed block.
    pub const EMPTY: Self = Self {
        direction_bits: AxisMask::empty(),
        steps: [0; N_AXIS],
        step_event_count: 0,
        entry_speed_sqr: 0.0,
        max_entry_speed_sqr: 0.0,
        max_junction_speed_sqr: 0.0,
        nominal_speed_sqr: 0.0,
        acceleration: 0.0,
        millimeters: 0.0,
        line_number: None,
    };

    /// Speed squared reachable across the whole block length, starting
    /// from `from_sqr` at one end.
    #[inline]
    pub(crate) fn reachable_speed_sqr(&self, from_sqr: f32) -> f32 {
        from_sqr + 2.0 * self.acceleration * self.millimeters
    }
}

impl Default for PlanBlock {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Outcome of a successful [`buffer_line`](super::Planner::buffer_line).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferStatus {
    /// The move was appended to the queue.
    Queued,
    /// The target rounds to the current position. Nothing was queued.
    EmptyBlock,
    /// The machine is in check mode. The move was validated but not queued.
    CheckOnly,
}
