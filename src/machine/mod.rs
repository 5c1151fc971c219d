//! Machine coordinator.
//!
//! [`Machine`] owns the planner and the segment preparer, borrows the shared
//! [`MachineState`] and [`Stepper`], and exposes the motion gateways
//! ([`line`](Machine::line), [`dwell`](Machine::dwell),
//! [`probe_cycle`](Machine::probe_cycle)) and the realtime coordinator
//! ([`execute_realtime`](Machine::execute_realtime)).
//!
//! # Example
//!
//! ```rust,ignore
//! static STATE: MachineState = MachineState::new();
//!
//! let stepper = Stepper::new(hal, &config);
//! let mut machine = Machine::new(config, &STATE, &stepper, (), delay)?;
//!
//! machine.line(&[10.0, 5.0, 0.0], &LineData::feed(600.0))?;
//! machine.buffer_synchronize()?;
//! ```

mod motion;
mod realtime;

use embedded_hal::delay::DelayNs;

use crate::axes::Position;
use crate::config::{validate_config, MachineConfig, MotionConstraints};
use crate::error::{Alarm, Result};
use crate::planner::Planner;
use crate::stepper::{SegmentPreparer, Stepper, StepperHal};
use crate::system::{MachineState, RunState};
use crate::N_AXIS;

/// Spindle, coolant, door and reporting hooks of the surrounding firmware.
///
/// Every method has a default that does nothing, so `()` serves machines
/// without any of them.
pub trait Accessories {
    /// Stop the spindle.
    fn spindle_stop(&mut self) {}

    /// Stop the coolant.
    fn coolant_stop(&mut self) {}

    /// Restart the spindle in its programmed state. Returns `true` if it
    /// was programmed on, so the spin-up delay is waited.
    fn spindle_restore(&mut self) -> bool {
        false
    }

    /// Restart the coolant in its programmed state. Returns `true` if it
    /// was programmed on.
    fn coolant_restore(&mut self) -> bool {
        false
    }

    /// Safety door switch reads open.
    fn safety_door_ajar(&mut self) -> bool {
        false
    }

    /// An alarm was entered. Called once per alarm.
    fn report_alarm(&mut self, _alarm: Alarm) {}

    /// A status report was requested.
    fn report_status(&mut self, _status: &StatusSnapshot) {}

    /// Called on every iteration of a blocking wait.
    fn idle(&mut self) {}
}

impl Accessories for () {}

/// Machine status for the reporting layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusSnapshot {
    /// Run state.
    pub state: RunState,
    /// Machine position in mm.
    pub position_mm: [f32; N_AXIS],
    /// Feed rate of the most recently prepared segment in mm/min.
    pub feed_rate: f32,
    /// Blocks queued in the planner.
    pub queue_depth: usize,
    /// Line number of the executing block.
    pub line_number: Option<i32>,
}

/// The motion core of one machine.
pub struct Machine<'a, H, A, D>
where
    H: StepperHal,
    A: Accessories,
    D: DelayNs,
{
    state: &'a MachineState,
    stepper: &'a Stepper<H>,
    planner: Planner,
    prep: SegmentPreparer,
    config: MachineConfig,
    constraints: MotionConstraints,
    accessories: A,
    delay: D,
}

impl<'a, H, A, D> Machine<'a, H, A, D>
where
    H: StepperHal,
    A: Accessories,
    D: DelayNs,
{
    /// Validate `config` and bring up the motion core.
    ///
    /// The machine starts Idle, or locked in Alarm when
    /// `machine.alarm_on_boot` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: MachineConfig,
        state: &'a MachineState,
        stepper: &'a Stepper<H>,
        accessories: A,
        delay: D,
    ) -> Result<Self> {
        validate_config(&config)?;

        let constraints = MotionConstraints::from_config(&config);
        let mut planner = Planner::new();
        planner.sync_position(state.position(), constraints.kinematics);

        state.set_run_state(if config.machine.alarm_on_boot {
            RunState::ALARM
        } else {
            RunState::IDLE
        });

        info!(
            "machine: up, kinematics {}, soft limits {}",
            constraints.kinematics,
            constraints.soft_limits.is_some()
        );

        Ok(Self {
            state,
            stepper,
            planner,
            prep: SegmentPreparer::new(&config.stepper),
            config,
            constraints,
            accessories,
            delay,
        })
    }

    /// Shared machine state.
    #[inline]
    pub fn state(&self) -> &'a MachineState {
        self.state
    }

    /// The look-ahead planner.
    #[inline]
    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    /// The segment preparer.
    #[inline]
    pub fn preparer(&self) -> &SegmentPreparer {
        &self.prep
    }

    /// Active configuration.
    #[inline]
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Planning constraints derived from the configuration.
    #[inline]
    pub fn constraints(&self) -> &MotionConstraints {
        &self.constraints
    }

    /// Accessory hooks.
    pub fn accessories(&self) -> &A {
        &self.accessories
    }

    /// Mutable accessory hooks.
    pub fn accessories_mut(&mut self) -> &mut A {
        &mut self.accessories
    }

    /// Blocks queued in the planner, the executing one included.
    pub fn queue_depth(&self) -> usize {
        self.planner.block_count()
    }

    /// Line number of the executing block.
    pub fn current_line_number(&self) -> Option<i32> {
        self.planner.current_block().and_then(|block| block.line_number)
    }

    /// Approximate feed rate in mm/min. Leads the real motion by up to one
    /// segment buffer; zero when not moving.
    pub fn realtime_rate(&self) -> f32 {
        if self.state.run_state().is_any(RunState::MOTION) {
            self.prep.realtime_rate()
        } else {
            0.0
        }
    }

    /// Machine position in mm.
    pub fn position_mm(&self) -> [f32; N_AXIS] {
        Position::from_motor_steps(self.state.position()).mm(&self.constraints)
    }

    /// Position captured by the last probe trigger, in mm.
    pub fn probe_position_mm(&self) -> [f32; N_AXIS] {
        Position::from_motor_steps(self.state.probe_position()).mm(&self.constraints)
    }

    /// Snapshot for a status report.
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            state: self.state.run_state(),
            position_mm: self.position_mm(),
            feed_rate: self.realtime_rate(),
            queue_depth: self.queue_depth(),
            line_number: self.current_line_number(),
        }
    }

    /// Set the planner position to the machine position.
    pub fn sync_position(&mut self) {
        self.planner
            .sync_position(self.state.position(), self.constraints.kinematics);
    }

    /// Release the drivers once the stepper has stopped and the idle-lock
    /// delay has run out.
    fn settle_drivers(&mut self) {
        if self.stepper.release_pending() {
            self.delay
                .delay_ms(u32::from(self.config.stepper.idle_lock_delay_ms));
            if self.stepper.release_drivers(self.state) {
                debug!("machine: drivers released");
            }
        }
    }

    /// Drop every queued and prepared move and resync the planner.
    fn flush_motion(&mut self) {
        self.stepper.reset();
        self.prep.reset();
        self.planner.reset();
        self.sync_position();
    }
}
