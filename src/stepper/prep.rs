//! Segment preparation.
//!
//! Slices the executing planner block into short constant-rate segments for
//! the step interrupt. Runs in the main loop; never blocks.

use libm::{ceilf, sqrtf};

use super::executor::Stepper;
use super::hal::StepperHal;
use super::ramp::{RampShape, RampType, VelocityProfile};
use super::segment::{Segment, StBlock, ST_BLOCK_BUFFER_SIZE};
use crate::config::StepperConfig;
use crate::planner::{ExecutingBlock, Planner};
use crate::system::{MachineState, RunState};

/// Minimum distance of a segment, in steps. Keeps every segment at least
/// one whole step long.
const REQ_MM_INCREMENT_SCALAR: f32 = 1.25;

/// Step generation settings resolved once from [`StepperConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
struct PrepSettings {
    dt_segment: f32,
    cycles_per_min: f32,
    step_smoothing: bool,
    block_shift: u8,
    smoothing_thresholds: [u32; 3],
    max_timer_period: u32,
}

impl PrepSettings {
    fn from_config(config: &StepperConfig) -> Self {
        Self {
            dt_segment: config.segment_duration_min(),
            cycles_per_min: config.cycles_per_min(),
            step_smoothing: config.step_smoothing,
            block_shift: config.block_shift(),
            smoothing_thresholds: [
                config.smoothing_threshold(1),
                config.smoothing_threshold(2),
                config.smoothing_threshold(3),
            ],
            max_timer_period: config.max_timer_period,
        }
    }

    fn smoothing_level(&self, cycles: u32) -> u8 {
        if !self.step_smoothing {
            return 0;
        }
        self.smoothing_thresholds
            .iter()
            .take_while(|&&threshold| cycles >= threshold)
            .count() as u8
    }
}

/// Working state for the block being sliced.
#[derive(Debug, Clone)]
pub struct SegmentPreparer {
    settings: PrepSettings,

    /// Snapshot index of the block being sliced.
    st_block_index: u8,
    /// The block was interrupted by a replan and resumes on the same
    /// snapshot.
    partial_block: bool,
    /// Ramp of the block being sliced. `None` forces a reload.
    profile: Option<VelocityProfile>,

    /// Steps left in the block, fractional.
    steps_remaining: f32,
    step_per_mm: f32,
    req_mm_increment: f32,
    /// Time of the partial step carried into the next segment, minutes.
    dt_remainder: f32,
    /// Speed at the end of the last prepared segment, mm/min.
    current_speed: f32,
}

impl SegmentPreparer {
    /// Create a preparer for the given step generator settings.
    pub fn new(config: &StepperConfig) -> Self {
        Self {
            settings: PrepSettings::from_config(config),
            st_block_index: 0,
            partial_block: false,
            profile: None,
            steps_remaining: 0.0,
            step_per_mm: 0.0,
            req_mm_increment: 0.0,
            dt_remainder: 0.0,
            current_speed: 0.0,
        }
    }

    /// Forget all slicing state.
    pub fn reset(&mut self) {
        *self = Self {
            settings: self.settings,
            ..Self::new(&StepperConfig::default())
        };
    }

    /// Speed of the most recently prepared segment in mm/min. Leads the
    /// physical motion by up to one segment buffer.
    #[inline]
    pub fn realtime_rate(&self) -> f32 {
        self.current_speed
    }

    /// Shape of the ramp being sliced.
    pub fn ramp_shape(&self) -> Option<RampShape> {
        self.profile.map(|p| p.shape)
    }

    /// Top up the segment ring from the planner.
    ///
    /// Does nothing when the ring is full, the queue is empty, or a forced
    /// stop has already come to rest.
    pub fn fill_segment_buffer<H: StepperHal>(
        &mut self,
        planner: &mut Planner,
        stepper: &Stepper<H>,
        state: &MachineState,
    ) {
        let suspending = state.run_state().is_any(RunState::SUSPENDING);
        if suspending && self.current_speed == 0.0 {
            return;
        }

        while !stepper.is_full() {
            if self.profile.is_none() && !self.load_block(planner, stepper, suspending) {
                return;
            }
            if !self.prepare_segment(planner, stepper, suspending) {
                return;
            }
        }
    }

    /// Start slicing the planner's current block. Returns `false` when the
    /// queue is empty.
    fn load_block<H: StepperHal>(
        &mut self,
        planner: &mut Planner,
        stepper: &Stepper<H>,
        suspending: bool,
    ) -> bool {
        let exit_speed_sqr = planner.exec_block_exit_speed_sqr();
        let Some(block) = planner.current_block_mut() else {
            return false;
        };

        if self.partial_block {
            // Same block, same snapshot: only the ramp is re-derived
            self.partial_block = false;
        } else {
            self.st_block_index = (self.st_block_index + 1) % ST_BLOCK_BUFFER_SIZE as u8;

            let shift = self.settings.block_shift;
            stepper.store_block(
                self.st_block_index,
                StBlock {
                    direction_bits: block.direction_bits,
                    steps: block.steps.map(|s| s << shift),
                    step_event_count: block.step_event_count << shift,
                },
            );

            self.steps_remaining = block.step_event_count as f32;
            self.step_per_mm = self.steps_remaining / block.millimeters;
            self.req_mm_increment = REQ_MM_INCREMENT_SCALAR / self.step_per_mm;
            self.dt_remainder = 0.0;

            if suspending {
                // The stop carries over from the previous block
                block.entry_speed_sqr = self.current_speed * self.current_speed;
            } else {
                self.current_speed = sqrtf(block.entry_speed_sqr);
            }
        }

        let profile = if suspending {
            VelocityProfile::forced_stop(block.entry_speed_sqr, block.acceleration, block.millimeters)
        } else {
            VelocityProfile::plan(
                block.entry_speed_sqr,
                exit_speed_sqr,
                block.nominal_speed_sqr,
                block.acceleration,
                block.millimeters,
            )
        };

        trace!(
            "prep: block {} loaded, {} mm, shape {}",
            self.st_block_index,
            block.millimeters,
            profile.shape
        );

        self.profile = Some(profile);
        true
    }

    /// Prepare one segment. Returns `false` when preparation must stop for
    /// this call.
    fn prepare_segment<H: StepperHal>(
        &mut self,
        planner: &mut Planner,
        stepper: &Stepper<H>,
        suspending: bool,
    ) -> bool {
        let (Some(block), Some(mut profile)) = (planner.current_block(), self.profile) else {
            return false;
        };
        let acceleration = block.acceleration;
        let block_mm = block.millimeters;

        let dt_segment = self.settings.dt_segment;
        let mut dt_max = dt_segment;
        let mut dt = 0.0;
        let mut time_var = dt_max;
        let mut mm_remaining = block_mm;
        let minimum_mm = (mm_remaining - self.req_mm_increment).max(0.0);

        // Walk the ramp for one segment duration, extending it until at
        // least one whole step is covered
        loop {
            match profile.ramp {
                RampType::Accel => {
                    let speed_var = acceleration * time_var;
                    let mm_start = mm_remaining;
                    mm_remaining -= time_var * (self.current_speed + 0.5 * speed_var);
                    if mm_remaining < profile.accelerate_until {
                        mm_remaining = profile.accelerate_until;
                        time_var = 2.0 * (mm_start - mm_remaining)
                            / (self.current_speed + profile.maximum_speed);
                        profile.ramp = if mm_remaining == profile.decelerate_after {
                            RampType::Decel
                        } else {
                            RampType::Cruise
                        };
                        self.current_speed = profile.maximum_speed;
                    } else {
                        self.current_speed += speed_var;
                    }
                }
                RampType::Cruise => {
                    let mm_var = mm_remaining - profile.maximum_speed * time_var;
                    if mm_var < profile.decelerate_after {
                        time_var = (mm_remaining - profile.decelerate_after) / profile.maximum_speed;
                        mm_remaining = profile.decelerate_after;
                        profile.ramp = RampType::Decel;
                    } else {
                        mm_remaining = mm_var;
                    }
                }
                RampType::Decel => {
                    let speed_var = acceleration * time_var;
                    let mut ramp_end = true;
                    if self.current_speed > speed_var {
                        let mm_var = mm_remaining - time_var * (self.current_speed - 0.5 * speed_var);
                        if mm_var > profile.mm_complete {
                            mm_remaining = mm_var;
                            // Speed from the distance left, so rounding in
                            // the distance cannot strand the stop
                            self.current_speed = sqrtf(
                                profile.exit_speed * profile.exit_speed
                                    + 2.0 * acceleration * (mm_remaining - profile.mm_complete),
                            );
                            ramp_end = false;
                        }
                    }
                    if ramp_end {
                        let speed_sum = self.current_speed + profile.exit_speed;
                        time_var = if speed_sum > 0.0 {
                            2.0 * (mm_remaining - profile.mm_complete) / speed_sum
                        } else {
                            0.0
                        };
                        mm_remaining = profile.mm_complete;
                        self.current_speed = profile.exit_speed;
                    }
                }
            }

            dt += time_var;
            if dt < dt_max {
                time_var = dt_max - dt;
            } else if mm_remaining > minimum_mm {
                dt_max += dt_segment;
                time_var = dt_max - dt;
            } else {
                break;
            }

            if mm_remaining <= profile.mm_complete {
                break;
            }
        }
        self.profile = Some(profile);

        // Whole steps from the exact remaining distance, not a running sum
        let step_dist_remaining = self.step_per_mm * mm_remaining;
        let last_n_steps_remaining = ceilf(self.steps_remaining);
        let n_steps_remaining = ceilf(step_dist_remaining).min(last_n_steps_remaining);
        let n_step = (last_n_steps_remaining - n_steps_remaining) as u32;

        if n_step == 0 {
            if suspending {
                // Less than a step to go before rest: the stop is reached here
                self.finish_forced_stop(planner, last_n_steps_remaining);
                return false;
            }
            // Not a whole step yet: carry the slice time forward
            self.dt_remainder += dt;
            if let Some(block) = planner.current_block_mut() {
                block.millimeters = mm_remaining;
            }
            return true;
        }

        // Average rate over the steps actually covered, including the
        // partial step carried in from the previous segment
        dt += self.dt_remainder;
        let inv_rate = dt / (last_n_steps_remaining - step_dist_remaining);
        self.dt_remainder = (n_steps_remaining - step_dist_remaining) * inv_rate;

        let cycles = ceilf(self.settings.cycles_per_min * inv_rate) as u32;
        let level = self.settings.smoothing_level(cycles);
        let segment = Segment {
            n_step: n_step << level,
            cycles_per_tick: (cycles >> level).min(self.settings.max_timer_period),
            st_block_index: self.st_block_index,
            smoothing_level: level,
        };
        if stepper.push_segment(segment).is_err() {
            return false;
        }

        self.steps_remaining = n_steps_remaining;
        if let Some(block) = planner.current_block_mut() {
            block.millimeters = mm_remaining;
        }

        if mm_remaining <= profile.mm_complete {
            if mm_remaining > 0.0 {
                // Forced stop ended inside the block; it stays queued
                self.finish_forced_stop(planner, n_steps_remaining);
                return false;
            }

            self.profile = None;
            planner.discard_current_block();
            trace!("prep: block {} complete", self.st_block_index);

            if suspending && self.current_speed == 0.0 {
                // Came to rest exactly on the block boundary
                if let Some(next) = planner.current_block_mut() {
                    next.entry_speed_sqr = 0.0;
                }
                planner.cycle_reinitialize(self);
                return false;
            }
        }

        true
    }

    /// Park a block that a forced stop ended inside of. The remaining length
    /// is rounded up to whole steps and the queue is replanned from rest.
    fn finish_forced_stop(&mut self, planner: &mut Planner, steps_remaining: f32) {
        self.current_speed = 0.0;
        self.dt_remainder = 0.0;
        self.steps_remaining = steps_remaining;
        if let Some(block) = planner.current_block_mut() {
            block.millimeters = steps_remaining / self.step_per_mm;
        }
        planner.cycle_reinitialize(self);
        debug!("prep: stopped with {} steps left in block", steps_remaining);
    }
}

impl ExecutingBlock for SegmentPreparer {
    fn notify_entry_speed_updated(&mut self) -> Option<f32> {
        self.profile.take().map(|_| {
            self.partial_block = true;
            self.current_speed
        })
    }
}
