//! Velocity ramp of one planner block.
//!
//! Classifies a block into accelerate/cruise/decelerate phases from its entry,
//! exit and nominal speeds. Distances are measured as millimeters *remaining*
//! in the block, so thresholds shrink toward zero as the block executes.

use libm::sqrtf;

/// Current phase of the ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RampType {
    /// Speeding up toward the maximum speed.
    #[default]
    Accel,
    /// Holding the maximum speed.
    Cruise,
    /// Slowing down toward the exit speed.
    Decel,
}

/// Overall shape of a block's ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RampShape {
    /// Accelerates over the whole block.
    AccelOnly,
    /// Decelerates over the whole block.
    DecelOnly,
    /// Entry, exit and nominal speed are all equal.
    CruiseOnly,
    /// Reaches nominal speed and leaves at it.
    AccelCruise,
    /// Enters at nominal speed and slows before the end.
    CruiseDecel,
    /// Accelerates, cruises at nominal speed, decelerates.
    Trapezoid,
    /// Accelerates then decelerates without reaching nominal speed.
    Triangle,
}

/// Computed ramp for a block (or the rest of a partially executed block).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityProfile {
    /// Phase the block starts in.
    pub ramp: RampType,
    /// Remaining mm at which acceleration ends.
    pub accelerate_until: f32,
    /// Remaining mm at which deceleration starts.
    pub decelerate_after: f32,
    /// Peak speed in mm/min.
    pub maximum_speed: f32,
    /// Speed at the end of the executed part in mm/min.
    pub exit_speed: f32,
    /// Remaining mm at which execution of this block ends. Zero unless a
    /// forced stop ends inside the block.
    pub mm_complete: f32,
    /// Overall shape.
    pub shape: RampShape,
}

impl VelocityProfile {
    /// Plan the ramp of a block.
    ///
    /// # Arguments
    ///
    /// * `entry_speed_sqr` - Planned entry speed squared, (mm/min)²
    /// * `exit_speed_sqr` - Entry speed squared of the following block
    /// * `nominal_speed_sqr` - Cruise speed squared
    /// * `acceleration` - Block acceleration in mm/min²
    /// * `millimeters` - Remaining block length
    pub fn plan(
        entry_speed_sqr: f32,
        exit_speed_sqr: f32,
        nominal_speed_sqr: f32,
        acceleration: f32,
        millimeters: f32,
    ) -> Self {
        let inv_2_accel = 0.5 / acceleration;
        let exit_speed = sqrtf(exit_speed_sqr);

        let mut profile = Self {
            ramp: RampType::Accel,
            accelerate_until: millimeters,
            decelerate_after: 0.0,
            maximum_speed: exit_speed,
            exit_speed,
            mm_complete: 0.0,
            shape: RampShape::AccelOnly,
        };

        // Where the accel curve from the entry meets the decel curve to the exit
        let intersect_distance =
            0.5 * (millimeters + inv_2_accel * (entry_speed_sqr - exit_speed_sqr));

        if intersect_distance <= 0.0 {
            // Entry too slow to even reach the exit speed: accelerate throughout
            profile.accelerate_until = 0.0;
            return profile;
        }

        if intersect_distance >= millimeters {
            // Entry too fast: decelerate throughout
            profile.ramp = RampType::Decel;
            profile.decelerate_after = millimeters;
            profile.maximum_speed = sqrtf(entry_speed_sqr);
            profile.shape = RampShape::DecelOnly;
            return profile;
        }

        profile.decelerate_after = inv_2_accel * (nominal_speed_sqr - exit_speed_sqr);
        if profile.decelerate_after < intersect_distance {
            // Nominal speed is reached
            profile.maximum_speed = sqrtf(nominal_speed_sqr);
            let cruise_exit = profile.decelerate_after <= 0.0;
            if entry_speed_sqr == nominal_speed_sqr {
                profile.ramp = RampType::Cruise;
                profile.shape = if cruise_exit {
                    RampShape::CruiseOnly
                } else {
                    RampShape::CruiseDecel
                };
            } else {
                profile.accelerate_until -= inv_2_accel * (nominal_speed_sqr - entry_speed_sqr);
                profile.shape = if cruise_exit {
                    RampShape::AccelCruise
                } else {
                    RampShape::Trapezoid
                };
            }
        } else {
            profile.accelerate_until = intersect_distance;
            profile.decelerate_after = intersect_distance;
            profile.maximum_speed = sqrtf(2.0 * acceleration * intersect_distance + exit_speed_sqr);
            profile.shape = RampShape::Triangle;
        }

        profile
    }

    /// Plan a forced deceleration to a stop from `entry_speed_sqr`.
    ///
    /// If the block is too short to stop in, the block is left at the speed
    /// reached and the stop continues into the next block. Otherwise
    /// `mm_complete` marks where in the block the stop lands.
    pub fn forced_stop(entry_speed_sqr: f32, acceleration: f32, millimeters: f32) -> Self {
        let inv_2_accel = 0.5 / acceleration;
        let mut profile = Self {
            ramp: RampType::Decel,
            accelerate_until: millimeters,
            decelerate_after: millimeters,
            maximum_speed: sqrtf(entry_speed_sqr),
            exit_speed: 0.0,
            mm_complete: 0.0,
            shape: RampShape::DecelOnly,
        };

        let decel_dist = millimeters - inv_2_accel * entry_speed_sqr;
        if decel_dist < 0.0 {
            profile.exit_speed = sqrtf(entry_speed_sqr - 2.0 * acceleration * millimeters);
        } else {
            profile.mm_complete = decel_dist;
        }

        profile
    }

    /// Time in minutes to run the ramp from the given entry speed. Exact
    /// for the piecewise constant-acceleration model.
    pub fn duration_min(&self, entry_speed: f32, acceleration: f32, millimeters: f32) -> f32 {
        let mut time = 0.0;
        let mut mm = millimeters;

        if self.ramp == RampType::Accel && mm > self.accelerate_until {
            time += (self.maximum_speed - entry_speed) / acceleration;
            mm = self.accelerate_until;
        }
        if self.ramp != RampType::Decel && mm > self.decelerate_after && self.maximum_speed > 0.0 {
            time += (mm - self.decelerate_after) / self.maximum_speed;
            mm = self.decelerate_after;
        }
        if mm > self.mm_complete {
            let start = if self.ramp == RampType::Decel {
                entry_speed
            } else {
                self.maximum_speed
            };
            time += (start - self.exit_speed) / acceleration;
        }

        time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCEL: f32 = 36_000.0;

    #[test]
    fn test_trapezoid_profile() {
        // 100 mm from rest to rest at 1000 mm/min
        let profile = VelocityProfile::plan(0.0, 0.0, 1_000_000.0, ACCEL, 100.0);

        assert_eq!(profile.shape, RampShape::Trapezoid);
        assert_eq!(profile.ramp, RampType::Accel);
        assert_eq!(profile.maximum_speed, 1000.0);
        // Ramp length v² / 2a on each side
        let ramp_mm = 1_000_000.0 / (2.0 * ACCEL);
        assert!((profile.accelerate_until - (100.0 - ramp_mm)).abs() < 1e-3);
        assert!((profile.decelerate_after - ramp_mm).abs() < 1e-3);
    }

    #[test]
    fn test_triangle_profile() {
        // Very short move that can't reach nominal speed
        let profile = VelocityProfile::plan(0.0, 0.0, 1_000_000.0, ACCEL, 2.0);

        assert_eq!(profile.shape, RampShape::Triangle);
        assert_eq!(profile.accelerate_until, profile.decelerate_after);
        assert!((profile.accelerate_until - 1.0).abs() < 1e-6);
        assert!((profile.maximum_speed - sqrtf(2.0 * ACCEL)).abs() < 1e-2);
    }

    #[test]
    fn test_single_phase_profiles() {
        let accel = VelocityProfile::plan(0.0, 250_000.0, 1_000_000.0, ACCEL, 1.0);
        assert_eq!(accel.shape, RampShape::AccelOnly);
        assert_eq!(accel.accelerate_until, 0.0);

        let decel = VelocityProfile::plan(250_000.0, 0.0, 1_000_000.0, ACCEL, 1.0);
        assert_eq!(decel.shape, RampShape::DecelOnly);
        assert_eq!(decel.ramp, RampType::Decel);
        assert_eq!(decel.maximum_speed, 500.0);

        let cruise = VelocityProfile::plan(1_000_000.0, 1_000_000.0, 1_000_000.0, ACCEL, 10.0);
        assert_eq!(cruise.shape, RampShape::CruiseOnly);
        assert_eq!(cruise.ramp, RampType::Cruise);
    }

    #[test]
    fn test_cruise_combinations() {
        let accel_cruise = VelocityProfile::plan(0.0, 1_000_000.0, 1_000_000.0, ACCEL, 100.0);
        assert_eq!(accel_cruise.shape, RampShape::AccelCruise);

        let cruise_decel = VelocityProfile::plan(1_000_000.0, 0.0, 1_000_000.0, ACCEL, 100.0);
        assert_eq!(cruise_decel.shape, RampShape::CruiseDecel);
        assert_eq!(cruise_decel.ramp, RampType::Cruise);
    }

    #[test]
    fn test_forced_stop_inside_block() {
        // 600 mm/min needs 5 mm to stop at 36000 mm/min²
        let profile = VelocityProfile::forced_stop(360_000.0, ACCEL, 20.0);

        assert_eq!(profile.exit_speed, 0.0);
        assert!((profile.mm_complete - 15.0).abs() < 1e-3);
    }

    #[test]
    fn test_forced_stop_past_block_end() {
        let profile = VelocityProfile::forced_stop(360_000.0, ACCEL, 2.0);

        assert_eq!(profile.mm_complete, 0.0);
        // v² = 360000 - 2 * 36000 * 2
        assert!((profile.exit_speed - sqrtf(216_000.0)).abs() < 1e-2);
    }

    #[test]
    fn test_duration_of_triangle() {
        // 100 mm at 500 mm/min²: peak sqrt(500 * 100), 2 * sqrt(100 / 500) minutes
        let profile = VelocityProfile::plan(0.0, 0.0, 1_000_000.0, 500.0, 100.0);

        assert_eq!(profile.shape, RampShape::Triangle);
        let expected = 2.0 * sqrtf(100.0 / 500.0);
        assert!((profile.duration_min(0.0, 500.0, 100.0) - expected).abs() < 1e-4);
    }
}
