//! Motion constraints derived from machine configuration.

use super::limits::SoftLimits;
use super::system::{Kinematics, MachineConfig};
use crate::N_AXIS;

/// Derived planning parameters computed from the machine configuration.
///
/// These are computed once at initialization and passed to the planner with
/// every enqueued move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionConstraints {
    /// Steps per millimeter for each axis (motor, under CoreXY).
    pub steps_per_mm: [f32; N_AXIS],

    /// Maximum rate per axis in mm/min.
    pub max_rate: [f32; N_AXIS],

    /// Maximum acceleration per axis in mm/min².
    pub acceleration: [f32; N_AXIS],

    /// Junction deviation in mm.
    pub junction_deviation: f32,

    /// Minimum junction speed squared, (mm/min)².
    pub minimum_junction_speed_sqr: f32,

    /// Feed rate floor in mm/min.
    pub minimum_feed_rate: f32,

    /// Kinematic layout.
    pub kinematics: Kinematics,

    /// Soft limits, if enabled.
    pub soft_limits: Option<SoftLimits>,
}

impl MotionConstraints {
    /// Compute motion constraints from machine configuration.
    pub fn from_config(config: &MachineConfig) -> Self {
        let axes = config.axes.as_array();

        let steps_per_mm = [axes[0].steps_per_mm, axes[1].steps_per_mm, axes[2].steps_per_mm];
        let max_rate = [axes[0].max_rate.0, axes[1].max_rate.0, axes[2].max_rate.0];

        // Acceleration is configured per second but planned per minute
        let acceleration = [
            axes[0].acceleration.per_min_squared(),
            axes[1].acceleration.per_min_squared(),
            axes[2].acceleration.per_min_squared(),
        ];

        let soft_limits = config.machine.soft_limits.then(|| config.soft_limits());

        Self {
            steps_per_mm,
            max_rate,
            acceleration,
            junction_deviation: config.planner.junction_deviation.0,
            minimum_junction_speed_sqr: config.planner.minimum_junction_speed.squared(),
            minimum_feed_rate: config.planner.minimum_feed_rate.0,
            kinematics: config.machine.kinematics,
            soft_limits,
        }
    }

    /// Convert a millimeter target on one axis to absolute steps.
    #[inline]
    pub fn mm_to_steps(&self, axis: usize, mm: f32) -> i32 {
        libm::roundf(mm * self.steps_per_mm[axis]) as i32
    }

    /// Convert absolute steps on one axis to millimeters.
    #[inline]
    pub fn steps_to_mm(&self, axis: usize, steps: i32) -> f32 {
        steps as f32 / self.steps_per_mm[axis]
    }
}

impl Default for MotionConstraints {
    fn default() -> Self {
        Self::from_config(&MachineConfig::default())
    }
}
