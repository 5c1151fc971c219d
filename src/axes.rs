//! Axis masks and position conversions.
//!
//! The stepper executor tracks the machine position in motor steps. Under
//! CoreXY kinematics the X and Y motors do not map one-to-one onto the X and
//! Y axes, so every conversion between the planner's axis steps, the motor
//! steps and millimeters goes through this module.

use bitflags::bitflags;

use crate::config::{Kinematics, MotionConstraints};
use crate::N_AXIS;

/// X axis index (motor A under CoreXY).
pub const X_AXIS: usize = 0;
/// Y axis index (motor B under CoreXY).
pub const Y_AXIS: usize = 1;
/// Z axis index.
pub const Z_AXIS: usize = 2;

bitflags! {
    /// One bit per axis.
    ///
    /// Used for direction bits (bit set = negative direction), step pulses
    /// and the pin invert masks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AxisMask: u8 {
        /// X axis / motor A.
        const X = 1 << X_AXIS;
        /// Y axis / motor B.
        const Y = 1 << Y_AXIS;
        /// Z axis.
        const Z = 1 << Z_AXIS;
    }
}

impl AxisMask {
    /// Mask with only `axis` set.
    #[inline]
    pub fn axis(axis: usize) -> Self {
        Self::from_bits_truncate(1 << axis)
    }

    /// Check a single axis.
    #[inline]
    pub fn has_axis(self, axis: usize) -> bool {
        self.contains(Self::axis(axis))
    }
}

impl Kinematics {
    /// Map per-axis step deltas to per-motor step deltas.
    pub fn axes_to_motors(self, axis_steps: [i32; N_AXIS]) -> [i32; N_AXIS] {
        match self {
            Kinematics::Cartesian => axis_steps,
            Kinematics::CoreXY => {
                let mut motors = axis_steps;
                motors[X_AXIS] = axis_steps[X_AXIS] + axis_steps[Y_AXIS];
                motors[Y_AXIS] = axis_steps[X_AXIS] - axis_steps[Y_AXIS];
                motors
            }
        }
    }

    /// Map per-motor steps back to per-axis steps.
    pub fn motors_to_axes(self, motor_steps: [i32; N_AXIS]) -> [i32; N_AXIS] {
        match self {
            Kinematics::Cartesian => motor_steps,
            Kinematics::CoreXY => {
                let mut axes = motor_steps;
                axes[X_AXIS] = (motor_steps[X_AXIS] + motor_steps[Y_AXIS]) / 2;
                axes[Y_AXIS] = (motor_steps[X_AXIS] - motor_steps[Y_AXIS]) / 2;
                axes
            }
        }
    }
}

/// Machine position snapshot.
///
/// Holds motor steps as reported by the stepper executor and converts them
/// to axis steps and millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Motor steps from the origin.
    motor_steps: [i32; N_AXIS],
}

impl Position {
    /// Create a position from motor steps.
    #[inline]
    pub fn from_motor_steps(motor_steps: [i32; N_AXIS]) -> Self {
        Self { motor_steps }
    }

    /// Motor steps from the origin.
    #[inline]
    pub fn motor_steps(&self) -> [i32; N_AXIS] {
        self.motor_steps
    }

    /// Axis steps from the origin.
    #[inline]
    pub fn axis_steps(&self, kinematics: Kinematics) -> [i32; N_AXIS] {
        kinematics.motors_to_axes(self.motor_steps)
    }

    /// Axis position in millimeters.
    pub fn mm(&self, constraints: &MotionConstraints) -> [f32; N_AXIS] {
        let steps = self.axis_steps(constraints.kinematics);
        let mut mm = [0.0; N_AXIS];
        for (axis, value) in mm.iter_mut().enumerate() {
            *value = constraints.steps_to_mm(axis, steps[axis]);
        }
        mm
    }

    /// Steps needed on each axis to reach a target in millimeters.
    pub fn steps_to(&self, target: &[f32; N_AXIS], constraints: &MotionConstraints) -> [i32; N_AXIS] {
        let current = self.axis_steps(constraints.kinematics);
        let mut delta = [0; N_AXIS];
        for (axis, d) in delta.iter_mut().enumerate() {
            *d = constraints.mm_to_steps(axis, target[axis]) - current[axis];
        }
        delta
    }
}
