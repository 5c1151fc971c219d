//! Soft limit configuration and types.

use super::units::Millimeters;

/// Allowed travel of one axis in machine coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelLimits {
    /// Minimum allowed position in millimeters.
    pub min: Millimeters,

    /// Maximum allowed position in millimeters.
    pub max: Millimeters,
}

impl TravelLimits {
    /// Create new travel limits.
    pub fn new(min: Millimeters, max: Millimeters) -> Self {
        Self { min, max }
    }

    /// Limits for a machine homed at the positive end of travel: the
    /// workspace is `[-max_travel, 0]`.
    pub fn from_max_travel(max_travel: Millimeters) -> Self {
        Self {
            min: -max_travel,
            max: Millimeters(0.0),
        }
    }

    /// Check if limits are valid (min <= max).
    pub fn is_valid(&self) -> bool {
        self.min.0 <= self.max.0
    }

    /// Check if a position is within limits.
    pub fn contains(&self, position: Millimeters) -> bool {
        position.0 >= self.min.0 && position.0 <= self.max.0
    }
}

/// Soft limits for every axis, checked against each target before it is
/// queued.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftLimits {
    /// Per-axis travel limits.
    pub axes: [TravelLimits; crate::N_AXIS],
}

impl SoftLimits {
    /// Index of the first axis whose target lies outside its travel.
    pub fn violation(&self, target: &[f32; crate::N_AXIS]) -> Option<usize> {
        self.axes
            .iter()
            .zip(target.iter())
            .position(|(limits, &t)| !limits.contains(Millimeters(t)))
    }

    /// Check if every axis target lies within travel.
    pub fn contains(&self, target: &[f32; crate::N_AXIS]) -> bool {
        self.violation(target).is_none()
    }
}
