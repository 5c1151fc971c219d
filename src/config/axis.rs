//! Per-axis configuration from TOML.

use serde::Deserialize;

use super::limits::TravelLimits;
use super::units::{Millimeters, MmPerMin, MmPerSecSquared};

/// Configuration of one linear axis.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AxisConfig {
    /// Motor steps per millimeter of travel (microstepping included).
    pub steps_per_mm: f32,

    /// Maximum axis rate in millimeters per minute. Also the rapid rate.
    #[serde(rename = "max_rate_mm_per_min")]
    pub max_rate: MmPerMin,

    /// Maximum axis acceleration in millimeters per second squared.
    #[serde(rename = "acceleration_mm_per_sec2")]
    pub acceleration: MmPerSecSquared,

    /// Total travel from the home position. The workspace spans
    /// `[-max_travel, 0]` in machine coordinates.
    #[serde(default, rename = "max_travel_mm")]
    pub max_travel: Millimeters,

    /// Invert direction pin logic.
    #[serde(default)]
    pub invert_direction: bool,

    /// Invert step pin logic (active-low pulses).
    #[serde(default)]
    pub invert_step: bool,
}

impl AxisConfig {
    /// Create an axis with the given scale, rate and acceleration.
    pub fn new(steps_per_mm: f32, max_rate: MmPerMin, acceleration: MmPerSecSquared) -> Self {
        Self {
            steps_per_mm,
            max_rate,
            acceleration,
            max_travel: Millimeters(200.0),
            invert_direction: false,
            invert_step: false,
        }
    }

    /// Travel limits in machine coordinates.
    pub fn travel_limits(&self) -> TravelLimits {
        TravelLimits::from_max_travel(self.max_travel)
    }
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self::new(250.0, MmPerMin(500.0), MmPerSecSquared(10.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_axis_limits() {
        let axis = AxisConfig::default();
        let limits = axis.travel_limits();

        assert_eq!(limits.min.0, -200.0);
        assert_eq!(limits.max.0, 0.0);
    }
}
