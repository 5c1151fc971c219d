//! Machine configuration - root configuration structure.

use serde::Deserialize;

use super::axis::AxisConfig;
use super::limits::SoftLimits;
use super::planning::PlannerConfig;
use super::stepper::StepperConfig;
use crate::N_AXIS;

/// Machine kinematics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Kinematics {
    /// One motor per axis.
    #[default]
    Cartesian,
    /// X and Y driven by two belts: motor A moves X+Y, motor B moves X-Y.
    CoreXY,
}

/// The three linear axes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Axes {
    /// X axis.
    pub x: AxisConfig,
    /// Y axis.
    pub y: AxisConfig,
    /// Z axis.
    pub z: AxisConfig,
}

impl Axes {
    /// Same configuration on every axis.
    pub fn uniform(axis: AxisConfig) -> Self {
        Self {
            x: axis,
            y: axis,
            z: axis,
        }
    }

    /// Axis configs in index order.
    pub fn as_array(&self) -> [&AxisConfig; N_AXIS] {
        [&self.x, &self.y, &self.z]
    }

    /// Get an axis by index.
    pub fn get(&self, idx: usize) -> Option<&AxisConfig> {
        self.as_array().get(idx).copied()
    }
}

/// Machine-level options.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct MachineOptions {
    /// Kinematic layout of the X/Y motors.
    pub kinematics: Kinematics,

    /// Check every target against the axis travel before queueing it.
    pub soft_limits: bool,

    /// Start locked in the Alarm state until explicitly unlocked.
    pub alarm_on_boot: bool,

    /// Spindle spin-up wait when resuming from a safety door stop.
    pub door_spindle_delay_ms: u32,

    /// Coolant wait when resuming from a safety door stop.
    pub door_coolant_delay_ms: u32,
}

impl Default for MachineOptions {
    fn default() -> Self {
        Self {
            kinematics: Kinematics::Cartesian,
            soft_limits: false,
            alarm_on_boot: false,
            door_spindle_delay_ms: 4000,
            door_coolant_delay_ms: 1000,
        }
    }
}

/// Root configuration structure from TOML.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct MachineConfig {
    /// Per-axis settings.
    #[serde(default)]
    pub axes: Axes,

    /// Look-ahead planner settings.
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Step generator settings.
    #[serde(default)]
    pub stepper: StepperConfig,

    /// Machine-level options.
    #[serde(default)]
    pub machine: MachineOptions,
}

impl MachineConfig {
    /// Get an axis configuration by index.
    pub fn axis(&self, idx: usize) -> Option<&AxisConfig> {
        self.axes.get(idx)
    }

    /// Soft limits derived from the axis travels.
    pub fn soft_limits(&self) -> SoftLimits {
        let axes = self.axes.as_array();
        SoftLimits {
            axes: [
                axes[0].travel_limits(),
                axes[1].travel_limits(),
                axes[2].travel_limits(),
            ],
        }
    }
}
