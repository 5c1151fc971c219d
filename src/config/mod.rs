//! Configuration module for cnc-motion.
//!
//! Provides types for loading and validating machine configuration from TOML
//! files (with `std` feature) or pre-built values, and the derived
//! [`MotionConstraints`] the planner consumes.

mod axis;
mod constraints;
mod limits;
mod planning;
mod stepper;
mod system;
pub mod units;
#[cfg(feature = "std")]
mod loader;
mod validation;

pub use axis::AxisConfig;
pub use constraints::MotionConstraints;
pub use limits::{SoftLimits, TravelLimits};
pub use planning::PlannerConfig;
pub use stepper::{StepperConfig, MAX_SMOOTHING_LEVEL};
pub use system::{Axes, Kinematics, MachineConfig, MachineOptions};
pub use validation::validate_config;

#[cfg(feature = "std")]
pub use loader::{load_config, parse_config};

// Re-export unit types at config level
pub use units::{Millimeters, MmPerMin, MmPerSecSquared, UnitExt};
