//! # cnc-motion
//!
//! Real-time motion core for three-axis CNC machines with embedded-hal 1.0
//! support.
//!
//! ## Features
//!
//! - **Look-ahead planning**: Junction speeds from the direction change,
//!   re-optimized over the whole queue on every append
//! - **Segment preparation**: Acceleration ramps sliced into short
//!   constant-rate segments with exact step accounting
//! - **Step interrupt**: Bresenham line tracing with adaptive multi-axis
//!   step smoothing
//! - **Realtime coordinator**: Feed hold, safety door, motion cancel,
//!   reset and alarm handling without ever blocking the main loop
//! - **no_std compatible**: No allocation, fixed-capacity buffers only
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cnc_motion::{LineData, Machine, MachineState, Stepper};
//!
//! static STATE: MachineState = MachineState::new();
//!
//! let config = cnc_motion::load_config("machine.toml")?;
//! let stepper = Stepper::new(pins, &config);
//! let mut machine = Machine::new(config, &STATE, &stepper, (), delay)?;
//!
//! // Step timer interrupt: stepper.on_tick(&STATE)
//! machine.line(&[-10.0, -10.0, 0.0], &LineData::feed(600.0))?;
//! machine.buffer_synchronize()?;
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Enables file I/O and TOML parsing
//! - `defmt`: Enables defmt logging for embedded targets

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow large error types - necessary for no_std with heapless strings
#![allow(clippy::result_large_err)]

// Must come first so the logging macros are visible in every module
#[macro_use]
mod fmt;

// Core modules
pub mod axes;
pub mod config;
pub mod error;
pub mod machine;
pub mod planner;
pub mod stepper;
pub mod system;

/// Number of linear axes.
pub const N_AXIS: usize = 3;

/// Planner ring capacity. One slot stays free, so up to
/// `BLOCK_BUFFER_SIZE - 1` moves are queued.
pub const BLOCK_BUFFER_SIZE: usize = 16;

/// Segment ring capacity. One slot stays free.
pub const SEGMENT_BUFFER_SIZE: usize = 6;

// Re-exports for ergonomic API
pub use axes::{AxisMask, Position};
pub use config::{validate_config, Kinematics, MachineConfig, MotionConstraints};
pub use error::{Alarm, Error, Result};
pub use machine::{Accessories, Machine, StatusSnapshot};
pub use planner::{BufferStatus, LineData, Planner, RateMode};
pub use stepper::{PinPort, SegmentPreparer, SimHal, StepTimer, Stepper, StepperHal};
pub use system::{MachineState, ProbeMonitor, RunState};

// Configuration loading (std only)
#[cfg(feature = "std")]
pub use config::{load_config, parse_config};

// Unit types
pub use config::units::{Millimeters, MmPerMin, MmPerSecSquared};
