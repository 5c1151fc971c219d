//! Error types for cnc-motion.
//!
//! Provides unified error handling across configuration, planning and the
//! alarm conditions raised by the realtime coordinator.

use core::fmt;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all cnc-motion operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration parsing or validation error
    Config(ConfigError),
    /// Planner buffer error
    Planner(PlannerError),
    /// Motion stopped by an alarm condition
    Alarm(Alarm),
    /// A system abort was latched while the operation was waiting
    Aborted,
    /// The machine is in the Alarm state and refuses motion until unlocked
    Locked,
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to parse TOML configuration
    ParseError(heapless::String<128>),
    /// Steps per millimeter must be > 0
    InvalidStepsPerMm {
        /// Axis index
        axis: usize,
        /// Offending value
        value: f32,
    },
    /// Maximum rate must be > 0
    InvalidMaxRate {
        /// Axis index
        axis: usize,
        /// Offending value
        value: f32,
    },
    /// Acceleration must be > 0
    InvalidAcceleration {
        /// Axis index
        axis: usize,
        /// Offending value
        value: f32,
    },
    /// Maximum travel must be >= 0
    InvalidMaxTravel {
        /// Axis index
        axis: usize,
        /// Offending value
        value: f32,
    },
    /// Junction deviation must be > 0
    InvalidJunctionDeviation(f32),
    /// Minimum feed rate must be > 0
    InvalidMinimumFeedRate(f32),
    /// Step timer frequency must be > 0
    InvalidTimerFrequency(u32),
    /// Segment rate (acceleration ticks per second) must be > 0
    InvalidSegmentRate(u16),
    /// Step pulse does not fit the step timer
    InvalidPulseWidth(u8),
    /// File I/O error (std only)
    #[cfg(feature = "std")]
    IoError(heapless::String<128>),
}

/// Planner buffer errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlannerError {
    /// No free slot in the block ring buffer. Retry after running the
    /// realtime coordinator.
    BufferFull,
}

/// Alarm conditions. Each one forces the Alarm state and blocks motion
/// until an explicit reset or unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Alarm {
    /// A limit switch was hit
    HardLimit,
    /// A target lies outside the configured travel
    SoftLimit,
    /// Reset while in motion; position may be lost
    AbortCycle,
    /// Probe was already triggered, or never triggered
    ProbeFail,
    /// Homing cycle failed or was interrupted
    HomingFail,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Planner(e) => write!(f, "Planner error: {}", e),
            Error::Alarm(a) => write!(f, "Alarm: {}", a),
            Error::Aborted => write!(f, "Operation aborted by system reset"),
            Error::Locked => write!(f, "Machine locked by alarm, unlock or reset first"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::InvalidStepsPerMm { axis, value } => {
                write!(f, "Invalid steps/mm on axis {}: {}. Must be > 0", axis, value)
            }
            ConfigError::InvalidMaxRate { axis, value } => {
                write!(f, "Invalid max rate on axis {}: {}. Must be > 0", axis, value)
            }
            ConfigError::InvalidAcceleration { axis, value } => {
                write!(f, "Invalid acceleration on axis {}: {}. Must be > 0", axis, value)
            }
            ConfigError::InvalidMaxTravel { axis, value } => {
                write!(f, "Invalid max travel on axis {}: {}. Must be >= 0", axis, value)
            }
            ConfigError::InvalidJunctionDeviation(v) => {
                write!(f, "Invalid junction deviation: {}. Must be > 0", v)
            }
            ConfigError::InvalidMinimumFeedRate(v) => {
                write!(f, "Invalid minimum feed rate: {}. Must be > 0", v)
            }
            ConfigError::InvalidTimerFrequency(v) => {
                write!(f, "Invalid step timer frequency: {}. Must be > 0", v)
            }
            ConfigError::InvalidSegmentRate(v) => {
                write!(f, "Invalid acceleration ticks per second: {}. Must be > 0", v)
            }
            ConfigError::InvalidPulseWidth(v) => {
                write!(f, "Step pulse of {} us does not fit the step timer", v)
            }
            #[cfg(feature = "std")]
            ConfigError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerError::BufferFull => write!(f, "Planner buffer full"),
        }
    }
}

impl fmt::Display for Alarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alarm::HardLimit => write!(f, "Hard limit triggered. Position likely lost"),
            Alarm::SoftLimit => write!(f, "Soft limit: target exceeds machine travel"),
            Alarm::AbortCycle => write!(f, "Reset during cycle. Position likely lost"),
            Alarm::ProbeFail => write!(f, "Probe fail"),
            Alarm::HomingFail => write!(f, "Homing fail"),
        }
    }
}

// Conversion impls
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<PlannerError> for Error {
    fn from(e: PlannerError) -> Self {
        Error::Planner(e)
    }
}

impl From<Alarm> for Error {
    fn from(a: Alarm) -> Self {
        Error::Alarm(a)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "std")]
impl std::error::Error for PlannerError {}

#[cfg(feature = "std")]
impl std::error::Error for Alarm {}
