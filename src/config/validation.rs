//! Configuration validation.

use crate::error::{ConfigError, Result};

use super::{AxisConfig, MachineConfig, PlannerConfig, StepperConfig};

/// Validate a machine configuration.
///
/// Checks:
/// - Axis scales, rates and accelerations are positive
/// - Axis travels are not negative
/// - Junction deviation and feed rate floor are positive
/// - The step timer and segment rate are usable, and a step pulse fits
///   inside one segment
pub fn validate_config(config: &MachineConfig) -> Result<()> {
    for (idx, axis) in config.axes.as_array().iter().enumerate() {
        validate_axis(idx, axis)?;
    }

    validate_planner(&config.planner)?;
    validate_stepper(&config.stepper)?;

    Ok(())
}

fn validate_axis(axis: usize, config: &AxisConfig) -> Result<()> {
    // NaN fails every comparison, so test for the valid range
    if !(config.steps_per_mm > 0.0) {
        return Err(ConfigError::InvalidStepsPerMm {
            axis,
            value: config.steps_per_mm,
        }
        .into());
    }

    if !(config.max_rate.0 > 0.0) {
        return Err(ConfigError::InvalidMaxRate {
            axis,
            value: config.max_rate.0,
        }
        .into());
    }

    if !(config.acceleration.0 > 0.0) {
        return Err(ConfigError::InvalidAcceleration {
            axis,
            value: config.acceleration.0,
        }
        .into());
    }

    if !(config.max_travel.0 >= 0.0) {
        return Err(ConfigError::InvalidMaxTravel {
            axis,
            value: config.max_travel.0,
        }
        .into());
    }

    Ok(())
}

fn validate_planner(config: &PlannerConfig) -> Result<()> {
    if !(config.junction_deviation.0 > 0.0) {
        return Err(ConfigError::InvalidJunctionDeviation(config.junction_deviation.0).into());
    }

    if !(config.minimum_feed_rate.0 > 0.0) {
        return Err(ConfigError::InvalidMinimumFeedRate(config.minimum_feed_rate.0).into());
    }

    Ok(())
}

fn validate_stepper(config: &StepperConfig) -> Result<()> {
    if config.timer_frequency_hz == 0 {
        return Err(ConfigError::InvalidTimerFrequency(config.timer_frequency_hz).into());
    }

    if config.acceleration_ticks_per_second == 0 {
        return Err(ConfigError::InvalidSegmentRate(config.acceleration_ticks_per_second).into());
    }

    // The pulse must end well before the segment does
    let segment_us = 1_000_000 / u32::from(config.acceleration_ticks_per_second);
    if config.pulse_microseconds == 0 || u32::from(config.pulse_microseconds) >= segment_us {
        return Err(ConfigError::InvalidPulseWidth(config.pulse_microseconds).into());
    }

    Ok(())
}
