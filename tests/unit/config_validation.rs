//! Unit tests for configuration validation.

use cnc_motion::config::units::{Millimeters, MmPerMin, MmPerSecSquared};
use cnc_motion::config::{parse_config, validate_config, AxisConfig, MachineConfig};
use cnc_motion::error::{ConfigError, Error};
use cnc_motion::stepper::{SimHal, Stepper};
use cnc_motion::system::MachineState;
use cnc_motion::Machine;
use embedded_hal_mock::eh1::delay::NoopDelay;

/// Test validation of the default configuration.
#[test]
fn test_default_config_passes_validation() {
    assert!(validate_config(&MachineConfig::default()).is_ok());
}

/// Test validation fails for a non-positive axis scale.
#[test]
fn test_invalid_steps_per_mm() {
    let mut config = MachineConfig::default();
    config.axes.z.steps_per_mm = 0.0;

    let result = validate_config(&config);
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::InvalidStepsPerMm { axis: 2, .. }))
    ));
}

/// Test validation fails for a NaN rate.
#[test]
fn test_nan_max_rate() {
    let mut config = MachineConfig::default();
    config.axes.x.max_rate = MmPerMin(f32::NAN);

    let result = validate_config(&config);
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::InvalidMaxRate { axis: 0, .. }))
    ));
}

/// Test validation fails for a negative acceleration.
#[test]
fn test_negative_acceleration() {
    let mut config = MachineConfig::default();
    config.axes.y = AxisConfig::new(80.0, MmPerMin(1000.0), MmPerSecSquared(-5.0));

    let result = validate_config(&config);
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::InvalidAcceleration { axis: 1, .. }))
    ));
}

/// Test validation fails for a negative travel.
#[test]
fn test_negative_travel() {
    let mut config = MachineConfig::default();
    config.axes.x.max_travel = Millimeters(-1.0);

    let result = validate_config(&config);
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::InvalidMaxTravel { axis: 0, .. }))
    ));
}

/// Test validation fails for a zero feed rate floor.
#[test]
fn test_invalid_minimum_feed_rate() {
    let mut config = MachineConfig::default();
    config.planner.minimum_feed_rate = MmPerMin(0.0);

    let result = validate_config(&config);
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::InvalidMinimumFeedRate(_)))
    ));
}

/// Test validation fails when no segment fits a step pulse.
#[test]
fn test_pulse_longer_than_segment() {
    let mut config = MachineConfig::default();
    config.stepper.acceleration_ticks_per_second = 10_000;
    config.stepper.pulse_microseconds = 100;

    let result = validate_config(&config);
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::InvalidPulseWidth(100)))
    ));
}

/// Test validation fails for a stopped step timer.
#[test]
fn test_zero_timer_frequency() {
    let mut config = MachineConfig::default();
    config.stepper.timer_frequency_hz = 0;

    let result = validate_config(&config);
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::InvalidTimerFrequency(0)))
    ));
}

/// Test that parsing runs validation.
#[test]
fn test_parse_rejects_invalid_values() {
    let toml_str = r#"
[planner]
junction_deviation_mm = -0.5
"#;

    let result = parse_config(toml_str);
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::InvalidJunctionDeviation(_)))
    ));
}

/// Test that the machine refuses an invalid configuration.
#[test]
fn test_machine_rejects_invalid_config() {
    let mut config = MachineConfig::default();
    config.axes.x.steps_per_mm = -80.0;

    let state = MachineState::new();
    let stepper = Stepper::new(SimHal::new(), &config);
    let result = Machine::new(config, &state, &stepper, (), NoopDelay::new());

    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::InvalidStepsPerMm { axis: 0, .. }))
    ));
}
