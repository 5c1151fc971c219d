//! Unit tests for TOML configuration parsing.

use cnc_motion::config::{load_config, parse_config, Kinematics, MachineConfig};
use cnc_motion::error::{ConfigError, Error};

const AXES: &str = r#"
[axes.x]
steps_per_mm = 80.0
max_rate_mm_per_min = 5000.0
acceleration_mm_per_sec2 = 250.0
max_travel_mm = 300.0

[axes.y]
steps_per_mm = 80.0
max_rate_mm_per_min = 5000.0
acceleration_mm_per_sec2 = 250.0
max_travel_mm = 200.0
invert_direction = true

[axes.z]
steps_per_mm = 400.0
max_rate_mm_per_min = 500.0
acceleration_mm_per_sec2 = 20.0
max_travel_mm = 80.0
invert_step = true
"#;

/// Test parsing per-axis settings.
#[test]
fn test_parse_axes() {
    let config: MachineConfig = toml::from_str(AXES).expect("Failed to parse TOML");

    assert_eq!(config.axes.x.steps_per_mm, 80.0);
    assert_eq!(config.axes.x.max_rate.0, 5000.0);
    assert_eq!(config.axes.x.acceleration.0, 250.0);
    assert_eq!(config.axes.x.max_travel.0, 300.0);
    assert!(!config.axes.x.invert_direction);

    assert!(config.axes.y.invert_direction);
    assert!(!config.axes.y.invert_step);

    assert_eq!(config.axes.z.steps_per_mm, 400.0);
    assert!(config.axes.z.invert_step);
}

/// Test that omitted sections fall back to defaults.
#[test]
fn test_parse_defaults_for_missing_sections() {
    let config = parse_config(AXES).expect("Failed to parse config");

    assert_eq!(config.planner.junction_deviation.0, 0.01);
    assert_eq!(config.planner.minimum_feed_rate.0, 1.0);
    assert_eq!(config.stepper.timer_frequency_hz, 16_000_000);
    assert_eq!(config.stepper.acceleration_ticks_per_second, 100);
    assert!(config.stepper.step_smoothing);
    assert_eq!(config.stepper.idle_lock_delay_ms, 25);
    assert_eq!(config.machine.kinematics, Kinematics::Cartesian);
    assert!(!config.machine.soft_limits);
    assert_eq!(config.machine.door_spindle_delay_ms, 4000);
}

/// Test parsing planner, stepper and machine sections.
#[test]
fn test_parse_full_config() {
    let toml_str = format!(
        r#"{AXES}
[planner]
junction_deviation_mm = 0.02
minimum_junction_speed_mm_per_min = 10.0
minimum_feed_rate_mm_per_min = 5.0

[stepper]
timer_frequency_hz = 20000000
acceleration_ticks_per_second = 120
pulse_microseconds = 5
idle_lock = true
idle_lock_delay_ms = 250
step_smoothing = false

[machine]
kinematics = "corexy"
soft_limits = true
alarm_on_boot = true
door_spindle_delay_ms = 2500
"#
    );

    let config = parse_config(&toml_str).expect("Failed to parse config");

    assert_eq!(config.planner.junction_deviation.0, 0.02);
    assert_eq!(config.planner.minimum_junction_speed.0, 10.0);
    assert_eq!(config.planner.minimum_feed_rate.0, 5.0);

    assert_eq!(config.stepper.timer_frequency_hz, 20_000_000);
    assert_eq!(config.stepper.acceleration_ticks_per_second, 120);
    assert_eq!(config.stepper.pulse_microseconds, 5);
    assert!(config.stepper.idle_lock);
    assert_eq!(config.stepper.idle_lock_delay_ms, 250);
    assert!(!config.stepper.step_smoothing);

    assert_eq!(config.machine.kinematics, Kinematics::CoreXY);
    assert!(config.machine.soft_limits);
    assert!(config.machine.alarm_on_boot);
    assert_eq!(config.machine.door_spindle_delay_ms, 2500);
    assert_eq!(config.machine.door_coolant_delay_ms, 1000);
}

/// Test that soft limits follow the axis travel.
#[test]
fn test_soft_limits_from_travel() {
    let config = parse_config(AXES).expect("Failed to parse config");
    let limits = config.soft_limits();

    assert!(limits.contains(&[-300.0, -200.0, -80.0]));
    assert!(limits.contains(&[0.0, 0.0, 0.0]));
    assert!(!limits.contains(&[-300.5, 0.0, 0.0]));
    assert!(!limits.contains(&[0.0, 0.1, 0.0]));
}

/// Test that a malformed document is reported as a parse error.
#[test]
fn test_parse_error() {
    let result = parse_config("[axes.x]\nsteps_per_mm = \"eighty\"\n");
    assert!(matches!(result, Err(Error::Config(ConfigError::ParseError(_)))));
}

/// Test that an unknown kinematics name is rejected.
#[test]
fn test_unknown_kinematics() {
    let toml_str = format!("{AXES}\n[machine]\nkinematics = \"delta\"\n");
    let result = parse_config(&toml_str);
    assert!(matches!(result, Err(Error::Config(ConfigError::ParseError(_)))));
}

/// Test loading from a file on disk.
#[test]
fn test_load_config_from_file() {
    let path = std::env::temp_dir().join("cnc_motion_load_config_test.toml");
    std::fs::write(&path, AXES).expect("Failed to write config");

    let config = load_config(&path).expect("Failed to load config");
    assert_eq!(config.axes.z.max_rate.0, 500.0);

    std::fs::remove_file(&path).ok();
}
