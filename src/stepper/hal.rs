//! Hardware seam of the step executor.
//!
//! The executor drives step and direction outputs and two timers through
//! [`StepperHal`]. [`PinPort`] implements it over embedded-hal pins and a
//! board-specific [`StepTimer`]; [`SimHal`] records everything for dry runs.

use embedded_hal::digital::{InputPin, OutputPin};

use crate::axes::AxisMask;
use crate::N_AXIS;

/// Outputs and timers the step interrupt needs.
///
/// Every method may be called from interrupt context and must not block.
pub trait StepperHal {
    /// Write direction levels, then step levels. Called once per step tick.
    fn output(&mut self, direction: AxisMask, steps: AxisMask);

    /// Return the step outputs to their idle levels.
    fn end_pulse(&mut self, idle: AxisMask);

    /// Arm the one-shot timer that ends the current step pulse.
    fn arm_pulse_reset(&mut self, micros: u8);

    /// Reload the step timer period in timer cycles.
    fn set_period(&mut self, cycles: u32);

    /// Start the periodic step timer.
    fn start_timer(&mut self);

    /// Stop the periodic step timer.
    fn stop_timer(&mut self);

    /// Energize or release the stepper drivers.
    fn set_drivers_enabled(&mut self, enabled: bool);

    /// Raw probe input level.
    fn probe_triggered(&mut self) -> bool {
        false
    }
}

/// Board-specific step and pulse-reset timers.
pub trait StepTimer {
    /// Arm the pulse-reset one-shot.
    fn arm_pulse_reset(&mut self, micros: u8);
    /// Reload the step timer period.
    fn set_period(&mut self, cycles: u32);
    /// Start the step timer.
    fn start(&mut self);
    /// Stop the step timer.
    fn stop(&mut self);
}

/// Step, direction, enable and probe pins plus a step timer.
///
/// Pins are only written when their level changes.
pub struct PinPort<STEP, DIR, EN, PROBE, T>
where
    STEP: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
    PROBE: InputPin,
    T: StepTimer,
{
    step_pins: [STEP; N_AXIS],
    dir_pins: [DIR; N_AXIS],
    enable_pin: EN,
    probe_pin: PROBE,
    timer: T,

    /// Drivers are enabled by a low enable pin.
    enable_active_low: bool,

    step_levels: Option<AxisMask>,
    dir_levels: Option<AxisMask>,
    pin_fault: bool,
}

impl<STEP, DIR, EN, PROBE, T> PinPort<STEP, DIR, EN, PROBE, T>
where
    STEP: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
    PROBE: InputPin,
    T: StepTimer,
{
    /// Assemble a port. Most stepper drivers enable on a low pin, so
    /// `enable_active_low` is usually `true`.
    pub fn new(
        step_pins: [STEP; N_AXIS],
        dir_pins: [DIR; N_AXIS],
        enable_pin: EN,
        probe_pin: PROBE,
        timer: T,
        enable_active_low: bool,
    ) -> Self {
        Self {
            step_pins,
            dir_pins,
            enable_pin,
            probe_pin,
            timer,
            enable_active_low,
            step_levels: None,
            dir_levels: None,
            pin_fault: false,
        }
    }

    /// A pin write or read failed since the last check.
    pub fn take_fault(&mut self) -> bool {
        core::mem::take(&mut self.pin_fault)
    }

    /// Access the timer.
    pub fn timer(&mut self) -> &mut T {
        &mut self.timer
    }

    fn write_steps(&mut self, levels: AxisMask) {
        let previous = self.step_levels;
        for (axis, pin) in self.step_pins.iter_mut().enumerate() {
            let high = levels.has_axis(axis);
            if previous.map(|p| p.has_axis(axis)) != Some(high) {
                let result = if high { pin.set_high() } else { pin.set_low() };
                self.pin_fault |= result.is_err();
            }
        }
        self.step_levels = Some(levels);
    }
}

impl<STEP, DIR, EN, PROBE, T> StepperHal for PinPort<STEP, DIR, EN, PROBE, T>
where
    STEP: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
    PROBE: InputPin,
    T: StepTimer,
{
    fn output(&mut self, direction: AxisMask, steps: AxisMask) {
        let previous = self.dir_levels;
        for (axis, pin) in self.dir_pins.iter_mut().enumerate() {
            let high = direction.has_axis(axis);
            if previous.map(|p| p.has_axis(axis)) != Some(high) {
                let result = if high { pin.set_high() } else { pin.set_low() };
                self.pin_fault |= result.is_err();
            }
        }
        self.dir_levels = Some(direction);

        self.write_steps(steps);
    }

    fn end_pulse(&mut self, idle: AxisMask) {
        self.write_steps(idle);
    }

    fn arm_pulse_reset(&mut self, micros: u8) {
        self.timer.arm_pulse_reset(micros);
    }

    fn set_period(&mut self, cycles: u32) {
        self.timer.set_period(cycles);
    }

    fn start_timer(&mut self) {
        self.timer.start();
    }

    fn stop_timer(&mut self) {
        self.timer.stop();
    }

    fn set_drivers_enabled(&mut self, enabled: bool) {
        let result = if enabled != self.enable_active_low {
            self.enable_pin.set_high()
        } else {
            self.enable_pin.set_low()
        };
        self.pin_fault |= result.is_err();
    }

    fn probe_triggered(&mut self) -> bool {
        match self.probe_pin.is_high() {
            Ok(level) => level,
            Err(_) => {
                self.pin_fault = true;
                false
            }
        }
    }
}

/// Simulated outputs for dry runs and tests.
///
/// Counts one timer tick per [`StepperHal::output`] call. Elapsed time is
/// measured between ticks of the same timer run: every tick after the first
/// adds the period in force, so the totals describe what the real timer
/// would have done.
#[derive(Debug, Clone, Default)]
pub struct SimHal {
    /// Step pins are active low.
    pub step_invert: AxisMask,
    /// Direction pins are inverted.
    pub dir_invert: AxisMask,

    /// Pulses emitted per axis.
    pub pulses: [u64; N_AXIS],
    /// Signed pulse count per axis.
    pub position: [i64; N_AXIS],
    /// Step timer ticks.
    pub ticks: u64,
    /// Timer cycles elapsed across all ticks.
    pub elapsed_cycles: u64,
    /// Current step timer period.
    pub period: u32,
    /// Step timer running.
    pub timer_running: bool,
    /// Drivers energized.
    pub drivers_enabled: bool,
    /// Pulse-reset arms.
    pub pulse_resets: u64,
    /// No tick yet since the timer was last started.
    pub fresh_start: bool,

    /// Probe reads as triggered once this many pulses have been emitted.
    pub probe_after_pulses: Option<u64>,
}

impl SimHal {
    /// Simulated outputs with no inverted pins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pulses emitted on every axis together.
    pub fn total_pulses(&self) -> u64 {
        self.pulses.iter().sum()
    }

    /// Elapsed time in minutes at `timer_frequency_hz`.
    pub fn elapsed_minutes(&self, timer_frequency_hz: u32) -> f64 {
        self.elapsed_cycles as f64 / (f64::from(timer_frequency_hz) * 60.0)
    }
}

impl StepperHal for SimHal {
    fn output(&mut self, direction: AxisMask, steps: AxisMask) {
        self.ticks += 1;
        if !core::mem::take(&mut self.fresh_start) {
            self.elapsed_cycles += u64::from(self.period);
        }

        let pulses = steps ^ self.step_invert;
        let negative = direction ^ self.dir_invert;
        for axis in 0..N_AXIS {
            if pulses.has_axis(axis) {
                self.pulses[axis] += 1;
                self.position[axis] += if negative.has_axis(axis) { -1 } else { 1 };
            }
        }
    }

    fn end_pulse(&mut self, _idle: AxisMask) {}

    fn arm_pulse_reset(&mut self, _micros: u8) {
        self.pulse_resets += 1;
    }

    fn set_period(&mut self, cycles: u32) {
        self.period = cycles;
    }

    fn start_timer(&mut self) {
        self.timer_running = true;
        self.fresh_start = true;
    }

    fn stop_timer(&mut self) {
        self.timer_running = false;
    }

    fn set_drivers_enabled(&mut self, enabled: bool) {
        self.drivers_enabled = enabled;
    }

    fn probe_triggered(&mut self) -> bool {
        let pulses = self.total_pulses();
        self.probe_after_pulses.is_some_and(|after| pulses >= after)
    }
}
