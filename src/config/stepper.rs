//! Step generation configuration.

use serde::Deserialize;

/// Highest step smoothing level. Each level halves the interrupt period
/// relative to the step period.
pub const MAX_SMOOTHING_LEVEL: u8 = 3;

/// Segment sizing, timer and pulse settings for the step generator.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct StepperConfig {
    /// Step timer input clock in Hz. Timer reload values are in these
    /// cycles.
    pub timer_frequency_hz: u32,

    /// Segments generated per second of motion. 100 gives 10 ms segments.
    pub acceleration_ticks_per_second: u16,

    /// Step pulse width in microseconds.
    pub pulse_microseconds: u8,

    /// Keep the drivers energized while idle.
    pub idle_lock: bool,

    /// Time the drivers stay energized after motion stops, so the axes
    /// settle before they are released.
    pub idle_lock_delay_ms: u16,

    /// Adaptive multi-axis step smoothing.
    pub step_smoothing: bool,

    /// Step rate below which smoothing level 1 engages. Levels 2 and 3
    /// engage at half and a quarter of it.
    pub smoothing_cutoff_hz: u32,

    /// Largest reload value the step timer accepts.
    pub max_timer_period: u32,
}

impl StepperConfig {
    /// Duration of one segment in minutes.
    #[inline]
    pub fn segment_duration_min(&self) -> f32 {
        1.0 / (self.acceleration_ticks_per_second as f32 * 60.0)
    }

    /// Timer cycles per minute, the factor converting min/step into cycles.
    #[inline]
    pub fn cycles_per_min(&self) -> f32 {
        self.timer_frequency_hz as f32 * 60.0
    }

    /// Cycle threshold at or above which smoothing `level` (1-3) engages.
    #[inline]
    pub fn smoothing_threshold(&self, level: u8) -> u32 {
        let base = self.timer_frequency_hz / self.smoothing_cutoff_hz.max(1);
        base << level.saturating_sub(1)
    }

    /// Shift applied to block step counts before slicing.
    #[inline]
    pub fn block_shift(&self) -> u8 {
        if self.step_smoothing {
            MAX_SMOOTHING_LEVEL
        } else {
            0
        }
    }
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            timer_frequency_hz: 16_000_000,
            acceleration_ticks_per_second: 100,
            pulse_microseconds: 10,
            idle_lock: false,
            idle_lock_delay_ms: 25,
            step_smoothing: true,
            smoothing_cutoff_hz: 8_000,
            max_timer_period: 0xFFFF,
        }
    }
}
