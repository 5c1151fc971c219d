//! Look-ahead planner configuration.

use serde::Deserialize;

use super::units::{Millimeters, MmPerMin};

/// Junction and rate floor settings for the look-ahead planner.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Tolerated deviation from the programmed corner. Larger values allow
    /// faster cornering.
    #[serde(rename = "junction_deviation_mm")]
    pub junction_deviation: Millimeters,

    /// Speed floor applied at every junction.
    #[serde(rename = "minimum_junction_speed_mm_per_min")]
    pub minimum_junction_speed: MmPerMin,

    /// Feed rate floor. Prevents step generation round-off at crawl speeds.
    #[serde(rename = "minimum_feed_rate_mm_per_min")]
    pub minimum_feed_rate: MmPerMin,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            junction_deviation: Millimeters(0.01),
            minimum_junction_speed: MmPerMin(0.0),
            minimum_feed_rate: MmPerMin(1.0),
        }
    }
}
