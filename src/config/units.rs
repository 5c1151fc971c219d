//! Unit types for physical quantities.
//!
//! Provides type-safe representations of lengths, feed rates and
//! accelerations so configuration values cannot be mixed up at compile time.
//! The planner works internally in mm and mm/min (squared speeds in
//! (mm/min)²); accelerations are configured in mm/s² and converted once.

use core::ops::{Add, Mul, Neg, Sub};

use serde::Deserialize;

/// Seconds per minute, squared. Converts mm/s² to mm/min².
const SEC_PER_MIN_SQR: f32 = 60.0 * 60.0;

/// Linear distance in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct Millimeters(pub f32);

impl Millimeters {
    /// Create a new Millimeters value.
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f32 {
        self.0
    }
}

impl Add for Millimeters {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Millimeters {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Millimeters {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

/// Feed rate in millimeters per minute.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct MmPerMin(pub f32);

impl MmPerMin {
    /// Create a new MmPerMin value.
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f32 {
        self.0
    }

    /// Speed squared, the form the planner stores.
    #[inline]
    pub fn squared(self) -> f32 {
        self.0 * self.0
    }
}

impl Mul<f32> for MmPerMin {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self(self.0 * rhs)
    }
}

/// Acceleration in millimeters per second squared.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct MmPerSecSquared(pub f32);

impl MmPerSecSquared {
    /// Create a new MmPerSecSquared value.
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f32 {
        self.0
    }

    /// Convert to mm/min², the planner's acceleration unit.
    #[inline]
    pub fn per_min_squared(self) -> f32 {
        self.0 * SEC_PER_MIN_SQR
    }
}

impl Mul<f32> for MmPerSecSquared {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self(self.0 * rhs)
    }
}

/// Extension trait for creating unit types from primitives.
pub trait UnitExt {
    /// Convert to Millimeters.
    fn mm(self) -> Millimeters;
    /// Convert to MmPerMin.
    fn mm_per_min(self) -> MmPerMin;
    /// Convert to MmPerSecSquared.
    fn mm_per_sec2(self) -> MmPerSecSquared;
}

impl UnitExt for f32 {
    #[inline]
    fn mm(self) -> Millimeters {
        Millimeters(self)
    }

    #[inline]
    fn mm_per_min(self) -> MmPerMin {
        MmPerMin(self)
    }

    #[inline]
    fn mm_per_sec2(self) -> MmPerSecSquared {
        MmPerSecSquared(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acceleration_conversion() {
        let a = MmPerSecSquared::new(10.0);
        assert!((a.per_min_squared() - 36_000.0).abs() < 0.01);
    }

    #[test]
    fn test_speed_squared() {
        assert_eq!(500.0.mm_per_min().squared(), 250_000.0);
    }

    #[test]
    fn test_millimeter_arithmetic() {
        let d = 10.0.mm() - 2.5.mm();
        assert_eq!(d.value(), 7.5);
        assert_eq!((-d).value(), -7.5);
    }
}
