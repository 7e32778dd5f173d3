//! Per-side motor calibration
//!
//! Compensates for mismatched motors on the two sides of the drivetrain and
//! caps the duty cycle that may ever reach the hardware.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::types::ConfigError;

/// Calibration applied by the mixer and enforced by the actuator
///
/// Fixed per actuator instance; configured once at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationProfile {
    /// Multiplier applied to the left wheel command (> 0)
    pub left_mult: f32,
    /// Multiplier applied to the right wheel command (> 0)
    pub right_mult: f32,
    /// Largest duty cycle the actuator will ever drive, in (0, 1]
    pub max_pwm: f32,
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self {
            left_mult: 1.0,
            // The right motor on the reference chassis runs fast
            right_mult: 0.87,
            max_pwm: 1.0,
        }
    }
}

impl CalibrationProfile {
    /// Create a calibration profile, rejecting out-of-range values
    pub fn new(left_mult: f32, right_mult: f32, max_pwm: f32) -> Result<Self, ConfigError> {
        Self {
            left_mult,
            right_mult,
            max_pwm,
        }
        .validated()
    }

    /// Calibration with unit multipliers and no duty cap
    pub const fn identity() -> Self {
        Self {
            left_mult: 1.0,
            right_mult: 1.0,
            max_pwm: 1.0,
        }
    }

    /// Check all fields, returning the profile unchanged if valid
    pub fn validated(self) -> Result<Self, ConfigError> {
        let mult_ok = |m: f32| m.is_finite() && m > 0.0;
        if !mult_ok(self.left_mult) || !mult_ok(self.right_mult) {
            return Err(ConfigError::InvalidCalibration);
        }
        if !(self.max_pwm > 0.0 && self.max_pwm <= 1.0) {
            return Err(ConfigError::InvalidCalibration);
        }
        Ok(self)
    }
}
