//! Drive commands and arcade mixing
//!
//! A [`DriveCommand`] is the intent of a command source (throttle and
//! steering). The mixer turns it into a [`WheelCommand`], one signed value
//! per side, which the motor actuator applies to the hardware.

pub mod mixer;

pub use crate::config::CalibrationProfile;
pub use mixer::{mix, mix_unit};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Clamp to [-1, 1], mapping NaN to zero
pub(crate) fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    }
}

/// Absolute value without relying on `std`
pub(crate) fn abs(value: f32) -> f32 {
    if value < 0.0 {
        -value
    } else {
        value
    }
}

/// Throttle and steering intent
///
/// Both values are clamped to [-1, 1] on construction. Throttle is positive
/// forward, steering is positive to the right.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DriveCommand {
    pub throttle: f32,
    pub steering: f32,
}

impl DriveCommand {
    /// All stop
    pub const STOP: Self = Self {
        throttle: 0.0,
        steering: 0.0,
    };

    /// Create a command, clamping both inputs to [-1, 1]
    pub fn new(throttle: f32, steering: f32) -> Self {
        Self {
            throttle: clamp_unit(throttle),
            steering: clamp_unit(steering),
        }
    }

    /// Straight-line drive at the given throttle
    pub fn straight(throttle: f32) -> Self {
        Self::new(throttle, 0.0)
    }

    /// Turn in place at the given steering
    pub fn spin(steering: f32) -> Self {
        Self::new(0.0, steering)
    }

    /// Check if this command requests no motion
    pub fn is_stop(&self) -> bool {
        self.throttle == 0.0 && self.steering == 0.0
    }
}

/// Signed per-side wheel magnitudes
///
/// The sign encodes direction (positive = forward).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WheelCommand {
    pub left: f32,
    pub right: f32,
}

impl WheelCommand {
    /// Both sides at rest
    pub const STOP: Self = Self {
        left: 0.0,
        right: 0.0,
    };

    pub const fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Largest magnitude of the two sides
    pub fn peak(&self) -> f32 {
        abs(self.left).max(abs(self.right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_command_clamps() {
        let cmd = DriveCommand::new(2.0, -3.5);
        assert_eq!(cmd.throttle, 1.0);
        assert_eq!(cmd.steering, -1.0);
    }

    #[test]
    fn test_drive_command_nan_is_zero() {
        let cmd = DriveCommand::new(f32::NAN, 0.5);
        assert_eq!(cmd.throttle, 0.0);
        assert_eq!(cmd.steering, 0.5);
    }

    #[test]
    fn test_stop() {
        assert!(DriveCommand::STOP.is_stop());
        assert!(!DriveCommand::spin(0.1).is_stop());
        assert_eq!(WheelCommand::STOP.peak(), 0.0);
    }

    #[test]
    fn test_peak() {
        assert_eq!(WheelCommand::new(0.3, -0.8).peak(), 0.8);
    }
}
