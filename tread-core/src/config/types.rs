//! Configuration type definitions
//!
//! Defaults match the reference chassis (TB6612FNG driver, VL53L0X sensor).
//! Every type offers `validated()`, and every constructor that takes a
//! configuration calls it, so bad values fail at startup rather than in the
//! middle of a maneuver.

use embassy_time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::calibration::CalibrationProfile;

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Speed or steering magnitude outside [0, 1]
    InvalidSpeed,
    /// Distance thresholds not positive or `near >= clear`
    InvalidThresholds,
    /// Maneuver duration not positive, above [`MAX_MANEUVER_S`], or turn
    /// range inverted
    InvalidDuration,
    /// Control loop rate below [`MIN_LOOP_HZ`] or not finite
    InvalidLoopRate,
    /// Calibration multiplier or duty cap out of range
    InvalidCalibration,
    /// Deadman threshold or watchdog period not positive, or threshold above
    /// [`MAX_MANEUVER_S`]
    InvalidDeadman,
    /// Sensor address or timeout invalid
    InvalidSensor,
}

/// Longest accepted maneuver or deadman duration (seconds)
pub const MAX_MANEUVER_S: f32 = 60.0;

/// Slowest accepted control loop rate (Hz)
pub const MIN_LOOP_HZ: f32 = 1.0;

/// Convert seconds to a duration, rounding to whole microseconds
pub(crate) fn secs_to_duration(seconds: f32) -> Duration {
    Duration::from_micros((seconds * 1_000_000.0 + 0.5) as u64)
}

fn is_unit(value: f32) -> bool {
    (0.0..=1.0).contains(&value)
}

fn is_positive_secs(value: f32) -> bool {
    value > 0.0 && value <= MAX_MANEUVER_S
}

/// Obstacle-avoidance tuning
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AvoidConfig {
    /// Forward throttle while the path is clear (0..1)
    pub fwd_speed: f32,
    /// Reverse throttle magnitude while backing away (0..1)
    pub back_speed: f32,
    /// Steering magnitude while turning in place (0..1)
    pub turn_steer: f32,
    /// Distance at or beyond which the path counts as clear (mm)
    pub clear_mm: u16,
    /// Distance at or below which an obstacle is detected (mm)
    pub near_mm: u16,
    /// Time spent backing away (seconds)
    pub back_s: f32,
    /// Shortest turn (seconds)
    pub turn_s_min: f32,
    /// Longest turn (seconds)
    pub turn_s_max: f32,
    /// Control loop rate (Hz)
    pub loop_hz: f32,
}

impl Default for AvoidConfig {
    fn default() -> Self {
        Self {
            fwd_speed: 0.22,
            back_speed: 0.18,
            turn_steer: 0.55,
            clear_mm: 350,
            near_mm: 220,
            back_s: 0.40,
            turn_s_min: 0.35,
            turn_s_max: 0.70,
            loop_hz: 15.0,
        }
    }
}

impl AvoidConfig {
    /// Check all fields, returning the configuration unchanged if valid
    pub fn validated(self) -> Result<Self, ConfigError> {
        if !is_unit(self.fwd_speed) || !is_unit(self.back_speed) || !is_unit(self.turn_steer) {
            return Err(ConfigError::InvalidSpeed);
        }
        if self.near_mm == 0 || self.near_mm >= self.clear_mm {
            return Err(ConfigError::InvalidThresholds);
        }
        if !is_positive_secs(self.back_s)
            || !is_positive_secs(self.turn_s_min)
            || !is_positive_secs(self.turn_s_max)
            || self.turn_s_min > self.turn_s_max
        {
            return Err(ConfigError::InvalidDuration);
        }
        if !(self.loop_hz.is_finite() && self.loop_hz >= MIN_LOOP_HZ) {
            return Err(ConfigError::InvalidLoopRate);
        }
        Ok(self)
    }

    /// Time between sensor reads
    pub fn loop_period(&self) -> Duration {
        secs_to_duration(1.0 / self.loop_hz)
    }

    /// Time spent backing away from an obstacle
    pub fn back_duration(&self) -> Duration {
        secs_to_duration(self.back_s)
    }

    /// Shortest and longest turn, in that order
    pub fn turn_bounds(&self) -> (Duration, Duration) {
        (
            secs_to_duration(self.turn_s_min),
            secs_to_duration(self.turn_s_max),
        )
    }
}

/// Deadman supervisor tuning
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeadmanConfig {
    /// Maximum command age before the drivetrain is stopped (seconds)
    pub threshold_s: f32,
    /// Watchdog check period (ms)
    pub period_ms: u32,
}

impl Default for DeadmanConfig {
    fn default() -> Self {
        Self {
            threshold_s: 0.35,
            period_ms: 50,
        }
    }
}

impl DeadmanConfig {
    /// Check all fields, returning the configuration unchanged if valid
    pub fn validated(self) -> Result<Self, ConfigError> {
        if !is_positive_secs(self.threshold_s) || self.period_ms == 0 {
            return Err(ConfigError::InvalidDeadman);
        }
        Ok(self)
    }

    /// Maximum command age
    pub fn threshold(&self) -> Duration {
        secs_to_duration(self.threshold_s)
    }

    /// Watchdog check period
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms as u64)
    }
}

/// Motor driver configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MotorConfig {
    /// Per-side calibration and duty cap
    pub calibration: CalibrationProfile,
    /// PWM carrier frequency (Hz)
    pub pwm_freq_hz: u32,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            calibration: CalibrationProfile::default(),
            pwm_freq_hz: 1000,
        }
    }
}

impl MotorConfig {
    /// Check all fields, returning the configuration unchanged if valid
    pub fn validated(self) -> Result<Self, ConfigError> {
        self.calibration.validated()?;
        if self.pwm_freq_hz == 0 {
            return Err(ConfigError::InvalidCalibration);
        }
        Ok(self)
    }
}

/// Range sensor configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorConfig {
    /// 7-bit I2C address
    pub address: u8,
    /// Ceiling on a single read, bus access and any pending device
    /// initialization included (ms)
    pub timeout_ms: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            address: 0x29,
            timeout_ms: 100,
        }
    }
}

impl SensorConfig {
    /// Check all fields, returning the configuration unchanged if valid
    pub fn validated(self) -> Result<Self, ConfigError> {
        if self.address > 0x7F || self.timeout_ms == 0 {
            return Err(ConfigError::InvalidSensor);
        }
        Ok(self)
    }

    /// Ceiling on a single read
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms as u64)
    }
}

/// Complete rover configuration
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoverConfig {
    pub motor: MotorConfig,
    pub avoid: AvoidConfig,
    pub deadman: DeadmanConfig,
    pub sensor: SensorConfig,
}

impl RoverConfig {
    /// Validate every section
    pub fn validated(self) -> Result<Self, ConfigError> {
        self.motor.validated()?;
        self.avoid.validated()?;
        self.deadman.validated()?;
        self.sensor.validated()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RoverConfig::default();
        assert_eq!(config.validated(), Ok(config));
    }

    #[test]
    fn test_speed_out_of_range() {
        let config = AvoidConfig {
            fwd_speed: 1.5,
            ..Default::default()
        };
        assert_eq!(config.validated(), Err(ConfigError::InvalidSpeed));

        let config = AvoidConfig {
            turn_steer: -0.1,
            ..Default::default()
        };
        assert_eq!(config.validated(), Err(ConfigError::InvalidSpeed));
    }

    #[test]
    fn test_thresholds_must_be_ordered() {
        let config = AvoidConfig {
            near_mm: 350,
            clear_mm: 350,
            ..Default::default()
        };
        assert_eq!(config.validated(), Err(ConfigError::InvalidThresholds));

        let config = AvoidConfig {
            near_mm: 0,
            ..Default::default()
        };
        assert_eq!(config.validated(), Err(ConfigError::InvalidThresholds));
    }

    #[test]
    fn test_turn_range_inverted() {
        let config = AvoidConfig {
            turn_s_min: 0.8,
            turn_s_max: 0.4,
            ..Default::default()
        };
        assert_eq!(config.validated(), Err(ConfigError::InvalidDuration));
    }

    #[test]
    fn test_loop_rate_positive() {
        let config = AvoidConfig {
            loop_hz: 0.0,
            ..Default::default()
        };
        assert_eq!(config.validated(), Err(ConfigError::InvalidLoopRate));

        let config = AvoidConfig {
            loop_hz: f32::INFINITY,
            ..Default::default()
        };
        assert_eq!(config.validated(), Err(ConfigError::InvalidLoopRate));

        let config = AvoidConfig {
            loop_hz: 0.5,
            ..Default::default()
        };
        assert_eq!(config.validated(), Err(ConfigError::InvalidLoopRate));

        let config = AvoidConfig {
            loop_hz: MIN_LOOP_HZ,
            ..Default::default()
        };
        assert_eq!(config.loop_period(), Duration::from_secs(1));
        assert!(config.validated().is_ok());
    }

    #[test]
    fn test_durations_bounded() {
        let config = AvoidConfig {
            back_s: 1e14,
            ..Default::default()
        };
        assert_eq!(config.validated(), Err(ConfigError::InvalidDuration));

        let config = AvoidConfig {
            turn_s_max: MAX_MANEUVER_S + 1.0,
            ..Default::default()
        };
        assert_eq!(config.validated(), Err(ConfigError::InvalidDuration));

        let config = AvoidConfig {
            back_s: f32::NAN,
            ..Default::default()
        };
        assert_eq!(config.validated(), Err(ConfigError::InvalidDuration));

        let config = AvoidConfig {
            back_s: MAX_MANEUVER_S,
            turn_s_max: MAX_MANEUVER_S,
            ..Default::default()
        };
        assert!(config.validated().is_ok());

        let config = DeadmanConfig {
            threshold_s: 1e14,
            ..Default::default()
        };
        assert_eq!(config.validated(), Err(ConfigError::InvalidDeadman));
    }

    #[test]
    fn test_durations() {
        let config = AvoidConfig::default();
        assert_eq!(config.back_duration(), Duration::from_millis(400));
        assert_eq!(
            config.turn_bounds(),
            (Duration::from_millis(350), Duration::from_millis(700))
        );

        let config = AvoidConfig {
            loop_hz: 20.0,
            ..Default::default()
        };
        assert_eq!(config.loop_period(), Duration::from_millis(50));
    }

    #[test]
    fn test_deadman_validation() {
        assert!(DeadmanConfig::default().validated().is_ok());
        assert_eq!(DeadmanConfig::default().threshold(), Duration::from_millis(350));

        let config = DeadmanConfig {
            period_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.validated(), Err(ConfigError::InvalidDeadman));
    }

    #[test]
    fn test_sensor_validation() {
        let config = SensorConfig {
            address: 0x80,
            ..Default::default()
        };
        assert_eq!(config.validated(), Err(ConfigError::InvalidSensor));
    }
}
