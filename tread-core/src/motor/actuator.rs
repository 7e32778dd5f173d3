//! Two-channel motor actuator
//!
//! Applies signed wheel commands to a left and right [`MotorChannel`] that
//! share one [`EnableLine`]. Each value is clamped to the calibrated duty cap
//! and direction changes are break-before-make: the magnitude is driven to
//! zero before the direction signals move.

use crate::config::{CalibrationProfile, ConfigError};
use crate::drive::{abs, mix, DriveCommand, WheelCommand};
use crate::traits::{ActuatorFault, Direction, EnableLine, MotorChannel};

/// Clamp a signed value to [-max, max], mapping NaN to zero
fn clamp_signed(value: f32, max: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-max, max)
    }
}

/// Drive one side: zero, switch direction, then set the new magnitude
fn apply_side<C: MotorChannel>(
    channel: &mut C,
    current: &mut Option<Direction>,
    value: f32,
) -> Result<(), ActuatorFault> {
    let dir = Direction::from_signed(value);

    if *current != Some(dir) {
        channel.set_magnitude(0.0)?;
        // Forget the old direction until the new one is confirmed written
        *current = None;
        channel.set_direction(dir)?;
        *current = Some(dir);
    }

    channel.set_magnitude(abs(value))
}

/// Motor actuator for a differential drivetrain
pub struct MotorActuator<L, R, S> {
    left: L,
    right: R,
    standby: S,
    calibration: CalibrationProfile,
    left_dir: Option<Direction>,
    right_dir: Option<Direction>,
    enabled: bool,
    last_applied: WheelCommand,
}

impl<L, R, S> MotorActuator<L, R, S>
where
    L: MotorChannel,
    R: MotorChannel,
    S: EnableLine,
{
    /// Create an actuator
    ///
    /// The hardware is untouched until [`init`](Self::init) is called.
    pub fn new(
        left: L,
        right: R,
        standby: S,
        calibration: CalibrationProfile,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            left,
            right,
            standby,
            calibration: calibration.validated()?,
            left_dir: None,
            right_dir: None,
            enabled: false,
            last_applied: WheelCommand::STOP,
        })
    }

    /// Bring the drivetrain to its power-on state: enabled and stopped
    pub fn init(&mut self) -> Result<(), ActuatorFault> {
        self.enable()?;
        self.stop()
    }

    /// Mix a drive command and apply it
    pub fn drive(&mut self, cmd: DriveCommand) -> Result<(), ActuatorFault> {
        let wheels = mix(cmd, &self.calibration);
        self.apply(wheels)
    }

    /// Apply a wheel command
    ///
    /// Values are clamped to `[-max_pwm, max_pwm]`. Zero coasts the side.
    pub fn apply(&mut self, cmd: WheelCommand) -> Result<(), ActuatorFault> {
        let max = self.calibration.max_pwm;
        let left = clamp_signed(cmd.left, max);
        let right = clamp_signed(cmd.right, max);

        let result = apply_side(&mut self.left, &mut self.left_dir, left)
            .and_then(|_| apply_side(&mut self.right, &mut self.right_dir, right));

        match result {
            Ok(()) => {
                self.last_applied = WheelCommand { left, right };
                Ok(())
            }
            Err(e) => {
                error!("actuator write failed: {:?}", e);
                Err(e)
            }
        }
    }

    /// Zero both sides and deassert all direction signals
    pub fn stop(&mut self) -> Result<(), ActuatorFault> {
        self.apply(WheelCommand::STOP)
    }

    /// Release the standby line
    pub fn enable(&mut self) -> Result<(), ActuatorFault> {
        self.standby.set_enabled(true)?;
        self.enabled = true;
        debug!("drivetrain enabled");
        Ok(())
    }

    /// Assert standby, cutting power to both channels
    pub fn disable(&mut self) -> Result<(), ActuatorFault> {
        self.standby.set_enabled(false)?;
        self.enabled = false;
        debug!("drivetrain disabled");
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Last wheel command successfully applied, after clamping
    pub fn last_applied(&self) -> WheelCommand {
        self.last_applied
    }

    pub fn calibration(&self) -> &CalibrationProfile {
        &self.calibration
    }
}
