//! Motor channel traits
//!
//! A differential drivetrain has one [`MotorChannel`] per side, each a
//! magnitude output plus a direction pair, and one shared [`EnableLine`]
//! (the standby pin on TB6612-style bridges).

use crate::drive::DriveCommand;

/// Rotation direction of one side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Forward,
    Reverse,
    /// Both direction signals deasserted
    Coast,
}

impl Direction {
    /// Direction implied by a signed wheel command
    pub fn from_signed(value: f32) -> Self {
        if value > 0.0 {
            Direction::Forward
        } else if value < 0.0 {
            Direction::Reverse
        } else {
            Direction::Coast
        }
    }
}

/// Errors from hardware writes
///
/// These are never retried. The loop that observes one stops the
/// drivetrain (best effort) and terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActuatorFault {
    /// Duty cycle write failed
    Pwm,
    /// Direction signal write failed
    DirectionPin,
    /// Standby line write failed
    StandbyPin,
}

/// One side of the drivetrain
pub trait MotorChannel {
    /// Set the duty cycle magnitude in [0, 1]
    fn set_magnitude(&mut self, duty: f32) -> Result<(), ActuatorFault>;

    /// Set the direction signals
    ///
    /// `Coast` deasserts both. Callers zero the magnitude first.
    fn set_direction(&mut self, dir: Direction) -> Result<(), ActuatorFault>;
}

/// Shared enable line for both channels
pub trait EnableLine {
    fn set_enabled(&mut self, on: bool) -> Result<(), ActuatorFault>;
}

/// Something the avoidance loop and the deadman watchdog can drive
///
/// Takes `&self` because several tasks hold a reference to the same
/// drivetrain. Implementations serialize writes internally.
pub trait Drivetrain {
    /// Mix and apply a drive command
    fn drive(&self, cmd: DriveCommand) -> Result<(), ActuatorFault>;

    /// Bring both sides to zero
    fn stop(&self) -> Result<(), ActuatorFault>;
}

impl<T: Drivetrain + ?Sized> Drivetrain for &T {
    fn drive(&self, cmd: DriveCommand) -> Result<(), ActuatorFault> {
        (**self).drive(cmd)
    }

    fn stop(&self) -> Result<(), ActuatorFault> {
        (**self).stop()
    }
}
