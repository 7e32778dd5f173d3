//! Shared motor actuator
//!
//! Every task that writes to the drivetrain goes through one
//! [`SharedActuator`]. Each write runs inside a single critical section, so
//! magnitude and direction writes from different tasks never interleave and
//! a `disable()` waits for at most one in-progress `apply()`.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

use super::MotorActuator;
use crate::config::CalibrationProfile;
use crate::drive::{DriveCommand, WheelCommand};
use crate::traits::{ActuatorFault, Drivetrain, EnableLine, MotorChannel};

/// Actuator behind a blocking mutex
pub struct SharedActuator<M: RawMutex, A> {
    inner: Mutex<M, RefCell<A>>,
}

impl<M: RawMutex, A> SharedActuator<M, A> {
    pub const fn new(actuator: A) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(actuator)),
        }
    }

    /// Run a closure with exclusive access to the actuator
    pub fn with<R>(&self, f: impl FnOnce(&mut A) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }
}

impl<M, L, R, S> SharedActuator<M, MotorActuator<L, R, S>>
where
    M: RawMutex,
    L: MotorChannel,
    R: MotorChannel,
    S: EnableLine,
{
    pub fn init(&self) -> Result<(), ActuatorFault> {
        self.with(|a| a.init())
    }

    pub fn drive(&self, cmd: DriveCommand) -> Result<(), ActuatorFault> {
        self.with(|a| a.drive(cmd))
    }

    pub fn apply(&self, cmd: WheelCommand) -> Result<(), ActuatorFault> {
        self.with(|a| a.apply(cmd))
    }

    pub fn stop(&self) -> Result<(), ActuatorFault> {
        self.with(|a| a.stop())
    }

    pub fn enable(&self) -> Result<(), ActuatorFault> {
        self.with(|a| a.enable())
    }

    pub fn disable(&self) -> Result<(), ActuatorFault> {
        self.with(|a| a.disable())
    }

    pub fn last_applied(&self) -> WheelCommand {
        self.with(|a| a.last_applied())
    }

    pub fn calibration(&self) -> CalibrationProfile {
        self.with(|a| *a.calibration())
    }
}

impl<M, L, R, S> Drivetrain for SharedActuator<M, MotorActuator<L, R, S>>
where
    M: RawMutex,
    L: MotorChannel,
    R: MotorChannel,
    S: EnableLine,
{
    fn drive(&self, cmd: DriveCommand) -> Result<(), ActuatorFault> {
        SharedActuator::drive(self, cmd)
    }

    fn stop(&self) -> Result<(), ActuatorFault> {
        SharedActuator::stop(self)
    }
}
