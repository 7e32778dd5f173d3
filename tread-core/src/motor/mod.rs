//! Motor actuation
//!
//! [`MotorActuator`] turns wheel commands into channel writes for one
//! drivetrain. [`SharedActuator`] is the single point through which every
//! task writes to it.

pub mod actuator;
pub mod shared;

pub use actuator::MotorActuator;
pub use shared::SharedActuator;
