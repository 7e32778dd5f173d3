//! Hardware abstraction traits
//!
//! These traits define the interface between the drive and safety logic
//! and hardware-specific implementations.

pub mod motor;
pub mod sensor;

pub use motor::{ActuatorFault, Direction, Drivetrain, EnableLine, MotorChannel};
pub use sensor::{RangeSensor, SensorError, SensorSample, NO_TARGET_MM};
