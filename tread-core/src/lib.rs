//! Board-agnostic core logic for the Tread rover
//!
//! This crate contains all drive and safety logic that does not depend on
//! specific hardware implementations:
//!
//! - Arcade drive mixing with per-side calibration
//! - Motor actuator with clamping and break-before-make direction switching
//! - Hardware abstraction traits (motor channels, standby line, range sensor)
//! - Obstacle-avoidance state machine and its control loop
//! - Deadman supervisor for externally commanded driving
//! - Configuration types and the configuration file parser

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod avoid;
pub mod config;
pub mod drive;
pub mod motor;
pub mod safety;
pub mod shutdown;
pub mod traits;

pub use drive::{mix, CalibrationProfile, DriveCommand, WheelCommand};
pub use shutdown::{StopToken, Wait};
