//! Hardware driver implementations
//!
//! This crate provides concrete implementations of the traits defined
//! in tread-core for the rover's hardware:
//!
//! - TB6612FNG dual H-bridge (motor channels and standby line)
//! - VL53L0X time-of-flight range sensor

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod motor;
pub mod sensor;

pub use motor::{StandbyPin, Tb6612Channel};
pub use sensor::Vl53l0x;
