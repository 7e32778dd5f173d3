//! Motor driver implementations

pub mod tb6612;

pub use tb6612::{StandbyPin, Tb6612Channel};
