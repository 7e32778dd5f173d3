//! Configuration types
//!
//! Board-agnostic configuration structures, validated once at construction
//! and never mutated afterwards.

pub mod calibration;
pub mod parse;
pub mod types;

pub use calibration::CalibrationProfile;
pub use parse::{parse_config, ParseError, ParseErrorKind};
pub use types::*;
