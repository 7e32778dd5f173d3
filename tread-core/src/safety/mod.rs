//! Safety supervision
//!
//! Expires stale externally issued drive commands.

pub mod deadman;

pub use deadman::{CommandRecord, DeadmanStatus, DeadmanSupervisor};
