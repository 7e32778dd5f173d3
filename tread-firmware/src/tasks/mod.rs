//! Embassy async tasks
//!
//! Each task runs independently and communicates via channels/signals.

pub mod autonomous;
pub mod deadman;
pub mod mode;
pub mod teleop;

pub use autonomous::autonomous_task;
pub use deadman::deadman_task;
pub use mode::mode_task;
pub use teleop::teleop_task;
