//! Inter-task communication channels
//!
//! Defines the static channels used for communication between Embassy tasks.
//! Uses embassy-sync primitives for safe async communication.

use core::sync::atomic::AtomicBool;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use tread_core::{DriveCommand, StopToken};

/// Channel capacity for externally issued drive commands
const TELEOP_CHANNEL_SIZE: usize = 4;

/// Which command source owns the drivetrain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Obstacle-avoidance loop drives
    Autonomous,
    /// External commands drive, guarded by the deadman
    Teleop,
}

/// Requested mode (consumed by the mode task)
pub static MODE: Signal<CriticalSectionRawMutex, Mode> = Signal::new();

/// Start the avoidance loop (raised by the mode task)
pub static AUTONOMOUS_START: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Raised by the autonomous task once a run has returned and the
/// drivetrain is stopped
pub static AUTONOMOUS_IDLE: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Set while teleop owns the drivetrain
pub static TELEOP_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Raised by the mode task when a handover to teleop has completed
pub static TELEOP_READY: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Ends the current avoidance run
pub static AVOID_STOP: StopToken<CriticalSectionRawMutex> = StopToken::new();

/// Ends the deadman watchdog; only requested on shutdown
pub static WATCHDOG_STOP: StopToken<CriticalSectionRawMutex> = StopToken::new();

/// Drive commands from an external command source
pub static TELEOP_CHANNEL: Channel<CriticalSectionRawMutex, DriveCommand, TELEOP_CHANNEL_SIZE> =
    Channel::new();
