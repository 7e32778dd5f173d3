//! Deadman supervisor
//!
//! Command sources record every drive command they issue. A periodic
//! watchdog compares the age of the last record against the threshold and
//! stops the drivetrain while the record is stale.
//!
//! The record is a `Cell` inside a blocking mutex: each access is one short
//! critical section with no I/O, so `record()` is safe to call from any task
//! at any rate.

use core::cell::Cell;

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Duration, Instant, Ticker};

use crate::config::{CalibrationProfile, ConfigError, DeadmanConfig};
use crate::drive::DriveCommand;
use crate::shutdown::StopToken;
use crate::traits::{ActuatorFault, Drivetrain};

/// Last command seen from any source
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandRecord {
    /// When the last command was recorded; never decreases
    pub last_timestamp: Option<Instant>,
    pub last_throttle: f32,
    pub last_steering: f32,
}

impl CommandRecord {
    /// Last recorded command
    pub fn command(&self) -> DriveCommand {
        DriveCommand::new(self.last_throttle, self.last_steering)
    }
}

/// Status exposed to command sources
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeadmanStatus {
    /// Age of the last command, `None` if no command was ever recorded
    pub last_command_age: Option<Duration>,
    pub deadman_threshold: Duration,
    pub last_throttle: f32,
    pub last_steering: f32,
    pub max_pwm: f32,
    pub left_mult: f32,
    pub right_mult: f32,
}

impl DeadmanStatus {
    pub fn is_expired(&self) -> bool {
        matches!(self.last_command_age, Some(age) if age > self.deadman_threshold)
    }
}

/// Deadman supervisor
pub struct DeadmanSupervisor<M: RawMutex> {
    record: Mutex<M, Cell<CommandRecord>>,
    config: DeadmanConfig,
}

impl<M: RawMutex> DeadmanSupervisor<M> {
    pub fn new(config: DeadmanConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            record: Mutex::new(Cell::new(CommandRecord::default())),
            config: config.validated()?,
        })
    }

    pub fn config(&self) -> &DeadmanConfig {
        &self.config
    }

    /// Overwrite the record with a freshly issued command
    pub fn record(&self, cmd: DriveCommand, now: Instant) {
        self.record.lock(|cell| {
            let prev = cell.get();
            let timestamp = match prev.last_timestamp {
                Some(last) => last.max(now),
                None => now,
            };
            cell.set(CommandRecord {
                last_timestamp: Some(timestamp),
                last_throttle: cmd.throttle,
                last_steering: cmd.steering,
            });
        });
    }

    /// Record an explicit stop request
    pub fn record_stop(&self, now: Instant) {
        self.record(DriveCommand::STOP, now);
    }

    pub fn snapshot(&self) -> CommandRecord {
        self.record.lock(|cell| cell.get())
    }

    /// Age of the last command, `None` if none was ever recorded
    pub fn age(&self, now: Instant) -> Option<Duration> {
        self.snapshot()
            .last_timestamp
            .map(|last| now.saturating_duration_since(last))
    }

    /// Check if a command was recorded and has gone stale
    pub fn is_expired(&self, now: Instant) -> bool {
        matches!(self.age(now), Some(age) if age > self.config.threshold())
    }

    pub fn status(&self, now: Instant, calibration: &CalibrationProfile) -> DeadmanStatus {
        let record = self.snapshot();
        DeadmanStatus {
            last_command_age: record
                .last_timestamp
                .map(|last| now.saturating_duration_since(last)),
            deadman_threshold: self.config.threshold(),
            last_throttle: record.last_throttle,
            last_steering: record.last_steering,
            max_pwm: calibration.max_pwm,
            left_mult: calibration.left_mult,
            right_mult: calibration.right_mult,
        }
    }

    /// Record a command and drive it
    pub fn submit<D: Drivetrain>(
        &self,
        drive: &D,
        cmd: DriveCommand,
        now: Instant,
    ) -> Result<(), ActuatorFault> {
        self.record(cmd, now);
        drive.drive(cmd)
    }

    /// Periodically stop the drivetrain while the record is stale
    ///
    /// Idles until the first command is recorded. Stops on every tick while
    /// expired. Returns on a stop request or an actuator fault, leaving the
    /// drivetrain stopped.
    pub async fn watchdog<D, N>(&self, drive: D, stop: &StopToken<N>) -> Result<(), ActuatorFault>
    where
        D: Drivetrain,
        N: RawMutex,
    {
        let mut ticker = Ticker::every(self.config.period());
        let mut tripped = false;
        info!(
            "deadman watchdog started, threshold {} ms",
            self.config.threshold().as_millis()
        );

        let result = loop {
            if let Either::Second(()) = select(ticker.next(), stop.wait()).await {
                break Ok(());
            }

            if self.is_expired(Instant::now()) {
                if !tripped {
                    warn!("deadman tripped, stopping drivetrain");
                    tripped = true;
                }
                if let Err(e) = drive.stop() {
                    error!("deadman stop failed: {:?}", e);
                    break Err(e);
                }
            } else if tripped {
                info!("deadman re-armed");
                tripped = false;
            }
        };

        let stopped = drive.stop();
        result.and(stopped)
    }
}
