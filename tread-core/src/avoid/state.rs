//! Avoidance state machine
//!
//! The controller's behavior is a function of the current state and the
//! latest distance reading. Transitions are pure; the control loop performs
//! the side effects.

use embassy_time::Duration;
use rand::Rng;

use crate::config::AvoidConfig;
use crate::drive::DriveCommand;

/// Avoidance states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AvoidanceState {
    /// Driving ahead while the path is clear
    #[default]
    Forward,
    /// Obstacle within the near threshold; stopping
    ObstacleDetected,
    /// Reversing away from the obstacle
    Backing,
    /// Turning in place in a random direction
    Turning,
}

/// Events that drive the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AvoidEvent {
    /// A reading at or below the near threshold
    ObstacleSeen,
    /// Drivetrain stopped and settled
    Settled,
    /// Backing duration elapsed
    BackedOff,
    /// Turn duration elapsed and drivetrain settled
    TurnFinished,
}

impl AvoidanceState {
    /// Process an event and return the next state
    ///
    /// Pairs not listed keep the current state. In particular an obstacle
    /// seen during recovery does not restart it.
    pub fn transition(self, event: AvoidEvent) -> Self {
        use AvoidEvent::*;
        use AvoidanceState::*;

        match (self, event) {
            (Forward, ObstacleSeen) => ObstacleDetected,
            (ObstacleDetected, Settled) => Backing,
            (Backing, BackedOff) => Turning,
            (Turning, TurnFinished) => Forward,
            (state, _) => state,
        }
    }

    /// Check if a recovery maneuver is in progress
    ///
    /// This is the sticky obstacle flag: set on detection, cleared only
    /// when the whole maneuver has completed.
    pub fn is_recovering(&self) -> bool {
        !matches!(self, AvoidanceState::Forward)
    }

    /// Name used in status reports
    pub fn as_str(&self) -> &'static str {
        match self {
            AvoidanceState::Forward => "forward",
            AvoidanceState::ObstacleDetected => "obstacle_detected",
            AvoidanceState::Backing => "backing",
            AvoidanceState::Turning => "turning",
        }
    }
}

/// Where a reading falls relative to the thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Proximity {
    /// At or beyond `clear_mm`
    Clear,
    /// Strictly between the thresholds
    Between,
    /// At or below `near_mm`
    Near,
}

/// Classify a distance against the configured thresholds
pub fn classify(distance_mm: u16, config: &AvoidConfig) -> Proximity {
    if distance_mm <= config.near_mm {
        Proximity::Near
    } else if distance_mm >= config.clear_mm {
        Proximity::Clear
    } else {
        Proximity::Between
    }
}

/// Direction of an in-place turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TurnDirection {
    /// Negative steering
    Left,
    /// Positive steering
    Right,
}

/// A randomized recovery turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TurnPlan {
    pub direction: TurnDirection,
    pub duration: Duration,
}

impl TurnPlan {
    /// Pick a direction with equal odds and a duration uniform in the
    /// configured turn range
    pub fn choose<R: Rng>(rng: &mut R, config: &AvoidConfig) -> Self {
        let direction = if rng.gen_bool(0.5) {
            TurnDirection::Left
        } else {
            TurnDirection::Right
        };
        let (min, max) = config.turn_bounds();
        let micros = rng.gen_range(min.as_micros()..=max.as_micros());

        Self {
            direction,
            duration: Duration::from_micros(micros),
        }
    }

    /// Spin-in-place command for this turn
    pub fn command(&self, turn_steer: f32) -> DriveCommand {
        match self.direction {
            TurnDirection::Left => DriveCommand::spin(-turn_steer),
            TurnDirection::Right => DriveCommand::spin(turn_steer),
        }
    }
}
