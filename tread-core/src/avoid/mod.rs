//! Obstacle avoidance
//!
//! A reactive controller: drive forward while the path is clear, and on a
//! near reading run one fixed recovery maneuver (stop, back off, turn a
//! random amount, stop) before resuming.

pub mod controller;
pub mod state;

pub use controller::{
    AvoidObserver, AvoidStatus, AvoidanceController, ReportedState, HEARTBEAT_INTERVAL,
    SENSOR_RETRY_BACKOFF, SETTLE_AFTER_TURN, SETTLE_BEFORE_BACKING,
};
pub use state::{classify, AvoidEvent, AvoidanceState, Proximity, TurnDirection, TurnPlan};
