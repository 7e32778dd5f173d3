//! Arcade drive mixer
//!
//! Derives two independent wheel commands from one throttle/steering pair.
//! The sum and difference are scaled down together when either side would
//! exceed unit magnitude, so the throttle/steering ratio is preserved.

use super::{abs, clamp_unit, CalibrationProfile, DriveCommand, WheelCommand};

/// Mix throttle and steering into unit-range wheel commands
///
/// This is the pre-calibration stage: the result always satisfies
/// `max(|left|, |right|) <= 1`.
pub fn mix_unit(cmd: DriveCommand) -> WheelCommand {
    let throttle = clamp_unit(cmd.throttle);
    let steering = clamp_unit(cmd.steering);

    let left = throttle + steering;
    let right = throttle - steering;

    // Never amplifies, only attenuates
    let mag = abs(left).max(abs(right)).max(1.0);

    WheelCommand {
        left: left / mag,
        right: right / mag,
    }
}

/// Mix throttle and steering, then apply the per-side multipliers
///
/// The duty cap in the profile is enforced by the actuator, not here.
pub fn mix(cmd: DriveCommand, calibration: &CalibrationProfile) -> WheelCommand {
    let unit = mix_unit(cmd);
    WheelCommand {
        left: unit.left * calibration.left_mult,
        right: unit.right * calibration.right_mult,
    }
}
