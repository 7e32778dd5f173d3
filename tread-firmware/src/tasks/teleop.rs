//! Teleop command ingestion task
//!
//! Each command from the external source is recorded with the deadman and
//! applied to the drivetrain. The first command takes the drivetrain away
//! from the avoidance loop and is held until the handover completes.

use core::sync::atomic::Ordering;

use defmt::*;
use embassy_time::Instant;

use crate::channels::{Mode, MODE, TELEOP_ACTIVE, TELEOP_CHANNEL, TELEOP_READY};
use crate::{Actuator, Supervisor};

#[embassy_executor::task]
pub async fn teleop_task(supervisor: &'static Supervisor, actuator: &'static Actuator) {
    info!("Teleop task started");

    loop {
        let cmd = TELEOP_CHANNEL.receive().await;
        if !TELEOP_ACTIVE.load(Ordering::Acquire) {
            TELEOP_READY.reset();
            MODE.signal(Mode::Teleop);
            TELEOP_READY.wait().await;
            info!("Teleop has the drivetrain");
        }

        trace!("teleop t={} s={}", cmd.throttle, cmd.steering);
        if let Err(e) = supervisor.submit(actuator, cmd, Instant::now()) {
            error!("Teleop drive failed: {}", e);
        }
    }
}
