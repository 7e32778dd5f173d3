//! Mode arbitration task
//!
//! Hands the drivetrain to one command source at a time. Leaving autonomous
//! mode stops the avoidance loop and waits for the run to return, so the
//! loop's final stop lands before any teleop command.

use core::sync::atomic::Ordering;

use defmt::*;

use crate::channels::{
    Mode, AUTONOMOUS_IDLE, AUTONOMOUS_START, AVOID_STOP, MODE, TELEOP_ACTIVE, TELEOP_READY,
};

#[embassy_executor::task]
pub async fn mode_task(initial: Mode) {
    let mut current = initial;
    info!("Mode task started in {}", current);
    match current {
        Mode::Autonomous => AUTONOMOUS_START.signal(()),
        Mode::Teleop => TELEOP_ACTIVE.store(true, Ordering::Release),
    }

    loop {
        let requested = MODE.wait().await;
        if requested != current {
            info!("Mode {} -> {}", current, requested);
            match requested {
                Mode::Autonomous => {
                    TELEOP_ACTIVE.store(false, Ordering::Release);
                    AVOID_STOP.reset();
                    AUTONOMOUS_IDLE.reset();
                    AUTONOMOUS_START.signal(());
                }
                Mode::Teleop => {
                    AVOID_STOP.request_stop();
                    AUTONOMOUS_IDLE.wait().await;
                }
            }
            current = requested;
        }

        if current == Mode::Teleop {
            TELEOP_ACTIVE.store(true, Ordering::Release);
            TELEOP_READY.signal(());
        }
    }
}
