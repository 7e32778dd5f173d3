//! Deadman watchdog task

use defmt::*;

use crate::channels::WATCHDOG_STOP;
use crate::{Actuator, Supervisor};

/// Stops the drivetrain whenever the last recorded command goes stale
#[embassy_executor::task]
pub async fn deadman_task(supervisor: &'static Supervisor, actuator: &'static Actuator) {
    match supervisor.watchdog(actuator, &WATCHDOG_STOP).await {
        Ok(()) => info!("Deadman watchdog stopped"),
        Err(e) => {
            error!("Deadman watchdog lost the drivetrain: {}", e);
            // Cut power as a last resort
            if actuator.disable().is_err() {
                error!("Standby line write failed");
            }
        }
    }
}
