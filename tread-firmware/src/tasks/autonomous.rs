//! Autonomous obstacle-avoidance task

use defmt::*;
use embassy_rp::i2c::{Async, I2c};
use embassy_rp::peripherals::I2C0;
use embassy_time::Instant;
use rand::rngs::SmallRng;

use tread_core::avoid::{AvoidObserver, AvoidStatus, AvoidanceController};
use tread_core::config::AvoidConfig;
use tread_core::DriveCommand;
use tread_drivers::Vl53l0x;

use crate::channels::{AUTONOMOUS_IDLE, AUTONOMOUS_START, AVOID_STOP};
use crate::{Actuator, Supervisor};

pub type RangeFinder = Vl53l0x<I2c<'static, I2C0, Async>>;

/// Keeps the deadman fed and logs status while the loop runs
struct Telemetry {
    supervisor: &'static Supervisor,
}

impl AvoidObserver for Telemetry {
    fn heartbeat(&mut self, cmd: DriveCommand) {
        self.supervisor.record(cmd, Instant::now());
    }

    fn status(&mut self, status: AvoidStatus) {
        debug!("{} {}", status.state.as_str(), status.distance_mm);
    }
}

#[embassy_executor::task]
pub async fn autonomous_task(
    actuator: &'static Actuator,
    supervisor: &'static Supervisor,
    mut sensor: RangeFinder,
    rng: SmallRng,
    config: AvoidConfig,
) {
    if let Err(e) = sensor.init().await {
        // Reads retry the initialization
        warn!("Range sensor not ready: {}", e);
    }

    let controller = match AvoidanceController::new(actuator, sensor, rng, config) {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid avoidance config: {}", e);
            // Never drives, but still answers handovers
            loop {
                AUTONOMOUS_START.wait().await;
                AUTONOMOUS_IDLE.signal(());
            }
        }
    };
    let mut controller = controller.with_observer(Telemetry { supervisor });

    loop {
        AUTONOMOUS_START.wait().await;
        info!("Autonomous run starting");

        // Count the handover as a command so the deadman stays quiet
        supervisor.record(DriveCommand::STOP, Instant::now());

        if let Err(e) = controller.run(&AVOID_STOP).await {
            error!("Autonomous run aborted: {}", e);
        }
        AUTONOMOUS_IDLE.signal(());
    }
}
