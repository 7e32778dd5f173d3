//! Tread - differential-drive rover firmware
//!
//! Main firmware binary for an RP2040 driving a TB6612FNG dual H-bridge,
//! with a VL53L0X time-of-flight sensor looking ahead. Boots into
//! obstacle-avoiding autonomy; teleop commands take over the drivetrain
//! and are guarded by the deadman watchdog.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::i2c::{Config as I2cConfig, I2c, InterruptHandler as I2cInterruptHandler};
use embassy_rp::peripherals::I2C0;
use embassy_rp::pwm::{Config as PwmConfig, Pwm, PwmOutput};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::Instant;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use tread_core::config::{parse_config, RoverConfig};
use tread_core::motor::{MotorActuator, SharedActuator};
use tread_core::safety::DeadmanSupervisor;
use tread_drivers::{StandbyPin, Tb6612Channel, Vl53l0x};

use crate::channels::Mode;

mod channels;
mod tasks;

/// Embedded configuration (compiled into firmware)
/// Edit tread.toml and rebuild to customize
const EMBEDDED_CONFIG: &str = include_str!("../tread.toml");

/// System clock feeding the PWM slices (Hz)
const SYS_CLOCK_HZ: u32 = 125_000_000;

/// PWM counter top; duty resolution is TOP + 1 steps
const PWM_TOP: u16 = 999;

type BridgeChannel = Tb6612Channel<PwmOutput<'static>, Output<'static>, Output<'static>>;
type Standby = StandbyPin<Output<'static>>;

/// The drivetrain, shared by every task that writes to it
pub type Actuator =
    SharedActuator<CriticalSectionRawMutex, MotorActuator<BridgeChannel, BridgeChannel, Standby>>;

pub type Supervisor = DeadmanSupervisor<CriticalSectionRawMutex>;

bind_interrupts!(struct Irqs {
    I2C0_IRQ => I2cInterruptHandler<I2C0>;
});

// Static cells for state shared between tasks (must live forever)
static ACTUATOR: StaticCell<Actuator> = StaticCell::new();
static SUPERVISOR: StaticCell<Supervisor> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Tread firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let config = load_config();

    // TB6612 PWMA/PWMB on one slice: GPIO18 = left, GPIO19 = right
    let mut pwm_config = PwmConfig::default();
    pwm_config.top = PWM_TOP;
    pwm_config.divider = pwm_divider(config.motor.pwm_freq_hz).into();
    let pwm = Pwm::new_output_ab(p.PWM_SLICE1, p.PIN_18, p.PIN_19, pwm_config);
    let (pwm_a, pwm_b) = pwm.split();
    let pwm_a = unwrap!(pwm_a);
    let pwm_b = unwrap!(pwm_b);

    // AIN1/AIN2 = GPIO20/21, BIN1/BIN2 = GPIO10/11, STBY = GPIO12 (low = standby)
    let left = Tb6612Channel::new(
        pwm_a,
        Output::new(p.PIN_20, Level::Low),
        Output::new(p.PIN_21, Level::Low),
    );
    let right = Tb6612Channel::new(
        pwm_b,
        Output::new(p.PIN_10, Level::Low),
        Output::new(p.PIN_11, Level::Low),
    );
    let standby = StandbyPin::new(Output::new(p.PIN_12, Level::Low));

    let motors = unwrap!(MotorActuator::new(
        left,
        right,
        standby,
        config.motor.calibration
    ));
    let actuator: &'static Actuator = ACTUATOR.init(SharedActuator::new(motors));
    if let Err(e) = actuator.init() {
        // Leave the bridge in standby and let the watchdog keep trying to stop
        error!("Drivetrain init failed: {}", e);
    }
    info!("Motors initialized");

    // VL53L0X on I2C0: SDA = GPIO4, SCL = GPIO5
    let mut i2c_config = I2cConfig::default();
    i2c_config.frequency = 400_000;
    let i2c = I2c::new_async(p.I2C0, p.PIN_5, p.PIN_4, Irqs, i2c_config);
    let sensor = unwrap!(Vl53l0x::new(i2c, config.sensor));
    info!("I2C initialized for range sensor");

    let supervisor: &'static Supervisor =
        SUPERVISOR.init(unwrap!(DeadmanSupervisor::new(config.deadman)));

    // Seed from boot time; turns only need to differ run to run
    let rng = SmallRng::seed_from_u64(Instant::now().as_ticks());

    // Spawn tasks
    spawner.spawn(unwrap!(tasks::deadman_task(supervisor, actuator)));
    spawner.spawn(unwrap!(tasks::autonomous_task(
        actuator,
        supervisor,
        sensor,
        rng,
        config.avoid,
    )));
    spawner.spawn(unwrap!(tasks::teleop_task(supervisor, actuator)));
    spawner.spawn(unwrap!(tasks::mode_task(Mode::Autonomous)));

    info!("All tasks spawned, firmware running");
}

/// Parse the embedded configuration, falling back to defaults
fn load_config() -> RoverConfig {
    match parse_config(EMBEDDED_CONFIG) {
        Ok(config) => {
            info!("Configuration loaded");
            debug!("  motor: {}", config.motor);
            debug!("  avoid: {}", config.avoid);
            debug!("  deadman: {}", config.deadman);
            debug!("  sensor: {}", config.sensor);
            config
        }
        Err(e) => {
            warn!("tread.toml line {}: {}, using defaults", e.line, e.kind);
            RoverConfig::default()
        }
    }
}

/// Integer clock divider for the requested PWM frequency
fn pwm_divider(freq_hz: u32) -> u8 {
    let counts_per_sec = freq_hz.saturating_mul(PWM_TOP as u32 + 1).max(1);
    (SYS_CLOCK_HZ / counts_per_sec).clamp(1, 255) as u8
}
