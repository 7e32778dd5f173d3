//! VL53L0X time-of-flight range sensor
//!
//! Single-shot ranging over async I2C. Every bus transaction of a read,
//! conversion and any pending initialization included, runs under one
//! timeout taken from [`SensorConfig`],
//! so a wedged bus or a sensor that never signals completion fails with
//! [`SensorError::Timeout`] instead of stalling the control loop.
//!
//! Readings at or beyond the device's far limit mean nothing was in the
//! field of view and are reported as [`NO_TARGET_MM`].

use embassy_time::{with_timeout, Timer};
use embedded_hal_async::i2c::I2c;

use tread_core::config::{ConfigError, SensorConfig};
use tread_core::traits::{RangeSensor, SensorError, NO_TARGET_MM};

/// Register addresses
mod reg {
    pub const SYSRANGE_START: u8 = 0x00;
    pub const SYSTEM_SEQUENCE_CONFIG: u8 = 0x01;
    pub const SYSTEM_INTERRUPT_CONFIG_GPIO: u8 = 0x0A;
    pub const SYSTEM_INTERRUPT_CLEAR: u8 = 0x0B;
    pub const RESULT_INTERRUPT_STATUS: u8 = 0x13;
    pub const RESULT_RANGE_STATUS: u8 = 0x14;
    pub const GPIO_HV_MUX_ACTIVE_HIGH: u8 = 0x84;
    pub const VHV_CONFIG_PAD_SCL_SDA_EXTSUP_HV: u8 = 0x89;
    pub const I2C_MODE: u8 = 0x88;
    pub const POWER_MANAGEMENT: u8 = 0x80;
    pub const PAGE_SELECT: u8 = 0xFF;
    pub const STOP_VARIABLE: u8 = 0x91;
    pub const IDENTIFICATION_MODEL_ID: u8 = 0xC0;
}

/// Expected value of `IDENTIFICATION_MODEL_ID`
const MODEL_ID: u8 = 0xEE;

/// Distance register, big-endian, within the range result block
const RANGE_OFFSET: u8 = 10;

/// Device range status meaning a valid measurement
const RANGE_VALID: u8 = 11;

/// Poll interval while waiting on the device
const POLL_INTERVAL_US: u64 = 500;

/// VL53L0X driver
pub struct Vl53l0x<I2C> {
    i2c: I2C,
    config: SensorConfig,
    stop_variable: u8,
    initialized: bool,
}

impl<I2C: I2c> Vl53l0x<I2C> {
    pub fn new(i2c: I2C, config: SensorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            i2c,
            config: config.validated()?,
            stop_variable: 0,
            initialized: false,
        })
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Check the device identity and configure it for single-shot ranging
    ///
    /// Called on the first read if not called explicitly.
    pub async fn init(&mut self) -> Result<(), SensorError> {
        match with_timeout(self.config.timeout(), self.bring_up()).await {
            Ok(result) => result,
            Err(_) => {
                warn!("VL53L0X init failed: {:?}", SensorError::Timeout);
                Err(SensorError::Timeout)
            }
        }
    }

    async fn bring_up(&mut self) -> Result<(), SensorError> {
        let result = self.configure().await;
        match result {
            Ok(()) => {
                self.initialized = true;
                info!("VL53L0X ready at {=u8:#x}", self.config.address);
            }
            Err(e) => warn!("VL53L0X init failed: {:?}", e),
        }
        result
    }

    async fn configure(&mut self) -> Result<(), SensorError> {
        let id = self.read_reg(reg::IDENTIFICATION_MODEL_ID).await?;
        if id != MODEL_ID {
            warn!("unexpected model id {=u8:#x}", id);
            return Err(SensorError::BusFault);
        }

        // 2V8 I/O mode
        let vhv = self.read_reg(reg::VHV_CONFIG_PAD_SCL_SDA_EXTSUP_HV).await?;
        self.write_reg(reg::VHV_CONFIG_PAD_SCL_SDA_EXTSUP_HV, vhv | 0x01)
            .await?;

        // Standard I2C mode, then capture the stop variable
        self.write_reg(reg::I2C_MODE, 0x00).await?;
        self.write_reg(reg::POWER_MANAGEMENT, 0x01).await?;
        self.write_reg(reg::PAGE_SELECT, 0x01).await?;
        self.write_reg(reg::SYSRANGE_START, 0x00).await?;
        self.stop_variable = self.read_reg(reg::STOP_VARIABLE).await?;
        self.write_reg(reg::SYSRANGE_START, 0x01).await?;
        self.write_reg(reg::PAGE_SELECT, 0x00).await?;
        self.write_reg(reg::POWER_MANAGEMENT, 0x00).await?;

        // Interrupt on new sample ready, active low
        self.write_reg(reg::SYSTEM_INTERRUPT_CONFIG_GPIO, 0x04)
            .await?;
        let mux = self.read_reg(reg::GPIO_HV_MUX_ACTIVE_HIGH).await?;
        self.write_reg(reg::GPIO_HV_MUX_ACTIVE_HIGH, mux & !0x10)
            .await?;
        self.write_reg(reg::SYSTEM_INTERRUPT_CLEAR, 0x01).await?;

        // DSS, pre-range and final-range steps
        self.write_reg(reg::SYSTEM_SEQUENCE_CONFIG, 0xE8).await?;
        Ok(())
    }

    /// One single-shot measurement
    async fn measure(&mut self) -> Result<u16, SensorError> {
        self.write_reg(reg::POWER_MANAGEMENT, 0x01).await?;
        self.write_reg(reg::PAGE_SELECT, 0x01).await?;
        self.write_reg(reg::SYSRANGE_START, 0x00).await?;
        self.write_reg(reg::STOP_VARIABLE, self.stop_variable).await?;
        self.write_reg(reg::SYSRANGE_START, 0x01).await?;
        self.write_reg(reg::PAGE_SELECT, 0x00).await?;
        self.write_reg(reg::POWER_MANAGEMENT, 0x00).await?;

        self.write_reg(reg::SYSRANGE_START, 0x01).await?;

        // Start bit clears once the measurement is under way
        while self.read_reg(reg::SYSRANGE_START).await? & 0x01 != 0 {
            Timer::after_micros(POLL_INTERVAL_US).await;
        }
        while self.read_reg(reg::RESULT_INTERRUPT_STATUS).await? & 0x07 == 0 {
            Timer::after_micros(POLL_INTERVAL_US).await;
        }

        let status = (self.read_reg(reg::RESULT_RANGE_STATUS).await? >> 3) & 0x0F;
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(
                self.config.address,
                &[reg::RESULT_RANGE_STATUS + RANGE_OFFSET],
                &mut buf,
            )
            .await
            .map_err(|_| SensorError::BusFault)?;
        self.write_reg(reg::SYSTEM_INTERRUPT_CLEAR, 0x01).await?;

        let distance = u16::from_be_bytes(buf);
        if distance >= NO_TARGET_MM {
            return Ok(NO_TARGET_MM);
        }
        if status != RANGE_VALID && status != 0 {
            debug!("range status {}", status);
            return Err(SensorError::OutOfRange);
        }
        Ok(distance)
    }

    async fn read_reg(&mut self, reg: u8) -> Result<u8, SensorError> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.config.address, &[reg], &mut buf)
            .await
            .map_err(|_| SensorError::BusFault)?;
        Ok(buf[0])
    }

    async fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), SensorError> {
        self.i2c
            .write(self.config.address, &[reg, value])
            .await
            .map_err(|_| SensorError::BusFault)
    }
}

impl<I2C: I2c> RangeSensor for Vl53l0x<I2C> {
    async fn read_mm(&mut self) -> Result<u16, SensorError> {
        let timeout = self.config.timeout();
        let read = async {
            if !self.initialized {
                self.bring_up().await?;
            }
            self.measure().await
        };
        match with_timeout(timeout, read).await {
            Ok(result) => result,
            Err(_) => Err(SensorError::Timeout),
        }
    }
}
