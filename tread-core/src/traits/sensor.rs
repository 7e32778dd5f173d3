//! Range sensor trait

use embassy_time::Instant;

/// Far limit reported when nothing is in the field of view (mm)
pub const NO_TARGET_MM: u16 = 8190;

/// Errors that can occur with distance sensing
///
/// All of these are transient; the caller decides whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// Read did not complete within the sensor's ceiling
    Timeout,
    /// Bus transaction failed
    BusFault,
    /// Device flagged the measurement as invalid
    OutOfRange,
}

/// One distance reading and when it was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorSample {
    pub distance_mm: u16,
    pub taken_at: Instant,
}

/// Trait for single-shot distance sensors
///
/// Implementations bound their own wait (bus access and conversion) to a
/// fixed ceiling and fail with [`SensorError::Timeout`] past it. They do
/// not retry internally.
#[allow(async_fn_in_trait)]
pub trait RangeSensor {
    /// Read the distance to the nearest target in millimeters
    async fn read_mm(&mut self) -> Result<u16, SensorError>;

    /// Read and timestamp a distance
    async fn sample(&mut self) -> Result<SensorSample, SensorError> {
        let distance_mm = self.read_mm().await?;
        Ok(SensorSample {
            distance_mm,
            taken_at: Instant::now(),
        })
    }
}
