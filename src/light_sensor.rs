//! BH1750 ambient-light sensor over I2C.
//!
//! Started once in continuous high-resolution mode; each tick then reads
//! the latest two-byte measurement without waiting on a conversion.

use embedded_hal_async::i2c::I2c;

use crate::brightness::LightSensor;
use crate::error::{Error, Result};

const BH1750_ADDRESS: u8 = 0x23;
const CMD_POWER_ON: u8 = 0x01;
const CMD_CONTINUOUS_HIGH_RES: u8 = 0x10;

/// Raw counts per lux at the default measurement accuracy.
const COUNTS_PER_LUX: f32 = 1.2;

pub struct Bh1750<I2C> {
    i2c: I2C,
}

impl<I2C: I2c> Bh1750<I2C> {
    /// Power the sensor on and start continuous high-resolution sampling.
    pub async fn new(mut i2c: I2C) -> Result<Self> {
        i2c.write(BH1750_ADDRESS, &[CMD_POWER_ON])
            .await
            .map_err(|_| Error::LightSensorUnavailable)?;
        i2c.write(BH1750_ADDRESS, &[CMD_CONTINUOUS_HIGH_RES])
            .await
            .map_err(|_| Error::LightSensorUnavailable)?;
        Ok(Self { i2c })
    }
}

impl<I2C: I2c> LightSensor for Bh1750<I2C> {
    async fn read_lux(&mut self) -> Option<f32> {
        let mut raw = [0_u8; 2];
        self.i2c.read(BH1750_ADDRESS, &mut raw).await.ok()?;
        let counts = u16::from_be_bytes(raw);
        Some(f32::from(counts) / COUNTS_PER_LUX)
    }
}
