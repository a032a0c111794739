//! Ambient-light adaptation: maps lux readings to a brightness envelope
//! and the night-mode flag.

use crate::constants::{
    DAY_MAX_BRIGHTNESS, DAY_MIN_BRIGHTNESS, LUX_CEILING, NIGHT_LUX_THRESHOLD,
    NIGHT_MAX_BRIGHTNESS, NIGHT_MIN_BRIGHTNESS,
};
use crate::render::map_range;

/// An ambient-light source. The sensor is optional hardware; `None` means
/// no reading was available this tick.
#[expect(async_fn_in_trait, reason = "single-threaded executor")]
pub trait LightSensor {
    async fn read_lux(&mut self) -> Option<f32>;
}

/// Stand-in for boards without a light sensor.
pub struct NoLightSensor;

impl LightSensor for NoLightSensor {
    async fn read_lux(&mut self) -> Option<f32> {
        None
    }
}

/// A sensor that failed to initialize degrades to "no reading".
impl<S: LightSensor> LightSensor for Option<S> {
    async fn read_lux(&mut self) -> Option<f32> {
        match self {
            Some(sensor) => sensor.read_lux().await,
            None => None,
        }
    }
}

/// Per-tick rendering inputs. Recomputed every tick; `min_brightness <=
/// max_brightness` always holds.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RenderParams {
    pub base_hue: u16,
    pub base_brightness: u8,
    pub min_brightness: u8,
    pub max_brightness: u8,
    pub lux_adjustment: f32,
    pub night_mode: bool,
}

/// Maps lux readings onto the brightness envelope. Fields persist between
/// ticks so a missing reading degrades gracefully instead of flapping.
#[derive(Debug, Clone, Copy)]
pub struct BrightnessAdapter {
    night_mode: bool,
    lux_adjustment: f32,
    min_brightness: u8,
    max_brightness: u8,
}

impl Default for BrightnessAdapter {
    fn default() -> Self {
        Self {
            night_mode: false,
            lux_adjustment: 1.0,
            min_brightness: DAY_MIN_BRIGHTNESS,
            max_brightness: DAY_MAX_BRIGHTNESS,
        }
    }
}

impl BrightnessAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn night_mode(&self) -> bool {
        self.night_mode
    }

    #[must_use]
    pub const fn lux_adjustment(&self) -> f32 {
        self.lux_adjustment
    }

    #[must_use]
    pub const fn envelope(&self) -> (u8, u8) {
        (self.min_brightness, self.max_brightness)
    }

    /// Fold a sensor reading into the envelope. `None` retains the prior
    /// state. Deterministic given (previous state, reading).
    pub fn update(&mut self, reading: Option<f32>) {
        let Some(lux) = reading else {
            return;
        };
        let lux = lux.clamp(0.0, LUX_CEILING);
        if lux < NIGHT_LUX_THRESHOLD {
            self.night_mode = true;
            self.max_brightness = NIGHT_MAX_BRIGHTNESS;
            self.min_brightness = NIGHT_MIN_BRIGHTNESS;
        } else {
            self.night_mode = false;
            self.lux_adjustment = lux_adjustment_for(lux);
            self.max_brightness = scaled(DAY_MAX_BRIGHTNESS, self.lux_adjustment);
            self.min_brightness = scaled(DAY_MIN_BRIGHTNESS, self.lux_adjustment);
        }
    }

    /// Assemble this tick's render parameters.
    #[must_use]
    pub fn params(&self, base_hue: u16, base_brightness: u8) -> RenderParams {
        debug_assert!(self.min_brightness <= self.max_brightness);
        RenderParams {
            base_hue,
            base_brightness,
            min_brightness: self.min_brightness,
            max_brightness: self.max_brightness,
            lux_adjustment: self.lux_adjustment,
            night_mode: self.night_mode,
        }
    }
}

/// Map lux 0..130 onto 0.50..1.00 with integer truncation, clamped.
fn lux_adjustment_for(lux: f32) -> f32 {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "lux is clamped to [0, 300] before the cast"
    )]
    let mapped = map_range(lux as i32, 0, 130, 50, 100);
    #[expect(clippy::cast_precision_loss, reason = "mapped is at most 165")]
    let adjustment = mapped as f32 / 100.0;
    adjustment.clamp(0.5, 1.0)
}

fn scaled(base: u8, adjustment: f32) -> u8 {
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "adjustment is within [0.5, 1.0], so the product fits u8"
    )]
    let value = libm::roundf(f32::from(base) * adjustment) as u8;
    value
}
