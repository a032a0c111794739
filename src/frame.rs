//! The pixel frame committed to the LED strip once per tick.

use core::ops::{Index, IndexMut};

use smart_leds::RGB8;

use crate::constants::{PIXEL_COUNT, PIXELS_PER_CELL, PIXELS_PER_SEGMENT};

/// RGB color representation re-exported from `smart_leds`.
pub type Rgb = RGB8;

/// Map (cell, segment, sub-pixel) to a strip index.
///
/// Cell 3 is the leftmost character, cell 0 the rightmost.
#[must_use]
#[expect(
    clippy::arithmetic_side_effects,
    reason = "All factors are small display-geometry constants"
)]
pub const fn pixel_index(cell: usize, segment: usize, sub: usize) -> usize {
    cell * PIXELS_PER_CELL + segment * PIXELS_PER_SEGMENT + sub
}

/// Anything that accepts a finished frame: the physical strip driver, or a
/// capture buffer in tests.
#[expect(async_fn_in_trait, reason = "single-threaded executor")]
pub trait PixelSink {
    async fn commit(&mut self, frame: &Frame);
}

/// One full frame of pixel colors, mutated in place by the renderers and
/// committed once per tick. No partial commits are observable.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame([Rgb; PIXEL_COUNT]);

impl Frame {
    #[must_use]
    pub const fn new() -> Self {
        Self([RGB8::new(0, 0, 0); PIXEL_COUNT])
    }

    /// All pixels off.
    pub fn clear(&mut self) {
        self.0 = [RGB8::new(0, 0, 0); PIXEL_COUNT];
    }

    #[must_use]
    pub const fn pixels(&self) -> &[Rgb; PIXEL_COUNT] {
        &self.0
    }

    /// Scale every pixel toward black by `amount` (0 = leave unchanged,
    /// 255 = black), using the same 8-bit scaling the strip hardware
    /// libraries use.
    pub fn fade_all(&mut self, amount: u8) {
        #[expect(
            clippy::arithmetic_side_effects,
            clippy::cast_possible_truncation,
            reason = "u16 intermediate cannot overflow: 255 * 256 < 65536"
        )]
        fn scale(value: u8, keep: u16) -> u8 {
            ((u16::from(value) * keep) >> 8) as u8
        }
        let keep = u16::from(255_u8.wrapping_sub(amount)).saturating_add(1);
        for pixel in &mut self.0 {
            pixel.r = scale(pixel.r, keep);
            pixel.g = scale(pixel.g, keep);
            pixel.b = scale(pixel.b, keep);
        }
    }

    /// Mean channel average over lit pixels, for the diagnostics line.
    #[must_use]
    #[expect(
        clippy::arithmetic_side_effects,
        clippy::cast_possible_truncation,
        reason = "Channel sums stay far below u32::MAX and the mean fits u8"
    )]
    pub fn average_lit_brightness(&self) -> u8 {
        let mut sum: u32 = 0;
        let mut lit: u32 = 0;
        for pixel in &self.0 {
            let light = (u32::from(pixel.r) + u32::from(pixel.g) + u32::from(pixel.b)) / 3;
            if light > 0 {
                lit = lit.saturating_add(1);
                sum = sum.saturating_add(light);
            }
        }
        if lit == 0 { 0 } else { (sum / lit) as u8 }
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<usize> for Frame {
    type Output = Rgb;

    #[expect(clippy::indexing_slicing, reason = "Caller's responsibility")]
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl IndexMut<usize> for Frame {
    #[expect(clippy::indexing_slicing, reason = "Caller's responsibility")]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}
