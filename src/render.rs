//! Converts glyphs plus render parameters into pixel colors, including the
//! time-of-day hue and the shimmer animation.
//!
//! All output is a pure function of `(inputs, elapsed_ms)`, so frames are
//! deterministic and replayable in tests.

use smart_leds::hsv::{Hsv, hsv2rgb};

use crate::brightness::RenderParams;
use crate::civil_time::CivilTime;
use crate::constants::{
    EDGE_PIXEL_SCALE, PIXEL_SATURATION, PIXELS_PER_SEGMENT, PORTAL_HUE, SEGMENTS_PER_CELL,
};
use crate::frame::{Frame, Rgb, pixel_index};
use crate::glyph::Glyph;

/// Arduino-style integer range mapping, truncation included.
#[expect(
    clippy::arithmetic_side_effects,
    reason = "Callers pass fixed, non-degenerate ranges"
)]
pub(crate) const fn map_range(
    value: i32,
    in_min: i32,
    in_max: i32,
    out_min: i32,
    out_max: i32,
) -> i32 {
    (value - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

/// Base hue for the time display, derived from the hour of day.
#[must_use]
#[expect(
    clippy::arithmetic_side_effects,
    reason = "(hour + 7) % 24 stays below 24, so the product fits u16"
)]
pub fn hour_hue(hour: u8) -> u16 {
    ((u16::from(hour) + 7) % 24) * (65535 / 24)
}

/// Fast (~1 Hz) sinusoid that modulates brightness around the base value.
fn shimmer_brightness(elapsed_ms: u64, pixel: usize, base: u8) -> i32 {
    #[expect(clippy::cast_precision_loss, reason = "millis precision is ample")]
    let phase = elapsed_ms as f64 / 1000.0 + pixel as f64 / 30.0;
    let angle = libm::sin(phase);
    #[expect(
        clippy::cast_possible_truncation,
        reason = "all values are within a few hundred"
    )]
    let (amplitude, low, high) = (
        (angle * 100.0) as i32,
        (f64::from(base) * 0.7) as i32,
        (f64::from(base) * 1.2) as i32,
    );
    map_range(amplitude, -100, 100, low, high)
}

/// Slow (~1/15 s) sinusoid that drifts the hue around the base value.
fn hue_drift(elapsed_ms: u64, pixel: usize) -> i32 {
    #[expect(clippy::cast_precision_loss, reason = "millis precision is ample")]
    let phase = elapsed_ms as f64 / 15000.0 + pixel as f64 / 30.0;
    #[expect(clippy::cast_possible_truncation, reason = "bounded by +/-25")]
    let drift = (libm::cos(phase) * 25.0) as i32;
    drift
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "Hue wraps modulo the color wheel"
)]
fn drifted_hue(base_hue: u16, drift: i32) -> u8 {
    #[expect(
        clippy::arithmetic_side_effects,
        reason = "base_hue + drift fits comfortably in i32"
    )]
    let value = (i32::from(base_hue) + drift) % 255;
    value as u8
}

fn clamp_envelope(value: i32, params: &RenderParams) -> u8 {
    let min = i32::from(params.min_brightness);
    let max = i32::from(params.max_brightness);
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "clamped to a u8 envelope first"
    )]
    let clamped = if value < min {
        min as u8
    } else if value > max {
        max as u8
    } else {
        value as u8
    };
    clamped
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "scale is in [0, 1.2] so the product fits u8"
)]
fn scale_value(value: u8, scale: f32) -> u8 {
    (f32::from(value) * scale) as u8
}

fn segment_lit(mask: u8, segment: usize) -> bool {
    mask & (1_u8 << segment) != 0
}

/// Render one animated digit for the synchronized time display.
#[expect(
    clippy::cast_possible_truncation,
    reason = "The night-mode hue is the low byte of the base hue"
)]
pub fn render_digit(
    frame: &mut Frame,
    cell: usize,
    glyph: Glyph,
    params: &RenderParams,
    elapsed_ms: u64,
) {
    let mask = glyph.segments_or_blank();
    for segment in 0..SEGMENTS_PER_CELL {
        for sub in 0..PIXELS_PER_SEGMENT {
            let index = pixel_index(cell, segment, sub);
            if !segment_lit(mask, segment) {
                frame[index] = Rgb::new(0, 0, 0);
                continue;
            }
            frame[index] = if params.night_mode {
                // Flat color and brightness at night; the center pixel of
                // each segment is full value, the edges run at 60%.
                let value = clamp_envelope(i32::from(params.base_brightness), params);
                let value = if sub == 1 {
                    value
                } else {
                    scale_value(value, EDGE_PIXEL_SCALE)
                };
                hsv2rgb(Hsv {
                    hue: (params.base_hue & 0xFF) as u8,
                    sat: PIXEL_SATURATION,
                    val: value,
                })
            } else {
                let brightness = shimmer_brightness(elapsed_ms, index, params.base_brightness);
                let brightness = clamp_envelope(brightness, params);
                hsv2rgb(Hsv {
                    hue: drifted_hue(params.base_hue, hue_drift(elapsed_ms, index)),
                    sat: PIXEL_SATURATION,
                    val: scale_value(brightness, params.lux_adjustment),
                })
            };
        }
    }
}

/// Render one digit of the fallback display: brightness shimmer only, with
/// an externally supplied hue and no ambient-light scaling.
pub fn render_random_digit(
    frame: &mut Frame,
    cell: usize,
    glyph: Glyph,
    hue: u8,
    params: &RenderParams,
    elapsed_ms: u64,
) {
    let mask = glyph.segments_or_blank();
    for segment in 0..SEGMENTS_PER_CELL {
        for sub in 0..PIXELS_PER_SEGMENT {
            let index = pixel_index(cell, segment, sub);
            if segment_lit(mask, segment) {
                let brightness = shimmer_brightness(elapsed_ms, index, params.base_brightness);
                frame[index] = hsv2rgb(Hsv {
                    hue,
                    sat: PIXEL_SATURATION,
                    val: clamp_envelope(brightness, params),
                });
            } else {
                frame[index] = Rgb::new(0, 0, 0);
            }
        }
    }
}

/// Render one static letter for the configuration-portal screen.
pub fn render_letter(frame: &mut Frame, cell: usize, glyph: Glyph, brightness: u8) {
    let mask = glyph.segments_or_blank();
    for segment in 0..SEGMENTS_PER_CELL {
        for sub in 0..PIXELS_PER_SEGMENT {
            let index = pixel_index(cell, segment, sub);
            if segment_lit(mask, segment) {
                let value = if sub == 1 {
                    brightness
                } else {
                    scale_value(brightness, EDGE_PIXEL_SCALE)
                };
                frame[index] = hsv2rgb(Hsv {
                    hue: PORTAL_HUE,
                    sat: PIXEL_SATURATION,
                    val: value,
                });
            } else {
                frame[index] = Rgb::new(0, 0, 0);
            }
        }
    }
}

/// Render HH:MM across the four cells. Cell 3 is leftmost.
#[expect(
    clippy::integer_division_remainder_used,
    clippy::arithmetic_side_effects,
    reason = "hour < 24 and minute < 60 make the digit splits safe"
)]
pub fn render_time(frame: &mut Frame, time: &CivilTime, params: &RenderParams, elapsed_ms: u64) {
    render_digit(frame, 3, Glyph::Digit(time.hour / 10), params, elapsed_ms);
    render_digit(frame, 2, Glyph::Digit(time.hour % 10), params, elapsed_ms);
    render_digit(frame, 1, Glyph::Digit(time.minute / 10), params, elapsed_ms);
    render_digit(frame, 0, Glyph::Digit(time.minute % 10), params, elapsed_ms);
}

/// Render the fallback digits, most significant first.
#[expect(
    clippy::arithmetic_side_effects,
    reason = "position is at most 3, so the cell index is in range"
)]
pub fn render_fallback(
    frame: &mut Frame,
    digits: &[u8; 4],
    hues: &[u8; 4],
    params: &RenderParams,
    elapsed_ms: u64,
) {
    for (position, (&digit, &hue)) in digits.iter().zip(hues.iter()).enumerate() {
        render_random_digit(frame, 3 - position, Glyph::Digit(digit), hue, params, elapsed_ms);
    }
}

/// Render "AP  " for the configuration portal.
pub fn render_portal_screen(frame: &mut Frame, brightness: u8) {
    frame.clear();
    render_letter(frame, 3, Glyph::LetterA, brightness);
    render_letter(frame, 2, Glyph::LetterP, brightness);
    render_letter(frame, 1, Glyph::Blank, brightness);
    render_letter(frame, 0, Glyph::Blank, brightness);
}

#[cfg(all(test, not(target_os = "none")))]
mod tests {
    use super::*;

    fn day_params(base_brightness: u8) -> RenderParams {
        RenderParams {
            base_hue: hour_hue(14),
            base_brightness,
            min_brightness: 80,
            max_brightness: 200,
            lux_adjustment: 1.0,
            night_mode: false,
        }
    }

    #[test]
    fn hour_hue_wraps_around_midnight() {
        assert_eq!(hour_hue(14), 21 * 2730);
        assert_eq!(hour_hue(17), 0);
        assert_eq!(hour_hue(0), 7 * 2730);
    }

    #[test]
    fn map_range_truncates_like_the_hardware_libraries() {
        assert_eq!(map_range(200, 0, 130, 50, 100), 126);
        assert_eq!(map_range(-100, -100, 100, 42, 72), 42);
        assert_eq!(map_range(100, -100, 100, 42, 72), 72);
        assert_eq!(map_range(86, -100, 100, 70, 120), 116);
    }

    #[test]
    fn unlit_segments_are_dark_in_every_mode() {
        let mut frame = Frame::new();
        let params = day_params(100);
        render_digit(&mut frame, 0, Glyph::Digit(1), &params, 12_345);
        // Digit 1 lights only segments 0 and 3.
        for segment in [1, 2, 4, 5, 6] {
            for sub in 0..3 {
                assert_eq!(frame[pixel_index(0, segment, sub)], Rgb::new(0, 0, 0));
            }
        }
        for segment in [0, 3] {
            for sub in 0..3 {
                assert_ne!(frame[pixel_index(0, segment, sub)], Rgb::new(0, 0, 0));
            }
        }
    }

    #[test]
    fn rendering_is_deterministic() {
        let params = day_params(100);
        let mut first = Frame::new();
        let mut second = Frame::new();
        render_digit(&mut first, 2, Glyph::Digit(7), &params, 987_654);
        render_digit(&mut second, 2, Glyph::Digit(7), &params, 987_654);
        assert!(first == second);
    }

    #[test]
    fn golden_pixel_at_boot() {
        // cell 3, segment 0, sub 0 => pixel 63; digit 8 lights segment 0.
        // At t=0 with base 100: sin(2.1)*100 -> 86, mapped into [70, 120]
        // gives 116; cos(2.1)*25 -> -12, so hue = (57330 - 12) % 255 = 198.
        let mut frame = Frame::new();
        let params = day_params(100);
        render_digit(&mut frame, 3, Glyph::Digit(8), &params, 0);
        let expected = hsv2rgb(Hsv {
            hue: 198,
            sat: PIXEL_SATURATION,
            val: 116,
        });
        assert_eq!(frame[63], expected);
    }

    #[test]
    fn shimmer_stays_inside_the_envelope() {
        let params = day_params(150);
        for elapsed_ms in (0..5000).step_by(37) {
            for pixel in 0..84 {
                let brightness =
                    clamp_envelope(shimmer_brightness(elapsed_ms, pixel, 150), &params);
                assert!(brightness >= params.min_brightness);
                assert!(brightness <= params.max_brightness);
            }
        }
    }

    #[test]
    fn night_mode_is_flat_with_dimmed_edges() {
        let params = RenderParams {
            base_hue: 57330,
            base_brightness: 32,
            min_brightness: 30,
            max_brightness: 35,
            lux_adjustment: 1.0,
            night_mode: true,
        };
        let mut frame = Frame::new();
        render_digit(&mut frame, 0, Glyph::Digit(8), &params, 123_456);
        // Hue is the low byte of the base hue: 57330 & 0xFF = 242.
        let center = hsv2rgb(Hsv {
            hue: 242,
            sat: PIXEL_SATURATION,
            val: 32,
        });
        let edge = hsv2rgb(Hsv {
            hue: 242,
            sat: PIXEL_SATURATION,
            val: 19,
        });
        for segment in 0..7 {
            assert_eq!(frame[pixel_index(0, segment, 1)], center);
            assert_eq!(frame[pixel_index(0, segment, 0)], edge);
            assert_eq!(frame[pixel_index(0, segment, 2)], edge);
        }
        // Independent of elapsed time.
        let mut later = Frame::new();
        render_digit(&mut later, 0, Glyph::Digit(8), &params, 999_999);
        assert!(frame == later);
    }

    #[test]
    fn portal_screen_shows_ap_and_blanks() {
        let mut frame = Frame::new();
        render_portal_screen(&mut frame, 60);
        // Cells 0 and 1 are blank.
        for cell in 0..2 {
            for segment in 0..7 {
                for sub in 0..3 {
                    assert_eq!(frame[pixel_index(cell, segment, sub)], Rgb::new(0, 0, 0));
                }
            }
        }
        // 'P' lights segment 0, leaves segment 3 dark.
        assert_ne!(frame[pixel_index(2, 0, 1)], Rgb::new(0, 0, 0));
        assert_eq!(frame[pixel_index(2, 3, 1)], Rgb::new(0, 0, 0));
        // Edge pixels run at 60% of the center value.
        assert_ne!(frame[pixel_index(3, 0, 0)], frame[pixel_index(3, 0, 1)]);
    }
}
