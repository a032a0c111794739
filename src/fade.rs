//! Minute-rollover fade cycle for the time display.
//!
//! The cycle runs Idle -> FadingOut -> FadingIn -> Idle. During the fade
//! phases the frame is held (the per-tick decay constant is zero) while an
//! internal counter climbs to the brightness ceiling; fading in re-renders
//! the display at a brightness that follows the counter.

use crate::constants::{BRIGHTNESS_CEILING, DAY_MAX_BRIGHTNESS, DAY_MIN_BRIGHTNESS};

/// Phase of the fade cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FadePhase {
    #[default]
    Idle,
    FadingOut,
    FadingIn,
}

/// What the time display should do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeFrame {
    /// Render at the steady global brightness.
    Steady { brightness: u8 },
    /// Keep the previous frame (fade-out hold).
    Hold,
    /// Re-render at the rising fade-in brightness.
    FadeIn { brightness: u8 },
}

/// Drives the three-phase fade cycle triggered once per minute rollover.
#[derive(Debug, Clone, Copy)]
pub struct FadeSequencer {
    phase: FadePhase,
    count: u16,
    global_brightness: u8,
}

/// Boot-time global brightness, halfway up the daytime envelope.
const INITIAL_BRIGHTNESS: u8 = (DAY_MAX_BRIGHTNESS - DAY_MIN_BRIGHTNESS) / 2;

impl Default for FadeSequencer {
    fn default() -> Self {
        Self {
            phase: FadePhase::Idle,
            count: 0,
            global_brightness: INITIAL_BRIGHTNESS,
        }
    }
}

impl FadeSequencer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn phase(&self) -> FadePhase {
        self.phase
    }

    #[must_use]
    pub const fn global_brightness(&self) -> u8 {
        self.global_brightness
    }

    /// Start a fade cycle. Called on every observed minute rollover.
    pub fn on_minute_rollover(&mut self) {
        self.phase = FadePhase::FadingOut;
        self.count = 0;
    }

    /// Decide this tick's rendering. Fading in pulls the global brightness
    /// along with the counter, clamped to `[min/2, max]`.
    pub fn frame(&mut self, min_brightness: u8, max_brightness: u8) -> FadeFrame {
        match self.phase {
            FadePhase::Idle => FadeFrame::Steady {
                brightness: self.global_brightness,
            },
            FadePhase::FadingOut => FadeFrame::Hold,
            FadePhase::FadingIn => {
                let floor = u16::from(min_brightness / 2);
                let ceiling = u16::from(max_brightness);
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "Clamped to a u8 ceiling first"
                )]
                let brightness = self.count.clamp(floor, ceiling) as u8;
                self.global_brightness = brightness;
                FadeFrame::FadeIn { brightness }
            }
        }
    }

    /// Advance the phase once the counter saturates. Called while the fade
    /// cycle is active, after rendering.
    pub fn advance_if_saturated(&mut self, max_brightness: u8) {
        if self.phase == FadePhase::Idle || self.count < BRIGHTNESS_CEILING {
            return;
        }
        match self.phase {
            FadePhase::FadingOut => self.phase = FadePhase::FadingIn,
            FadePhase::FadingIn => {
                self.phase = FadePhase::Idle;
                self.global_brightness = max_brightness;
            }
            FadePhase::Idle => {}
        }
        self.count = 0;
    }

    /// The counter increments exactly once per tick, in every mode.
    pub fn count_tick(&mut self) {
        self.count = self.count.saturating_add(1);
    }
}

#[cfg(all(test, not(target_os = "none")))]
mod tests {
    use super::*;

    const MIN: u8 = 80;
    const MAX: u8 = 200;

    /// One connected-mode tick: render decision, phase bookkeeping, count.
    fn tick(sequencer: &mut FadeSequencer) -> FadeFrame {
        let frame = sequencer.frame(MIN, MAX);
        sequencer.advance_if_saturated(MAX);
        sequencer.count_tick();
        frame
    }

    #[test]
    fn starts_idle_at_the_midpoint_brightness() {
        let sequencer = FadeSequencer::new();
        assert_eq!(sequencer.phase(), FadePhase::Idle);
        assert_eq!(sequencer.global_brightness(), 60);
    }

    #[test]
    fn full_cycle_settles_at_max_brightness() {
        let mut sequencer = FadeSequencer::new();
        assert!(matches!(tick(&mut sequencer), FadeFrame::Steady { .. }));

        sequencer.on_minute_rollover();
        // Fade-out holds the frame until the counter saturates.
        let mut holds = 0;
        while sequencer.phase() == FadePhase::FadingOut {
            assert_eq!(tick(&mut sequencer), FadeFrame::Hold);
            holds += 1;
            assert!(holds <= 1000, "fade-out never saturated");
        }
        assert_eq!(sequencer.phase(), FadePhase::FadingIn);

        // Fade-in brightness rises monotonically and never leaves the
        // envelope's fade range.
        let mut last = 0_u8;
        while sequencer.phase() == FadePhase::FadingIn {
            match tick(&mut sequencer) {
                FadeFrame::FadeIn { brightness } => {
                    assert!(brightness >= MIN / 2);
                    assert!(brightness <= MAX);
                    assert!(brightness >= last);
                    last = brightness;
                }
                other => panic!("unexpected frame during fade-in: {other:?}"),
            }
        }
        assert_eq!(sequencer.phase(), FadePhase::Idle);
        assert_eq!(sequencer.global_brightness(), MAX);
    }

    #[test]
    fn phases_never_skip_or_repeat() {
        let mut sequencer = FadeSequencer::new();
        sequencer.on_minute_rollover();
        let mut previous = sequencer.phase();
        let mut seen_fading_in = false;
        for _ in 0..2000 {
            tick(&mut sequencer);
            let phase = sequencer.phase();
            match (previous, phase) {
                (FadePhase::FadingOut, FadePhase::FadingIn) => seen_fading_in = true,
                (FadePhase::FadingOut, FadePhase::Idle) => {
                    panic!("skipped the fade-in phase")
                }
                (FadePhase::Idle, FadePhase::FadingOut | FadePhase::FadingIn) => {
                    panic!("fade restarted without a rollover")
                }
                _ => {}
            }
            previous = phase;
        }
        assert!(seen_fading_in);
        assert_eq!(sequencer.phase(), FadePhase::Idle);
    }

    #[test]
    fn rollover_during_fade_restarts_the_cycle() {
        let mut sequencer = FadeSequencer::new();
        sequencer.on_minute_rollover();
        for _ in 0..10 {
            tick(&mut sequencer);
        }
        sequencer.on_minute_rollover();
        assert_eq!(sequencer.phase(), FadePhase::FadingOut);
    }
}
