//! The tick orchestrator: one invocation per loop iteration, owning every
//! piece of render state.
//!
//! Each tick polls the inputs, advances the connectivity machine, picks the
//! renderer for the current mode, commits the frame, and refreshes the
//! brightness envelope. The only suspension points are the explicitly
//! bounded network windows and the portal pump.

use embassy_time::Duration;
use oorandom::Rand32;

use crate::brightness::{BrightnessAdapter, LightSensor};
use crate::civil_time::{TimeSyncService, WallClock};
use crate::connectivity::{ConnectivityMachine, ConnectivityState, Provisioner};
use crate::constants::{
    FADE_DECAY, FALLBACK_ROLL_PERIOD_MS, PORTAL_TICK_DELAY, TICK_DELAY, UTC_OFFSET_MINUTES,
};
use crate::diagnostics::StatusReporter;
use crate::fade::{FadeFrame, FadePhase, FadeSequencer};
use crate::frame::{Frame, PixelSink};
use crate::render::{hour_hue, render_fallback, render_portal_screen, render_time};

/// Four random digits and their hues, re-rolled once per second while the
/// display has no network link.
pub struct FallbackDigits {
    rng: Rand32,
    digits: [u8; 4],
    hues: [u8; 4],
    last_roll_ms: Option<u64>,
}

impl FallbackDigits {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Rand32::new(seed),
            digits: [0; 4],
            hues: [0; 4],
            last_roll_ms: None,
        }
    }

    #[must_use]
    pub const fn digits(&self) -> &[u8; 4] {
        &self.digits
    }

    #[must_use]
    pub const fn hues(&self) -> &[u8; 4] {
        &self.hues
    }

    /// Roll a new number and color set if a second has passed.
    #[expect(
        clippy::arithmetic_side_effects,
        clippy::integer_division_remainder_used,
        clippy::cast_possible_truncation,
        reason = "The rolled value is below 10000, so digit splits fit u8"
    )]
    pub fn roll_if_due(&mut self, now_ms: u64) {
        let due = self
            .last_roll_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= FALLBACK_ROLL_PERIOD_MS);
        if !due {
            return;
        }
        let value = self.rng.rand_range(0..10_000);
        self.digits = [
            (value / 1000 % 10) as u8,
            (value / 100 % 10) as u8,
            (value / 10 % 10) as u8,
            (value % 10) as u8,
        ];
        for hue in &mut self.hues {
            *hue = self.rng.rand_range(0..256) as u8;
        }
        self.last_roll_ms = Some(now_ms);
        info!("Fallback number: {}", value);
    }
}

/// All state the clock mutates, owned by the single tick context.
pub struct Controller {
    frame: Frame,
    fade: FadeSequencer,
    brightness: BrightnessAdapter,
    connectivity: ConnectivityMachine,
    wall_clock: WallClock,
    fallback: FallbackDigits,
    status: StatusReporter,
    last_minute: u8,
    last_lux: Option<f32>,
}

impl Controller {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            frame: Frame::new(),
            fade: FadeSequencer::new(),
            brightness: BrightnessAdapter::new(),
            connectivity: ConnectivityMachine::new(),
            wall_clock: WallClock::new(UTC_OFFSET_MINUTES),
            fallback: FallbackDigits::new(seed),
            status: StatusReporter::new(),
            last_minute: 0,
            last_lux: None,
        }
    }

    /// The frame as committed by the last tick.
    #[must_use]
    pub const fn frame(&self) -> &Frame {
        &self.frame
    }

    #[must_use]
    pub const fn connectivity_state(&self) -> ConnectivityState {
        self.connectivity.state()
    }

    #[must_use]
    pub const fn fade_phase(&self) -> FadePhase {
        self.fade.phase()
    }

    /// Run one tick and return how long the caller should sleep before the
    /// next one.
    pub async fn tick(
        &mut self,
        now_ms: u64,
        button_pressed: bool,
        net: &mut impl Provisioner,
        time_sync: &mut impl TimeSyncService,
        light: &mut impl LightSensor,
        sink: &mut impl PixelSink,
    ) -> Duration {
        self.connectivity.poll_button(button_pressed, now_ms, net).await;

        if self.connectivity.state() == ConnectivityState::ConfigPortal {
            self.connectivity.pump_portal(net).await;
            render_portal_screen(&mut self.frame, self.fade.global_brightness());
            sink.commit(&self.frame).await;
            self.status.frame_committed();
            self.fade.count_tick();
            return PORTAL_TICK_DELAY;
        }

        if self.connectivity.state() == ConnectivityState::Connecting {
            self.connectivity
                .establish(now_ms, net, time_sync, &mut self.wall_clock)
                .await;
        }

        self.connectivity.check_link(net);

        match self.connectivity.state() {
            ConnectivityState::Connected => self.render_connected(now_ms),
            ConnectivityState::Disconnected => {
                self.render_fallback_mode(now_ms);
                self.connectivity
                    .probe_reconnect(now_ms, net, time_sync, &mut self.wall_clock)
                    .await;
            }
            ConnectivityState::Connecting | ConnectivityState::ConfigPortal => {}
        }

        sink.commit(&self.frame).await;
        self.status.frame_committed();

        let reading = light.read_lux().await;
        if reading.is_some() {
            self.last_lux = reading;
        }
        self.brightness.update(reading);

        self.status.maybe_report(
            now_ms,
            &self.frame,
            &self.brightness,
            &self.fade,
            self.connectivity.state(),
            self.last_lux,
        );

        self.fade.count_tick();
        TICK_DELAY
    }

    /// Synchronized time display with the minute-rollover fade cycle.
    fn render_connected(&mut self, now_ms: u64) {
        let civil = self.wall_clock.civil_time(now_ms);
        if self.last_minute != civil.minute {
            self.last_minute = civil.minute;
            info!("Minute rollover to {}:{}", civil.hour, civil.minute);
            self.fade.on_minute_rollover();
        }

        let base_hue = hour_hue(civil.hour);
        let (min_brightness, max_brightness) = self.brightness.envelope();
        match self.fade.frame(min_brightness, max_brightness) {
            FadeFrame::Steady { brightness } => {
                let params = self.brightness.params(base_hue, brightness);
                render_time(&mut self.frame, &civil, &params, now_ms);
            }
            FadeFrame::Hold => {
                self.frame.fade_all(FADE_DECAY);
                self.fade.advance_if_saturated(max_brightness);
            }
            FadeFrame::FadeIn { brightness } => {
                let params = self.brightness.params(base_hue, brightness);
                render_time(&mut self.frame, &civil, &params, now_ms);
                self.frame.fade_all(FADE_DECAY);
                self.fade.advance_if_saturated(max_brightness);
            }
        }
    }

    /// Random digits while the link is down.
    fn render_fallback_mode(&mut self, now_ms: u64) {
        self.fallback.roll_if_due(now_ms);
        let params = self.brightness.params(0, self.fade.global_brightness());
        render_fallback(
            &mut self.frame,
            self.fallback.digits(),
            self.fallback.hues(),
            &params,
            now_ms,
        );
    }
}
