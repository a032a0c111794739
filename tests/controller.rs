//! End-to-end tick scenarios with fake network, time, light, and pixel
//! collaborators.

use embassy_futures::block_on;
use embassy_time::Duration;
use miniclock::{
    ConnectivityState, Controller, FadePhase, Frame, Glyph, LightSensor, PixelSink, PortalEvent,
    Provisioner, Rgb, SyncError, TimeSyncService, UnixSeconds, pixel_index,
};

/// 2024-10-04 13:07:00 UTC; displayed as 14:07 at the +60 minute offset.
const SYNC_UNIX: i64 = 20_000 * 86_400 + 13 * 3600 + 7 * 60;

const TICK_MS: u64 = 10;

struct FakeNet {
    link_up: bool,
    auto_connect_result: bool,
    portal_event: PortalEvent,
    portal_starts: u32,
    resets: u32,
}

impl FakeNet {
    fn new() -> Self {
        Self {
            link_up: false,
            auto_connect_result: false,
            portal_event: PortalEvent::Pending,
            portal_starts: 0,
            resets: 0,
        }
    }
}

impl Provisioner for FakeNet {
    async fn try_auto_connect(&mut self, _timeout: Duration) -> bool {
        self.link_up = self.auto_connect_result;
        self.auto_connect_result
    }

    async fn start_config_portal(&mut self, _ssid: &str) -> bool {
        self.portal_starts += 1;
        true
    }

    async fn process_portal(&mut self) -> PortalEvent {
        let event = self.portal_event;
        if event == PortalEvent::CredentialsSaved {
            self.link_up = true;
        }
        event
    }

    fn is_link_up(&self) -> bool {
        self.link_up
    }

    fn reset_credentials(&mut self) {
        self.resets += 1;
    }
}

struct FakeSync {
    result: Result<UnixSeconds, SyncError>,
    calls: u32,
    last_timeout: Option<Duration>,
}

impl FakeSync {
    fn syncing_to(unix: i64) -> Self {
        Self {
            result: Ok(UnixSeconds(unix)),
            calls: 0,
            last_timeout: None,
        }
    }
}

impl TimeSyncService for FakeSync {
    async fn sync(&mut self, timeout: Duration) -> miniclock::Result<UnixSeconds, SyncError> {
        self.calls += 1;
        self.last_timeout = Some(timeout);
        self.result
    }
}

struct FakeLux(Option<f32>);

impl LightSensor for FakeLux {
    async fn read_lux(&mut self) -> Option<f32> {
        self.0
    }
}

#[derive(Default)]
struct CaptureSink {
    commits: u32,
}

impl PixelSink for CaptureSink {
    async fn commit(&mut self, _frame: &Frame) {
        self.commits += 1;
    }
}

struct Rig {
    controller: Controller,
    net: FakeNet,
    sync: FakeSync,
    lux: FakeLux,
    sink: CaptureSink,
    now_ms: u64,
}

impl Rig {
    fn new() -> Self {
        Self {
            controller: Controller::new(1),
            net: FakeNet::new(),
            sync: FakeSync::syncing_to(SYNC_UNIX),
            lux: FakeLux(None),
            sink: CaptureSink::default(),
            now_ms: 0,
        }
    }

    /// Run one tick at the current time, then advance it by the tick period.
    fn tick(&mut self) -> Duration {
        let delay = block_on(self.controller.tick(
            self.now_ms,
            false,
            &mut self.net,
            &mut self.sync,
            &mut self.lux,
            &mut self.sink,
        ));
        self.now_ms += TICK_MS;
        delay
    }

    fn tick_with_button(&mut self) -> Duration {
        let delay = block_on(self.controller.tick(
            self.now_ms,
            true,
            &mut self.net,
            &mut self.sync,
            &mut self.lux,
            &mut self.sink,
        ));
        self.now_ms += TICK_MS;
        delay
    }

    /// Tick until the fade cycle settles, with a safety bound.
    fn tick_until_idle(&mut self) {
        for _ in 0..2000 {
            self.tick();
            if self.controller.fade_phase() == FadePhase::Idle {
                return;
            }
        }
        panic!("fade cycle never settled");
    }
}

/// Which segments are lit in a cell, as a 7-bit mask.
fn lit_mask(frame: &Frame, cell: usize) -> u8 {
    let mut mask = 0_u8;
    for segment in 0..7 {
        for sub in 0..3 {
            if frame[pixel_index(cell, segment, sub)] != Rgb::new(0, 0, 0) {
                mask |= 1 << segment;
            }
        }
    }
    mask
}

/// Decode the displayed digits, leftmost cell first.
fn shown_digits(frame: &Frame) -> [Option<u8>; 4] {
    let mut digits = [None; 4];
    for (position, slot) in digits.iter_mut().enumerate() {
        let mask = lit_mask(frame, 3 - position);
        *slot = (0..10).find(|&digit| Glyph::Digit(digit).encode().unwrap() == mask);
    }
    digits
}

#[test]
fn boot_with_network_shows_the_synced_time() {
    let mut rig = Rig::new();
    rig.net.auto_connect_result = true;

    let delay = rig.tick();
    assert_eq!(delay, Duration::from_millis(10));
    assert_eq!(
        rig.controller.connectivity_state(),
        ConnectivityState::Connected
    );
    assert_eq!(rig.sync.calls, 1);
    assert_eq!(rig.sync.last_timeout, Some(Duration::from_secs(10)));

    // The first observed minute starts a fade cycle; ride it out.
    rig.tick_until_idle();
    assert_eq!(
        shown_digits(rig.controller.frame()),
        [Some(1), Some(4), Some(0), Some(7)]
    );
    assert_eq!(rig.sink.commits, u32::try_from(rig.now_ms / TICK_MS).unwrap());
}

#[test]
fn minute_rollover_fades_into_the_next_minute() {
    let mut rig = Rig::new();
    rig.net.auto_connect_result = true;
    rig.tick();
    rig.tick_until_idle();
    assert_eq!(
        shown_digits(rig.controller.frame()),
        [Some(1), Some(4), Some(0), Some(7)]
    );

    // Walk up to just before the rollover at +60 s.
    while rig.now_ms < 60_000 {
        rig.tick();
        assert_eq!(rig.controller.fade_phase(), FadePhase::Idle);
    }

    // The rollover must pass through FadingOut, then FadingIn, then settle.
    let mut phases = Vec::new();
    for _ in 0..2000 {
        rig.tick();
        let phase = rig.controller.fade_phase();
        if phases.last() != Some(&phase) {
            phases.push(phase);
        }
        // While fading out, the previous minute's frame is held.
        if phase == FadePhase::FadingOut {
            assert_eq!(
                shown_digits(rig.controller.frame()),
                [Some(1), Some(4), Some(0), Some(7)]
            );
        }
        if phase == FadePhase::Idle {
            break;
        }
    }
    assert_eq!(
        phases,
        vec![FadePhase::FadingOut, FadePhase::FadingIn, FadePhase::Idle]
    );
    assert_eq!(
        shown_digits(rig.controller.frame()),
        [Some(1), Some(4), Some(0), Some(8)]
    );
}

#[test]
fn boot_without_network_falls_back_to_random_digits() {
    let mut rig = Rig::new();

    rig.tick();
    assert_eq!(
        rig.controller.connectivity_state(),
        ConnectivityState::Disconnected
    );
    assert_eq!(rig.sync.calls, 0);

    // Every cell shows some valid digit.
    for digit in shown_digits(rig.controller.frame()) {
        assert!(digit.is_some());
    }

    // The number holds for a second, then re-rolls.
    let first = shown_digits(rig.controller.frame());
    while rig.now_ms < 900 {
        rig.tick();
        assert_eq!(shown_digits(rig.controller.frame()), first);
    }
}

#[test]
fn link_loss_switches_to_fallback_and_recovers_on_probe() {
    let mut rig = Rig::new();
    rig.net.auto_connect_result = true;
    rig.tick();
    rig.tick_until_idle();

    rig.net.link_up = false;
    rig.tick();
    assert_eq!(
        rig.controller.connectivity_state(),
        ConnectivityState::Disconnected
    );

    // Link comes back; nothing happens until the minute probe fires.
    rig.net.link_up = true;
    while rig.now_ms < 60_000 {
        rig.tick();
        assert_eq!(
            rig.controller.connectivity_state(),
            ConnectivityState::Disconnected
        );
    }
    rig.tick();
    assert_eq!(
        rig.controller.connectivity_state(),
        ConnectivityState::Connected
    );
    // The reconnect sync uses the shorter window.
    assert_eq!(rig.sync.last_timeout, Some(Duration::from_secs(5)));
}

#[test]
fn holding_the_button_opens_the_portal_once() {
    let mut rig = Rig::new();
    rig.net.auto_connect_result = true;
    rig.tick();

    while rig.controller.connectivity_state() != ConnectivityState::ConfigPortal {
        rig.tick_with_button();
        assert!(rig.now_ms <= 10_000, "portal never opened");
    }
    assert_eq!(rig.net.portal_starts, 1);
    assert_eq!(rig.net.resets, 1);

    // Portal ticks render "AP  " and slow the loop down.
    let delay = rig.tick_with_button();
    assert_eq!(delay, Duration::from_millis(100));
    let frame = rig.controller.frame();
    assert_eq!(lit_mask(frame, 3), Glyph::LetterA.encode().unwrap());
    assert_eq!(lit_mask(frame, 2), Glyph::LetterP.encode().unwrap());
    assert_eq!(lit_mask(frame, 1), 0);
    assert_eq!(lit_mask(frame, 0), 0);

    // Keeping the button held must not reopen the portal.
    for _ in 0..1000 {
        rig.tick_with_button();
    }
    assert_eq!(rig.net.portal_starts, 1);
}

#[test]
fn saved_credentials_leave_the_portal() {
    let mut rig = Rig::new();
    rig.tick();
    while rig.controller.connectivity_state() != ConnectivityState::ConfigPortal {
        rig.tick_with_button();
        assert!(rig.now_ms <= 10_000, "portal never opened");
    }

    rig.net.portal_event = PortalEvent::CredentialsSaved;
    rig.tick();
    assert_eq!(
        rig.controller.connectivity_state(),
        ConnectivityState::Connected
    );
}

#[test]
fn night_mode_darkens_the_display() {
    let mut rig = Rig::new();
    rig.net.auto_connect_result = true;
    rig.lux = FakeLux(Some(5.0));
    rig.tick();
    rig.tick_until_idle();

    // Every lit pixel's brightest channel stays inside the night envelope.
    let frame = rig.controller.frame();
    let mut lit_pixels = 0;
    for index in 0..84 {
        let pixel = frame[index];
        let peak = pixel.r.max(pixel.g).max(pixel.b);
        if peak > 0 {
            lit_pixels += 1;
            assert!(peak <= 35, "pixel {index} too bright for night mode");
        }
    }
    assert!(lit_pixels > 0);
}
