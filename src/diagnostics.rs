//! Periodic status line. Read-only over render state and never blocks the
//! render path; it just counts committed frames and logs on a fixed period.

use crate::brightness::BrightnessAdapter;
use crate::connectivity::ConnectivityState;
use crate::constants::STATUS_PERIOD_MS;
use crate::fade::FadeSequencer;
use crate::frame::Frame;

/// Emits one human-readable status line every few seconds.
#[derive(Debug, Default)]
pub struct StatusReporter {
    last_report_ms: Option<u64>,
    frames: u32,
}

impl StatusReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once per committed frame.
    pub fn frame_committed(&mut self) {
        self.frames = self.frames.saturating_add(1);
    }

    /// Log the status line if the reporting period has elapsed. Returns
    /// whether a line was emitted.
    pub fn maybe_report(
        &mut self,
        now_ms: u64,
        frame: &Frame,
        brightness: &BrightnessAdapter,
        fade: &FadeSequencer,
        connectivity: ConnectivityState,
        lux: Option<f32>,
    ) -> bool {
        let Some(last) = self.last_report_ms else {
            self.last_report_ms = Some(now_ms);
            return false;
        };
        let elapsed_ms = now_ms.saturating_sub(last);
        if elapsed_ms < STATUS_PERIOD_MS {
            return false;
        }
        let fps = frames_per_second(self.frames, elapsed_ms);
        info!(
            "status: fps={} brightness={} lux_adjustment={} night_mode={} fade={} avg_brightness={} connectivity={} lux={}",
            fps,
            fade.global_brightness(),
            brightness.lux_adjustment(),
            brightness.night_mode(),
            fade.phase(),
            frame.average_lit_brightness(),
            connectivity,
            lux,
        );
        self.last_report_ms = Some(now_ms);
        self.frames = 0;
        true
    }
}

fn frames_per_second(frames: u32, elapsed_ms: u64) -> u32 {
    if elapsed_ms == 0 {
        return 0;
    }
    let scaled = u64::from(frames).saturating_mul(1000);
    #[expect(clippy::cast_possible_truncation, reason = "fps is small")]
    let fps = (scaled / elapsed_ms) as u32;
    fps
}
