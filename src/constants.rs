//! Shared constants for the clock display and its tick loop.

use embassy_time::Duration;

/// Number of character positions on the display.
pub const CELL_COUNT: usize = 4;
/// Strokes per 7-segment character.
pub const SEGMENTS_PER_CELL: usize = 7;
/// Addressable pixels per stroke.
pub const PIXELS_PER_SEGMENT: usize = 3;
/// Pixels per character cell.
pub const PIXELS_PER_CELL: usize = SEGMENTS_PER_CELL * PIXELS_PER_SEGMENT;
/// Total pixels on the strip.
pub const PIXEL_COUNT: usize = CELL_COUNT * PIXELS_PER_CELL;

/// Upper bound of the daytime brightness envelope, and the saturation
/// value for the fade counter.
pub const BRIGHTNESS_CEILING: u16 = 200;
/// Daytime brightness envelope before lux adjustment.
pub const DAY_MAX_BRIGHTNESS: u8 = 200;
pub const DAY_MIN_BRIGHTNESS: u8 = 80;
/// Fixed low envelope used below the night-mode lux threshold.
pub const NIGHT_MAX_BRIGHTNESS: u8 = 35;
pub const NIGHT_MIN_BRIGHTNESS: u8 = 30;
/// Lux below this flips night mode on.
pub const NIGHT_LUX_THRESHOLD: f32 = 10.0;
/// Sensor readings are clamped to this before mapping.
pub const LUX_CEILING: f32 = 300.0;

/// HSV saturation used for every lit pixel.
pub const PIXEL_SATURATION: u8 = 240;
/// Edge sub-pixels run at this fraction of the center pixel.
pub const EDGE_PIXEL_SCALE: f32 = 0.6;
/// Fixed hue for the configuration-portal letters.
pub const PORTAL_HUE: u8 = 120;
/// Per-tick fade-toward-black amount during fade phases. Zero keeps the
/// previous frame as a static hold through the fade-out window.
pub const FADE_DECAY: u8 = 0;

/// Pause at the end of a normal tick.
pub const TICK_DELAY: Duration = Duration::from_millis(10);
/// Longer pause while the configuration portal is being pumped.
pub const PORTAL_TICK_DELAY: Duration = Duration::from_millis(100);

/// Continuous button hold that triggers the configuration portal.
pub const CONFIG_HOLD_MS: u64 = 5000;
/// How often the fallback mode probes for a restored link.
pub const RECONNECT_PROBE_PERIOD_MS: u64 = 60_000;
/// How often fallback mode rolls a new random number.
pub const FALLBACK_ROLL_PERIOD_MS: u64 = 1000;
/// Period of the diagnostics status line.
pub const STATUS_PERIOD_MS: u64 = 5000;

/// Bounded blocking windows for the network collaborators.
pub const AUTO_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const INITIAL_SYNC_TIMEOUT: Duration = Duration::from_secs(10);
pub const RECONNECT_SYNC_TIMEOUT: Duration = Duration::from_secs(5);

/// SSID announced by the configuration portal.
pub const PORTAL_SSID: &str = "Mini Clock RGB Config";

/// Displayed time runs at this fixed offset from UTC.
pub const UTC_OFFSET_MINUTES: i32 = 60;
