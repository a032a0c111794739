//! Firmware library for a 4-digit, 84-pixel WS2812 LED clock.
//!
//! The mode and rendering controller lives here and is hardware-free so it
//! can run under host tests; the feature-gated modules wire it to the Pico
//! W's strip, button, light sensor, and Wi-Fi radio.
#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod brightness;
pub mod civil_time;
pub mod connectivity;
pub mod constants;
pub mod controller;
pub mod diagnostics;
mod error;
pub mod fade;
pub mod frame;
pub mod glyph;
pub mod render;

#[cfg(feature = "pico")]
pub mod button;
#[cfg(all(feature = "pico", feature = "bh1750"))]
pub mod light_sensor;
#[cfg(feature = "pico")]
pub mod strip;

#[cfg(feature = "wifi")]
pub mod credentials;
#[cfg(feature = "wifi")]
pub mod net;
#[cfg(feature = "wifi")]
pub mod ntp;

// Re-export commonly used items
pub use brightness::{BrightnessAdapter, LightSensor, NoLightSensor, RenderParams};
pub use civil_time::{CivilTime, SyncError, TimeSyncService, UnixSeconds, WallClock};
pub use connectivity::{
    ButtonHoldTracker, ConnectivityMachine, ConnectivityState, PortalEvent, Provisioner,
};
pub use controller::Controller;
pub use error::{Error, Result};
pub use fade::{FadePhase, FadeSequencer};
pub use frame::{Frame, PixelSink, Rgb, pixel_index};
pub use glyph::Glyph;
