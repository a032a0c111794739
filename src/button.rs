//! The provisioning button: an active-low momentary switch with the
//! internal pull-up enabled, level-polled once per tick.

use embassy_rp::Peri;
use embassy_rp::gpio::{Input, Pin, Pull};

pub struct BootButton {
    inner: Input<'static>,
}

impl BootButton {
    #[must_use]
    pub fn new(pin: Peri<'static, impl Pin>) -> Self {
        Self {
            inner: Input::new(pin, Pull::Up),
        }
    }

    /// Active low: pressed pulls the pin to ground.
    #[must_use]
    pub fn is_pressed(&self) -> bool {
        self.inner.is_low()
    }
}
