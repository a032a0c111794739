//! Pico W entry point: wire the strip, button, light sensor, and radio to
//! the tick loop.
#![no_std]
#![no_main]
#![allow(clippy::future_not_send, reason = "single-threaded")]

use core::convert::Infallible;

use defmt::info;
#[cfg(feature = "bh1750")]
use defmt::warn;
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_time::{Instant, Timer};
use miniclock::credentials::CredentialStore;
use miniclock::net::PicoWifi;
use miniclock::ntp::NtpClient;
use miniclock::strip::{ClockStrip, Milliamps};
use miniclock::{Controller, Result, button::BootButton};
use panic_probe as _;

#[cfg(feature = "bh1750")]
use embassy_rp::peripherals::I2C0;

#[cfg(feature = "bh1750")]
embassy_rp::bind_interrupts!(struct I2cIrqs {
    I2C0_IRQ => embassy_rp::i2c::InterruptHandler<I2C0>;
});

#[embassy_executor::main]
pub async fn main(spawner: Spawner) -> ! {
    let err = inner_main(spawner).await.unwrap_err();
    core::panic!("{err}");
}

async fn inner_main(spawner: Spawner) -> Result<Infallible> {
    info!("Starting the clock");
    let peripherals = embassy_rp::init(Default::default());

    let store = CredentialStore::new(peripherals.FLASH);

    // PIO0 drives the radio, so the strip takes PIO1.
    let mut strip = ClockStrip::new(
        peripherals.PIO1,
        peripherals.PIN_2, // strip data
        Milliamps(1500),
    )
    .await;

    let button = BootButton::new(peripherals.PIN_13);

    let mut wifi = PicoWifi::new(
        spawner,
        peripherals.PIN_23,  // CYW43 power
        peripherals.PIN_25,  // CYW43 chip select
        peripherals.PIO0,    // CYW43 PIO interface
        peripherals.PIN_24,  // CYW43 clock
        peripherals.PIN_29,  // CYW43 data
        peripherals.DMA_CH0, // CYW43 DMA channel
        store,
    )
    .await?;

    let mut time_sync = NtpClient::new(wifi.stack());

    #[cfg(feature = "bh1750")]
    let mut light = {
        let i2c = embassy_rp::i2c::I2c::new_async(
            peripherals.I2C0,
            peripherals.PIN_5, // SCL
            peripherals.PIN_4, // SDA
            I2cIrqs,
            embassy_rp::i2c::Config::default(),
        );
        match miniclock::light_sensor::Bh1750::new(i2c).await {
            Ok(sensor) => {
                info!("BH1750 light sensor initialized");
                Some(sensor)
            }
            Err(err) => {
                warn!("Light sensor unavailable: {}", defmt::Debug2Format(&err));
                None
            }
        }
    };
    #[cfg(not(feature = "bh1750"))]
    let mut light = miniclock::NoLightSensor;

    let mut controller = Controller::new(Instant::now().as_ticks());

    loop {
        let delay = controller
            .tick(
                Instant::now().as_millis(),
                button.is_pressed(),
                &mut wifi,
                &mut time_sync,
                &mut light,
                &mut strip,
            )
            .await;
        Timer::after(delay).await;
    }
}
