//! PIO-driven WS2812 output for the 84-pixel clock chain.
//!
//! The CYW43 radio owns PIO0, so the strip runs on PIO1/SM0. A current
//! budget caps the worst-case brightness at commit time.

use embassy_rp::Peri;
use embassy_rp::bind_interrupts;
use embassy_rp::clocks::clk_sys_freq;
use embassy_rp::peripherals::PIO1;
use embassy_rp::pio::program::{Assembler, JmpCondition, OutDestination, SetDestination, SideSet};
use embassy_rp::pio::{
    Config, FifoJoin, InterruptHandler, Pio, PioPin, ShiftConfig, ShiftDirection, StateMachine,
};
use embassy_rp::pio_programs::ws2812::{Grb, RgbColorOrder};
use embassy_time::{Duration, Timer};
use fixed::types::U24F8;

use crate::constants::PIXEL_COUNT;
use crate::frame::{Frame, PixelSink, Rgb};

bind_interrupts!(struct Irqs {
    PIO1_IRQ_0 => InterruptHandler<PIO1>;
});

// WS2812 bit timing in PIO cycles.
const T1: u8 = 2;
const T2: u8 = 5;
const T3: u8 = 3;
const CYCLES_PER_BIT: u32 = (T1 + T2 + T3) as u32;
const RESET_DELAY_US: u64 = 55;

/// Current budget for the strip, in milliamps.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct Milliamps(pub u16);

/// Worst-case-white brightness cap for the given supply budget, assuming
/// the usual 60 mA per LED at full white.
fn brightness_cap(max_current: Milliamps) -> u8 {
    #[expect(
        clippy::arithmetic_side_effects,
        reason = "u64 math on values far below overflow"
    )]
    let cap = (u64::from(max_current.0) * 255) / (PIXEL_COUNT as u64 * 60);
    if cap >= 255 {
        255
    } else {
        #[expect(clippy::cast_possible_truncation, reason = "bounded above by 255")]
        let cap = cap as u8;
        cap
    }
}

#[expect(
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation,
    reason = "u16 product of two u8 values divided by 255 fits u8"
)]
fn scale_channel(value: u8, cap: u8) -> u8 {
    ((u16::from(value) * u16::from(cap)) / 255) as u8
}

/// The physical pixel sink: one WS2812 chain on PIO1.
pub struct ClockStrip {
    sm: StateMachine<'static, PIO1, 0>,
    cap: u8,
}

impl ClockStrip {
    /// Claim PIO1, load the WS2812 program, and start the state machine.
    /// The strip begins blanked.
    pub async fn new(
        pio: Peri<'static, PIO1>,
        pin: Peri<'static, impl PioPin>,
        max_current: Milliamps,
    ) -> Self {
        let Pio {
            mut common, sm0, ..
        } = Pio::new(pio, Irqs);

        let side_set = SideSet::new(false, 1, false);
        let mut assembler: Assembler<32> = Assembler::new_with_side_set(side_set);
        let mut wrap_target = assembler.label();
        let mut wrap_source = assembler.label();
        let mut do_zero = assembler.label();
        assembler.set_with_side_set(SetDestination::PINDIRS, 1, 0);
        assembler.bind(&mut wrap_target);
        assembler.out_with_delay_and_side_set(OutDestination::X, 1, T3 - 1, 0);
        assembler.jmp_with_delay_and_side_set(JmpCondition::XIsZero, &mut do_zero, T1 - 1, 1);
        assembler.jmp_with_delay_and_side_set(JmpCondition::Always, &mut wrap_target, T2 - 1, 1);
        assembler.bind(&mut do_zero);
        assembler.nop_with_delay_and_side_set(T2 - 1, 0);
        assembler.bind(&mut wrap_source);
        let program = assembler.assemble_with_wrap(wrap_source, wrap_target);
        let program = common.load_program(&program);

        let mut config = Config::default();
        let out_pin = common.make_pio_pin(pin);
        config.set_out_pins(&[&out_pin]);
        config.set_set_pins(&[&out_pin]);
        config.use_program(&program, &[&out_pin]);

        let clock_freq = U24F8::from_num(clk_sys_freq() / 1000);
        let ws2812_freq = U24F8::from_num(800);
        config.clock_divider = clock_freq / (ws2812_freq * CYCLES_PER_BIT);

        config.fifo_join = FifoJoin::TxOnly;
        config.shift_out = ShiftConfig {
            auto_fill: true,
            threshold: 24,
            direction: ShiftDirection::Left,
        };

        let mut sm = sm0;
        sm.set_config(&config);
        sm.set_enable(true);

        let mut strip = Self {
            sm,
            cap: brightness_cap(max_current),
        };
        strip.write(&[Rgb::new(0, 0, 0); PIXEL_COUNT]).await;
        strip
    }

    async fn write(&mut self, pixels: &[Rgb; PIXEL_COUNT]) {
        let tx = self.sm.tx();
        for pixel in pixels {
            let scaled = Rgb::new(
                scale_channel(pixel.r, self.cap),
                scale_channel(pixel.g, self.cap),
                scale_channel(pixel.b, self.cap),
            );
            tx.wait_push(Grb::pack(scaled)).await;
        }
        Timer::after(Duration::from_micros(RESET_DELAY_US)).await;
    }
}

impl PixelSink for ClockStrip {
    async fn commit(&mut self, frame: &Frame) {
        self.write(frame.pixels()).await;
    }
}
