//! Bring-up firmware - Main Entry Point
//!
//! Hardware-only entry point: boots the selected chip, then echoes the
//! console, printing the uptime and toggling the status LED on each line.

#![no_std]
#![no_main]

use core::fmt::Write as _;

use cortex_m_rt::entry;
use static_cell::StaticCell;

use firmware::boot::{self, CONSOLE_QUEUE};
use firmware::Chip;
use platform::mmio::Mmio;
use platform::serial::SerialBuffers;
use platform::{tick, ChipFamily};

// Logging transport + panic handler
use defmt_rtt as _;
use panic_probe as _;

mod exception_handlers;

static BUFFERS: StaticCell<SerialBuffers<CONSOLE_QUEUE>> = StaticCell::new();

#[entry]
fn main() -> ! {
    defmt::info!("{=str} bring-up firmware v{=str}", Chip::NAME, env!("CARGO_PKG_VERSION"));

    // SAFETY: the chip feature selects both `Chip` and memory.x, so this
    // binary only runs on silicon whose register map `Chip` describes.
    let bus = unsafe { Mmio::new() };
    let console = match boot::bring_up::<Chip, _, CONSOLE_QUEUE>(bus, BUFFERS.init(SerialBuffers::new())) {
        Ok(console) => console,
        Err(e) => defmt::panic!("clock bring-up failed: {}", e),
    };
    let sysclk = console.clocks.sysclk_hz();
    let (mut serial, led) = console.start(&exception_handlers::CONSOLE_IRQ);

    // Console writes are infallible; `fmt::Error` can only come from Display impls.
    let _ = write!(serial, "\r\n{} up, sysclk {} Hz\r\n> ", Chip::NAME, sysclk);
    loop {
        match serial.getc() {
            b'\r' | b'\n' => {
                led.toggle();
                let _ = write!(serial, "\r\n[{} ms] > ", tick::millis());
            }
            byte => serial.putc(byte),
        }
    }
}
