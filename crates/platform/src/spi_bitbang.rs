//! SPI master bit-banged on four GPIO pins.
//!
//! Mode 0, MSB first: each bit drives MOSI, raises SCK, samples MISO and
//! lowers SCK. There is no delay between edges, so SCK runs as fast as the
//! pin writes go.
//!
//! NSS belongs to the caller: [`SpiBitBang::select`], [`SpiBitBang::deselect`]
//! and [`SpiBitBang::rw_reg`] drive it, the [`SpiBus`] impl never does.

#![allow(clippy::arithmetic_side_effects)] // shifts within one byte

use core::convert::Infallible;

use embedded_hal::spi::{ErrorType, SpiBus};

use crate::gpio::GpioPin;
use crate::mmio::RegisterBus;

/// Byte clocked out while only reading.
pub const READ_FILL: u8 = 0x00;

/// Bit-banged SPI master.
#[derive(Debug)]
pub struct SpiBitBang<B> {
    mosi: GpioPin<B>,
    miso: GpioPin<B>,
    sck: GpioPin<B>,
    nss: GpioPin<B>,
}

impl<B: RegisterBus> SpiBitBang<B> {
    /// Take over configured pins: `mosi`, `sck` and `nss` as push-pull
    /// outputs, `miso` as an input. Leaves the device deselected, SCK low.
    pub fn new(mosi: GpioPin<B>, miso: GpioPin<B>, sck: GpioPin<B>, nss: GpioPin<B>) -> Self {
        nss.write(true);
        sck.write(false);
        Self {
            mosi,
            miso,
            sck,
            nss,
        }
    }

    /// Pull NSS low.
    pub fn select(&self) {
        self.nss.write(false);
    }

    /// Release NSS.
    pub fn deselect(&self) {
        self.nss.write(true);
    }

    /// Shift `out` onto MOSI while shifting the byte on MISO in.
    pub fn transfer_byte(&self, out: u8) -> u8 {
        let mut shift = out;
        for _ in 0..8 {
            self.mosi.write(shift & 0x80 != 0);
            self.sck.write(true);
            shift = (shift << 1) | u8::from(self.miso.read());
            self.sck.write(false);
        }
        shift
    }

    /// Register access in one select cycle: send `cmd`, then exchange
    /// `value`. Returns the byte received during `value`.
    pub fn rw_reg(&self, cmd: u8, value: u8) -> u8 {
        self.select();
        self.transfer_byte(cmd);
        let reply = self.transfer_byte(value);
        self.deselect();
        reply
    }

    /// Give the pins back as `(mosi, miso, sck, nss)`.
    pub fn release(self) -> (GpioPin<B>, GpioPin<B>, GpioPin<B>, GpioPin<B>) {
        (self.mosi, self.miso, self.sck, self.nss)
    }
}

impl<B> ErrorType for SpiBitBang<B> {
    type Error = Infallible;
}

impl<B: RegisterBus> SpiBus for SpiBitBang<B> {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Infallible> {
        for word in words.iter_mut() {
            *word = self.transfer_byte(READ_FILL);
        }
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Infallible> {
        for &word in words {
            self.transfer_byte(word);
        }
        Ok(())
    }

    /// Clocks `max(read.len(), write.len())` bytes; missing output bytes
    /// are [`READ_FILL`], surplus input bytes are dropped.
    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Infallible> {
        for index in 0..read.len().max(write.len()) {
            let received = self.transfer_byte(write.get(index).copied().unwrap_or(READ_FILL));
            if let Some(slot) = read.get_mut(index) {
                *slot = received;
            }
        }
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Infallible> {
        for word in words.iter_mut() {
            *word = self.transfer_byte(*word);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}
