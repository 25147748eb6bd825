//! I2C master bit-banged on two open-drain GPIO pins.
//!
//! SDA only changes while SCL is low, except for START (SDA falls with SCL
//! high) and STOP (SDA rises with SCL high). Every SCL edge is followed by
//! a short spin; the default of [`DEFAULT_HOLD_SPINS`] gives roughly
//! 360 kHz on a 72 MHz F1. Clock stretching by the target is not
//! supported.
//!
//! The byte-level calls ([`I2cBitBang::start`], [`I2cBitBang::write_byte`],
//! [`I2cBitBang::read_byte`], [`I2cBitBang::stop`]) are for drivers that
//! sequence the bus themselves; the [`I2c`] impl builds transactions from
//! them with repeated starts between reads and writes.

#![allow(clippy::arithmetic_side_effects)] // shifts within one byte

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

use crate::gpio::GpioPin;
use crate::mmio::RegisterBus;

/// Spins after each SCL edge.
pub const DEFAULT_HOLD_SPINS: u32 = 5;

/// Bit-banged I2C master.
#[derive(Debug)]
pub struct I2cBitBang<B> {
    sda: GpioPin<B>,
    scl: GpioPin<B>,
    hold_spins: u32,
}

impl<B: RegisterBus> I2cBitBang<B> {
    /// Take over `sda` and `scl`, both configured as open-drain outputs,
    /// and release the bus (both lines high).
    pub fn new(sda: GpioPin<B>, scl: GpioPin<B>) -> Self {
        sda.write(true);
        scl.write(true);
        Self {
            sda,
            scl,
            hold_spins: DEFAULT_HOLD_SPINS,
        }
    }

    /// Spins after each SCL edge; larger is slower.
    #[must_use]
    pub fn with_hold(mut self, spins: u32) -> Self {
        self.hold_spins = spins;
        self
    }

    fn hold(&self) {
        for _ in 0..self.hold_spins {
            core::hint::spin_loop();
        }
    }

    fn scl_high(&self) {
        self.scl.write(true);
        self.hold();
    }

    fn scl_low(&self) {
        self.scl.write(false);
        self.hold();
    }

    /// START (or repeated START), then the address byte for `address`
    /// with the read bit set when `read`. Returns the target's ACK.
    pub fn start(&self, address: u8, read: bool) -> bool {
        self.scl_low();
        self.scl_high();
        self.sda.write(false);
        self.write_byte((address << 1) | u8::from(read))
    }

    /// STOP: SDA rises while SCL is high.
    pub fn stop(&self) {
        self.sda.write(false);
        self.scl_high();
        self.sda.write(true);
    }

    /// Clock out `byte`, MSB first, then sample the ACK bit.
    pub fn write_byte(&self, byte: u8) -> bool {
        self.scl_low();
        for bit in (0..8).rev() {
            self.sda.write(byte & (1 << bit) != 0);
            self.scl_high();
            self.scl_low();
        }
        self.sda.write(true);
        self.scl_high();
        let ack = !self.sda.read();
        self.scl_low();
        ack
    }

    /// Clock in one byte. `last` answers with NACK and ends with STOP;
    /// otherwise the byte is ACKed and the bus stays owned.
    pub fn read_byte(&self, last: bool) -> u8 {
        let byte = self.receive(last);
        if last {
            self.stop();
        }
        byte
    }

    /// One data byte plus the ACK (`nack == false`) or NACK bit, no STOP.
    fn receive(&self, nack: bool) -> u8 {
        let mut byte = 0;
        for _ in 0..8 {
            self.scl_high();
            byte = (byte << 1) | u8::from(self.sda.read());
            self.scl_low();
        }
        self.sda.write(nack);
        self.scl_high();
        self.scl_low();
        if !nack {
            self.sda.write(true);
        }
        byte
    }

    fn run(&self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), ErrorKind> {
        let mut reading = None;
        for index in 0..operations.len() {
            let next_is_read = matches!(operations.get(index + 1), Some(Operation::Read(_)));
            let Some(operation) = operations.get_mut(index) else {
                break;
            };
            let read = matches!(operation, Operation::Read(_));
            if reading != Some(read) && !self.start(address, read) {
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
            }
            reading = Some(read);

            match operation {
                Operation::Write(bytes) => {
                    for &byte in bytes.iter() {
                        if !self.write_byte(byte) {
                            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data));
                        }
                    }
                }
                Operation::Read(buffer) => {
                    let len = buffer.len();
                    for (position, slot) in buffer.iter_mut().enumerate() {
                        let nack = !next_is_read && position + 1 == len;
                        *slot = self.receive(nack);
                    }
                }
            }
        }
        Ok(())
    }

    /// Give the pins back as `(sda, scl)`.
    pub fn release(self) -> (GpioPin<B>, GpioPin<B>) {
        (self.sda, self.scl)
    }
}

impl<B> ErrorType for I2cBitBang<B> {
    type Error = ErrorKind;
}

impl<B: RegisterBus> I2c for I2cBitBang<B> {
    /// A failed ACK ends the transaction with STOP, like a completed one.
    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), ErrorKind> {
        let result = self.run(address, operations);
        self.stop();
        result
    }
}
