//! Polled and interrupt-driven serial channels.
//!
//! [`UsartDev`] is the polled driver: `putc` spins on "transmit data
//! register empty", `getc` spins on "receive data register not empty".
//!
//! [`SerialBuffers`] pairs a `UsartDev` with a receive and a transmit
//! [`RingBuffer`] and splits into two halves:
//!
//! - [`BufferedSerial`], owned by the main flow: `putc` queues a byte and
//!   enables the transmit interrupt, `getc` dequeues a received byte.
//! - [`SerialIrq`], owned by the interrupt handler: [`SerialIrq::on_interrupt`]
//!   moves one received byte into the receive queue (dropping it if the
//!   queue is full) and one queued byte into the data register, disabling
//!   the transmit interrupt once there is nothing left to send.
//!
//! Caller-side spins never hold a critical section, so the handler keeps
//! draining and filling the queues while the caller waits. The only
//! register both sides modify is CR1 (TXEIE); the caller's
//! read-modify-write of it runs inside a critical section.

#![allow(clippy::arithmetic_side_effects)] // register offsets are compile-time constants

use core::convert::Infallible;
use core::fmt;

use crate::clock::SystemClocks;
use crate::family::{ChipFamily, Usart, UsartLayout};
use crate::mmio::{interrupt_free_modify, mask, nvic_enable, BitRef, RegisterBus};
use crate::ring_buffer::{Consumer, Producer, RingBuffer};

/// Default console baud rate.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Serial line settings (8N1 is fixed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SerialConfig {
    /// Baud rate.
    pub baud: u32,
}

impl SerialConfig {
    /// `baud`, 8 data bits, no parity, one stop bit.
    pub const fn new(baud: u32) -> Self {
        Self { baud }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BAUD)
    }
}

const CR1_RE: u8 = 2;
const CR1_TE: u8 = 3;
const CR1_RXNEIE: u8 = 5;
const CR1_TXEIE: u8 = 7;
const CR3_EIE: u8 = 0;
const STATUS_RXNE: u8 = 5;
const STATUS_TXE: u8 = 7;
/// PE | FE | NF | ORE | RXNE.
const ISR_READABLE: u32 = 0x2F;
/// PECF | FECF | NCF | ORECF.
const ICR_ERRORS: u32 = 0x0F;

/// Register addresses of one U(S)ART instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UsartRegs {
    /// Layout these addresses follow.
    pub layout: UsartLayout,
    /// SR (V1) or ISR (V2).
    pub status: u32,
    /// DR (V1) or RDR (V2).
    pub rx_data: u32,
    /// DR (V1) or TDR (V2).
    pub tx_data: u32,
    /// Baud rate register.
    pub brr: u32,
    /// Control register 1.
    pub cr1: u32,
    /// Control register 3.
    pub cr3: u32,
    /// Interrupt flag clear register (V2 only).
    pub icr: Option<u32>,
}

impl UsartRegs {
    /// Addresses of the instance at `base`.
    pub const fn of(layout: UsartLayout, base: u32) -> Self {
        match layout {
            UsartLayout::V1 => Self {
                layout,
                status: base,
                rx_data: base + 0x04,
                tx_data: base + 0x04,
                brr: base + 0x08,
                cr1: base + 0x0C,
                cr3: base + 0x14,
                icr: None,
            },
            UsartLayout::V2 => Self {
                layout,
                status: base + 0x1C,
                rx_data: base + 0x24,
                tx_data: base + 0x28,
                brr: base + 0x0C,
                cr1: base,
                cr3: base + 0x08,
                icr: Some(base + 0x20),
            },
        }
    }

    /// USART enable bit in CR1.
    pub const fn ue(&self) -> BitRef {
        let bit = match self.layout {
            UsartLayout::V1 => 13,
            UsartLayout::V2 => 0,
        };
        BitRef::new(self.cr1, bit)
    }

    /// Receive-not-empty flag.
    pub const fn rxne(&self) -> BitRef {
        BitRef::new(self.status, STATUS_RXNE)
    }

    /// Transmit-empty flag.
    pub const fn txe(&self) -> BitRef {
        BitRef::new(self.status, STATUS_TXE)
    }

    /// Transmit-empty interrupt enable.
    pub const fn txeie(&self) -> BitRef {
        BitRef::new(self.cr1, CR1_TXEIE)
    }

    /// Receive-not-empty interrupt enable.
    pub const fn rxneie(&self) -> BitRef {
        BitRef::new(self.cr1, CR1_RXNEIE)
    }
}

/// BRR for oversampling by 16, rounded to nearest: `(clk + baud / 2) / baud`.
pub const fn brr_for(clock_hz: u32, baud: u32) -> u32 {
    match clock_hz.saturating_add(baud / 2).checked_div(baud) {
        Some(brr) => brr,
        None => 0,
    }
}

/// Polled U(S)ART driver.
#[derive(Debug, Clone)]
pub struct UsartDev<B> {
    bus: B,
    regs: UsartRegs,
    irq: Option<u8>,
    clock_hz: u32,
}

impl<B: RegisterBus> UsartDev<B> {
    /// Enable the clock of U(S)ART `N` of family `F`, program the baud rate
    /// and enable the transmitter and receiver.
    pub fn init<F: ChipFamily, const N: usize>(
        bus: B,
        clocks: &SystemClocks,
        config: &SerialConfig,
    ) -> Self {
        let info = Usart::<F, N>::INFO;
        bus.set_bit(info.enable.reg, info.enable.bit);
        let dev = Self {
            bus,
            regs: UsartRegs::of(F::USART_LAYOUT, info.base),
            irq: info.irq,
            clock_hz: clocks.bus_hz(info.bus),
        };
        dev.baud(config.baud);
        dev.bus
            .write(dev.regs.cr1, dev.regs.ue().mask() | mask(CR1_TE) | mask(CR1_RE));
        dev
    }

    /// Reprogram the baud rate (UE is cleared while BRR changes).
    pub fn baud(&self, baud: u32) {
        let ue = self.regs.ue();
        self.bus.clear_bit(ue.reg, ue.bit);
        self.bus.write(self.regs.brr, brr_for(self.clock_hz, baud));
        self.bus.set_bit(ue.reg, ue.bit);
    }

    /// Transmit data register empty.
    pub fn writable(&self) -> bool {
        let txe = self.regs.txe();
        self.bus.read_bit(txe.reg, txe.bit)
    }

    /// A byte, or a receive error, is pending. On V2 parts error flags
    /// count as readable so that `getc` clears them.
    pub fn readable(&self) -> bool {
        match self.regs.layout {
            UsartLayout::V1 => {
                let rxne = self.regs.rxne();
                self.bus.read_bit(rxne.reg, rxne.bit)
            }
            UsartLayout::V2 => self.bus.read(self.regs.status) & ISR_READABLE != 0,
        }
    }

    /// Write one byte to the data register without waiting.
    pub fn write_byte(&self, byte: u8) {
        self.bus.write(self.regs.tx_data, u32::from(byte));
    }

    /// Read the data register without waiting, clearing error flags.
    #[allow(clippy::cast_possible_truncation)] // data register holds 8 data bits
    pub fn read_byte(&self) -> u8 {
        if let Some(icr) = self.regs.icr {
            self.bus.write(icr, ICR_ERRORS);
        }
        (self.bus.read(self.regs.rx_data) & 0xFF) as u8
    }

    /// Spin until the transmitter is free, then send `byte`.
    pub fn putc(&self, byte: u8) {
        while !self.writable() {
            core::hint::spin_loop();
        }
        self.write_byte(byte);
    }

    /// Spin until a byte arrives, then return it.
    pub fn getc(&self) -> u8 {
        while !self.readable() {
            core::hint::spin_loop();
        }
        self.read_byte()
    }

    /// NVIC line of this instance.
    pub const fn irq(&self) -> Option<u8> {
        self.irq
    }

    /// Register addresses of this instance.
    pub const fn regs(&self) -> &UsartRegs {
        &self.regs
    }

    fn enable_rx_interrupts(&self) {
        interrupt_free_modify(&self.bus, self.regs.cr1, 0, mask(CR1_RXNEIE));
        interrupt_free_modify(&self.bus, self.regs.cr3, 0, mask(CR3_EIE));
    }

    fn enable_tx_interrupt(&self) {
        interrupt_free_modify(&self.bus, self.regs.cr1, 0, mask(CR1_TXEIE));
    }

    /// Interrupt context only: the main flow never runs during the handler.
    fn disable_tx_interrupt_from_isr(&self) {
        self.bus.clear_bit(self.regs.cr1, CR1_TXEIE);
    }
}

impl<B: RegisterBus> fmt::Write for UsartDev<B> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        s.bytes().for_each(|b| self.putc(b));
        Ok(())
    }
}

/// Receive and transmit queues of one buffered channel.
///
/// Each queue holds `N - 1` bytes.
pub struct SerialBuffers<const N: usize> {
    rx: RingBuffer<N>,
    tx: RingBuffer<N>,
}

impl<const N: usize> SerialBuffers<N> {
    /// Empty queues; `const` for use in `static`s.
    pub const fn new() -> Self {
        Self {
            rx: RingBuffer::new(),
            tx: RingBuffer::new(),
        }
    }

    /// Attach `dev` and split into the caller and interrupt halves.
    pub fn split<B: RegisterBus + Clone>(
        &mut self,
        dev: UsartDev<B>,
    ) -> (BufferedSerial<'_, B, N>, SerialIrq<'_, B, N>) {
        let (rx_producer, rx_consumer) = self.rx.split();
        let (tx_producer, tx_consumer) = self.tx.split();
        (
            BufferedSerial {
                dev: dev.clone(),
                rx: rx_consumer,
                tx: tx_producer,
            },
            SerialIrq {
                dev,
                rx: rx_producer,
                tx: tx_consumer,
            },
        )
    }
}

impl<const N: usize> Default for SerialBuffers<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Caller half of a buffered serial channel.
pub struct BufferedSerial<'a, B, const N: usize> {
    dev: UsartDev<B>,
    rx: Consumer<'a, N>,
    tx: Producer<'a, N>,
}

impl<B: RegisterBus, const N: usize> BufferedSerial<'_, B, N> {
    /// Enable the receive and error interrupts and unmask the NVIC line.
    ///
    /// Call after the matching [`SerialIrq`] is installed in the handler.
    pub fn listen(&self) {
        self.dev.enable_rx_interrupts();
        if let Some(irq) = self.dev.irq() {
            nvic_enable(&self.dev.bus, irq);
        }
    }

    /// Queue `byte`, spinning while the transmit queue is full, and
    /// (re-)enable the transmit interrupt.
    pub fn putc(&mut self, byte: u8) {
        while !self.tx.try_put(byte) {
            core::hint::spin_loop();
        }
        self.dev.enable_tx_interrupt();
    }

    /// Queue every byte of `s`.
    pub fn puts(&mut self, s: &str) {
        s.bytes().for_each(|b| self.putc(b));
    }

    /// Spin until a received byte is queued, then return it.
    pub fn getc(&mut self) -> u8 {
        loop {
            if let Some(byte) = self.rx.try_get() {
                return byte;
            }
            core::hint::spin_loop();
        }
    }

    /// A received byte is waiting.
    pub fn readable(&self) -> bool {
        !self.rx.is_empty()
    }

    /// `putc` would not spin.
    pub fn writable(&self) -> bool {
        !self.tx.is_full()
    }

    /// Register addresses of the underlying U(S)ART.
    pub const fn regs(&self) -> &UsartRegs {
        self.dev.regs()
    }

    /// Spin until the interrupt handler has taken every queued byte.
    pub fn flush(&self) {
        while !self.tx.is_empty() {
            core::hint::spin_loop();
        }
    }
}

impl<B, const N: usize> embedded_io::ErrorType for BufferedSerial<'_, B, N> {
    type Error = Infallible;
}

impl<B: RegisterBus, const N: usize> embedded_io::Read for BufferedSerial<'_, B, N> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Infallible> {
        let Some((first, rest)) = buf.split_first_mut() else {
            return Ok(0);
        };
        *first = self.getc();
        let more = rest
            .iter_mut()
            .map_while(|slot| self.rx.try_get().map(|byte| *slot = byte))
            .count();
        Ok(more.saturating_add(1))
    }
}

impl<B: RegisterBus, const N: usize> embedded_io::ReadReady for BufferedSerial<'_, B, N> {
    fn read_ready(&mut self) -> Result<bool, Infallible> {
        Ok(self.readable())
    }
}

impl<B: RegisterBus, const N: usize> embedded_io::Write for BufferedSerial<'_, B, N> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Infallible> {
        buf.iter().for_each(|&b| self.putc(b));
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Infallible> {
        BufferedSerial::flush(self);
        Ok(())
    }
}

impl<B: RegisterBus, const N: usize> embedded_io::WriteReady for BufferedSerial<'_, B, N> {
    fn write_ready(&mut self) -> Result<bool, Infallible> {
        Ok(self.writable())
    }
}

impl<B: RegisterBus, const N: usize> fmt::Write for BufferedSerial<'_, B, N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.puts(s);
        Ok(())
    }
}

/// Interrupt half of a buffered serial channel.
pub struct SerialIrq<'a, B, const N: usize> {
    dev: UsartDev<B>,
    rx: Producer<'a, N>,
    tx: Consumer<'a, N>,
}

impl<B: RegisterBus, const N: usize> SerialIrq<'_, B, N> {
    /// Service one interrupt of this channel.
    pub fn on_interrupt(&mut self) {
        if self.dev.readable() {
            let byte = self.dev.read_byte();
            if !self.rx.try_put(byte) {
                #[cfg(feature = "defmt")]
                defmt::trace!("serial: rx queue full, dropped {=u8:#04x}", byte);
            }
        }
        if self.dev.writable() {
            match self.tx.try_get() {
                Some(byte) => self.dev.write_byte(byte),
                None => self.dev.disable_tx_interrupt_from_isr(),
            }
        }
    }

    /// NVIC line this half must be called from.
    pub const fn irq(&self) -> Option<u8> {
        self.dev.irq()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::{bring_up, ClockConfig, PollLimit};
    use crate::family::{F1Speed, Stm32F1, Stm32F4, Stm32L0};
    use crate::sim::SimBus;

    fn clocks<C: crate::clock::ClockTree>(bus: &SimBus) -> SystemClocks {
        let config = ClockConfig::<C::Target>::defaults::<C>().with_poll(PollLimit::Spins(8));
        bring_up::<C, _>(bus, &config).unwrap()
    }

    #[test]
    fn brr_rounds_to_nearest() {
        assert_eq!(brr_for(72_000_000, 115_200), 625);
        assert_eq!(brr_for(36_000_000, 115_200), 313);
        assert_eq!(brr_for(16_000_000, 9_600), 1667);
        assert_eq!(brr_for(16_000_000, 0), 0);
    }

    #[test]
    fn v1_and_v2_offsets() {
        let v1 = UsartRegs::of(UsartLayout::V1, 0x4001_3800);
        assert_eq!((v1.status, v1.rx_data, v1.brr, v1.cr1), (0x4001_3800, 0x4001_3804, 0x4001_3808, 0x4001_380C));
        assert_eq!(v1.ue(), BitRef::new(0x4001_380C, 13));
        let v2 = UsartRegs::of(UsartLayout::V2, 0x4001_3800);
        assert_eq!((v2.status, v2.rx_data, v2.tx_data), (0x4001_381C, 0x4001_3824, 0x4001_3828));
        assert_eq!(v2.icr, Some(0x4001_3820));
        assert_eq!(v2.ue(), BitRef::new(0x4001_3800, 0));
    }

    #[test]
    fn init_enables_clock_then_baud_then_cr1() {
        let bus = SimBus::for_family::<Stm32F1>();
        let clocks = clocks::<Stm32F1>(&bus);
        bus.clear_log();
        let dev = UsartDev::init::<Stm32F1, 1>(&bus, &clocks, &SerialConfig::default());
        assert_eq!(
            bus.writes(),
            vec![
                (0x4002_1018, 1 << 14),
                (0x4001_380C, 0),
                (0x4001_3808, 625),
                (0x4001_380C, 1 << 13),
                (0x4001_380C, (1 << 13) | (1 << 3) | (1 << 2)),
            ]
        );
        assert_eq!(dev.irq(), Some(37));
    }

    #[test]
    fn apb1_instance_uses_pclk1() {
        let bus = SimBus::for_family::<Stm32F1>();
        let config = ClockConfig::new(F1Speed::Pll72MHz, 8);
        let clocks = bring_up::<Stm32F1, _>(&bus, &config).unwrap();
        let _dev = UsartDev::init::<Stm32F1, 2>(&bus, &clocks, &SerialConfig::default());
        assert_eq!(bus.peek(0x4000_4408), 313);
    }

    #[test]
    fn v2_getc_clears_error_flags() {
        let bus = SimBus::for_family::<Stm32L0>();
        let clocks = clocks::<Stm32L0>(&bus);
        let dev = UsartDev::init::<Stm32L0, 2>(&bus, &clocks, &SerialConfig::new(9_600));
        bus.poke(0x4000_441C, 1 << 3); // ORE without RXNE
        bus.poke(0x4000_4424, u32::from(b'z'));
        assert!(dev.readable());
        assert_eq!(dev.getc(), b'z');
        assert_eq!(bus.writes_to(0x4000_4420), vec![0x0F]);
    }

    #[test]
    fn polled_putc_waits_for_txe() {
        let bus = SimBus::for_family::<Stm32F4>();
        let clocks = clocks::<Stm32F4>(&bus);
        let mut dev = UsartDev::init::<Stm32F4, 2>(&bus, &clocks, &SerialConfig::default());
        bus.poke_bit(0x4000_4400, STATUS_TXE, true);
        fmt::Write::write_str(&mut dev, "ok").unwrap();
        assert_eq!(bus.writes_to(0x4000_4404), vec![u32::from(b'o'), u32::from(b'k')]);
    }
}
