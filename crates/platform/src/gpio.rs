//! GPIO pin modes and pin handles.
//!
//! A pin is named at compile time as `Pin<F, 'A', 9>`; configuring it
//! enables the port clock, writes the mode fields and returns a
//! [`GpioPin`] that implements the `embedded-hal` digital traits.
//!
//! Modes are one tagged enum, [`PinMode`]. The per-layout bitfields are
//! decoded by two explicit tables:
//!
//! | Mode            | F1 CNF:MODE nibble | MODER | OTYPER | PUPDR |
//! |-----------------|--------------------|-------|--------|-------|
//! | `InAnalog`      | `00:00`            | `11`  | 0      | `00`  |
//! | `InFloat`       | `01:00`            | `00`  | 0      | `00`  |
//! | `InPullDown`    | `10:00` + ODR = 0  | `00`  | 0      | `10`  |
//! | `InPullUp`      | `10:00` + ODR = 1  | `00`  | 0      | `01`  |
//! | `Out(s)`        | `00:s`             | `01`  | 0      | `00`  |
//! | `OutOd(s)`      | `01:s`             | `01`  | 1      | `00`  |
//! | `AltOut(s)`     | `10:s`             | `10`  | 0      | `00`  |
//! | `AltOutOd(s)`   | `11:s`             | `10`  | 1      | `00`  |
//!
//! Output writes go through BSRR, so they never read-modify-write ODR.

#![allow(clippy::arithmetic_side_effects)] // field shifts are bounded by pin < 16

use core::convert::Infallible;
use core::marker::PhantomData;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin, StatefulOutputPin};

use crate::clock::SystemClocks;
use crate::family::{ChipFamily, GpioLayout, PeripheralInfo, Port};
use crate::mmio::{mask, RegisterBus};

/// Output slew rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Speed {
    /// F1: 2 MHz. MODER families: low speed.
    Low,
    /// F1: 10 MHz. MODER families: medium speed.
    Medium,
    /// F1: 50 MHz. MODER families: very high speed.
    High,
}

/// Pin configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinMode {
    /// Analog input.
    InAnalog,
    /// Floating input.
    InFloat,
    /// Input with pull-down.
    InPullDown,
    /// Input with pull-up.
    InPullUp,
    /// Push-pull output.
    Out(Speed),
    /// Open-drain output.
    OutOd(Speed),
    /// Alternate function, push-pull.
    AltOut(Speed),
    /// Alternate function, open-drain.
    AltOutOd(Speed),
}

/// F1 CRL/CRH encoding of a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrlFields {
    /// CNF (bits 3:2) and MODE (bits 1:0).
    pub nibble: u8,
    /// Pull direction for the pulled inputs, selected through ODR.
    pub pull_up: Option<bool>,
}

/// MODER-family encoding of a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModerFields {
    /// MODER (2 bits).
    pub moder: u8,
    /// OTYPER (1 bit).
    pub otype: u8,
    /// OSPEEDR (2 bits).
    pub ospeed: u8,
    /// PUPDR (2 bits).
    pub pupd: u8,
}

const fn crl_speed(speed: Speed) -> u8 {
    match speed {
        Speed::Low => 0b10,
        Speed::Medium => 0b01,
        Speed::High => 0b11,
    }
}

const fn moder_speed(speed: Speed) -> u8 {
    match speed {
        Speed::Low => 0b00,
        Speed::Medium => 0b01,
        Speed::High => 0b11,
    }
}

/// Decode `mode` for the F1 CRL/CRH layout.
pub const fn crl_fields(mode: PinMode) -> CrlFields {
    let (nibble, pull_up) = match mode {
        PinMode::InAnalog => (0b0000, None),
        PinMode::InFloat => (0b0100, None),
        PinMode::InPullDown => (0b1000, Some(false)),
        PinMode::InPullUp => (0b1000, Some(true)),
        PinMode::Out(s) => (crl_speed(s), None),
        PinMode::OutOd(s) => (0b0100 | crl_speed(s), None),
        PinMode::AltOut(s) => (0b1000 | crl_speed(s), None),
        PinMode::AltOutOd(s) => (0b1100 | crl_speed(s), None),
    };
    CrlFields { nibble, pull_up }
}

/// Decode `mode` for the MODER layout.
pub const fn moder_fields(mode: PinMode) -> ModerFields {
    let (moder, otype, speed, pupd) = match mode {
        PinMode::InAnalog => (0b11, 0, None, 0b00),
        PinMode::InFloat => (0b00, 0, None, 0b00),
        PinMode::InPullDown => (0b00, 0, None, 0b10),
        PinMode::InPullUp => (0b00, 0, None, 0b01),
        PinMode::Out(s) => (0b01, 0, Some(s), 0b00),
        PinMode::OutOd(s) => (0b01, 1, Some(s), 0b00),
        PinMode::AltOut(s) => (0b10, 0, Some(s), 0b00),
        PinMode::AltOutOd(s) => (0b10, 1, Some(s), 0b00),
    };
    let ospeed = match speed {
        Some(s) => moder_speed(s),
        None => 0,
    };
    ModerFields {
        moder,
        otype,
        ospeed,
        pupd,
    }
}

/// Register offsets of one GPIO port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PortRegs {
    idr: u32,
    odr: u32,
    bsrr: u32,
}

impl PortRegs {
    const fn of(layout: GpioLayout, base: u32) -> Self {
        match layout {
            GpioLayout::Crl => Self {
                idr: base + 0x08,
                odr: base + 0x0C,
                bsrr: base + 0x10,
            },
            GpioLayout::Moder => Self {
                idr: base + 0x10,
                odr: base + 0x14,
                bsrr: base + 0x18,
            },
        }
    }
}

const CRL: u32 = 0x00;
const CRH: u32 = 0x04;
const MODER: u32 = 0x00;
const OTYPER: u32 = 0x04;
const OSPEEDR: u32 = 0x08;
const PUPDR: u32 = 0x0C;
const AFRL: u32 = 0x20;
const AFRH: u32 = 0x24;

/// Compile-time identity of pin `N` on port `P` of family `F`.
#[derive(Debug, Clone, Copy)]
pub struct Pin<F, const P: char, const N: u8>(PhantomData<F>);

impl<F: ChipFamily, const P: char, const N: u8> Pin<F, P, N> {
    const VALID: () = assert!(N < 16, "GPIO pin number must be below 16");

    /// Port table entry.
    pub const PORT: PeripheralInfo = Port::<F, P>::INFO;

    /// Enable the port clock, program `mode` and alternate function `alt`
    /// (ignored on the F1, where pin remapping lives in AFIO).
    pub fn configure<B: RegisterBus>(
        bus: B,
        _clocks: &SystemClocks,
        mode: PinMode,
        alt: u8,
    ) -> GpioPin<B> {
        let () = Self::VALID;
        let port = Self::PORT;
        bus.set_bit(port.enable.reg, port.enable.bit);
        if let Some(extra) = F::GPIO_EXTRA_ENABLE {
            bus.set_bit(extra.reg, extra.bit);
        }
        let regs = PortRegs::of(F::GPIO_LAYOUT, port.base);

        match F::GPIO_LAYOUT {
            GpioLayout::Crl => {
                let fields = crl_fields(mode);
                let cr = port.base + if N < 8 { CRL } else { CRH };
                let shift = 4 * u32::from(N % 8);
                bus.modify(cr, 0xF << shift, u32::from(fields.nibble) << shift);
                match fields.pull_up {
                    Some(true) => bus.write(regs.bsrr, mask(N)),
                    Some(false) => bus.write(regs.bsrr, mask(N) << 16),
                    None => {}
                }
            }
            GpioLayout::Moder => {
                let fields = moder_fields(mode);
                let afr = port.base + if N < 8 { AFRL } else { AFRH };
                let af_shift = 4 * u32::from(N % 8);
                bus.modify(afr, 0xF << af_shift, u32::from(alt & 0xF) << af_shift);
                let two = 2 * u32::from(N);
                bus.modify(port.base + MODER, 0b11 << two, u32::from(fields.moder) << two);
                bus.modify(port.base + OTYPER, mask(N), u32::from(fields.otype) << N);
                bus.modify(port.base + PUPDR, 0b11 << two, u32::from(fields.pupd) << two);
                bus.modify(port.base + OSPEEDR, 0b11 << two, u32::from(fields.ospeed) << two);
            }
        }

        GpioPin { bus, regs, pin: N }
    }
}

/// A configured pin.
#[derive(Debug, Clone, Copy)]
pub struct GpioPin<B> {
    bus: B,
    regs: PortRegs,
    pin: u8,
}

impl<B: RegisterBus> GpioPin<B> {
    /// Input level.
    pub fn read(&self) -> bool {
        self.bus.read_bit(self.regs.idr, self.pin)
    }

    /// Drive the output high or low (one BSRR write).
    pub fn write(&self, high: bool) {
        let bit = if high { mask(self.pin) } else { mask(self.pin) << 16 };
        self.bus.write(self.regs.bsrr, bit);
    }

    /// Level the output latch is driving.
    pub fn is_driving_high(&self) -> bool {
        self.bus.read_bit(self.regs.odr, self.pin)
    }

    /// Invert the output.
    pub fn toggle(&self) {
        self.write(!self.is_driving_high());
    }

    /// Pin number within its port.
    pub const fn number(&self) -> u8 {
        self.pin
    }
}

impl<B> ErrorType for GpioPin<B> {
    type Error = Infallible;
}

impl<B: RegisterBus> OutputPin for GpioPin<B> {
    fn set_high(&mut self) -> Result<(), Infallible> {
        self.write(true);
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Infallible> {
        self.write(false);
        Ok(())
    }
}

impl<B: RegisterBus> StatefulOutputPin for GpioPin<B> {
    fn is_set_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.is_driving_high())
    }

    fn is_set_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.is_driving_high())
    }

    fn toggle(&mut self) -> Result<(), Infallible> {
        GpioPin::toggle(self);
        Ok(())
    }
}

impl<B: RegisterBus> InputPin for GpioPin<B> {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.read())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.read())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::{full_speed_clock, ClockConfig, ClockTree, PollLimit};
    use crate::family::{Stm32F1, Stm32F4};
    use crate::sim::SimBus;

    fn clocks<C: ClockTree>(bus: &SimBus) -> SystemClocks {
        let config = ClockConfig::<C::Target>::defaults::<C>().with_poll(PollLimit::Spins(8));
        crate::clock::bring_up::<C, _>(bus, &config).unwrap()
    }

    #[test]
    fn moder_table_matches_reference_encoding() {
        assert_eq!(moder_fields(PinMode::InAnalog).moder, 0b11);
        assert_eq!(moder_fields(PinMode::InPullUp).pupd, 0b01);
        assert_eq!(moder_fields(PinMode::InPullDown).pupd, 0b10);
        let af = moder_fields(PinMode::AltOutOd(Speed::High));
        assert_eq!((af.moder, af.otype, af.ospeed), (0b10, 1, 0b11));
    }

    #[test]
    fn crl_table_matches_reference_encoding() {
        assert_eq!(crl_fields(PinMode::InFloat).nibble, 0b0100);
        assert_eq!(crl_fields(PinMode::AltOut(Speed::High)).nibble, 0b1011);
        assert_eq!(crl_fields(PinMode::Out(Speed::Low)).nibble, 0b0010);
        assert_eq!(crl_fields(PinMode::InPullUp).pull_up, Some(true));
        assert_eq!(crl_fields(PinMode::InPullDown).pull_up, Some(false));
    }

    #[test]
    fn f4_alternate_function_before_mode() {
        let bus = SimBus::for_family::<Stm32F4>();
        let clocks = clocks::<Stm32F4>(&bus);
        bus.clear_log();
        let _tx = Pin::<Stm32F4, 'A', 9>::configure(&bus, &clocks, PinMode::AltOut(Speed::High), 7);

        let writes = bus.writes();
        assert_eq!(writes.first(), Some(&(0x4002_3830, 1)));
        let afrh = writes.iter().position(|&(a, _)| a == 0x4002_0024).unwrap();
        let moder = writes.iter().position(|&(a, _)| a == 0x4002_0000).unwrap();
        assert!(afrh < moder);
        assert_eq!(bus.peek(0x4002_0024), 7 << 4);
        assert_eq!(bus.peek(0x4002_0000), 0b10 << 18);
        assert_eq!(bus.peek(0x4002_0008), 0b11 << 18);
    }

    #[test]
    fn f1_pull_up_goes_through_bsrr() {
        let bus = SimBus::for_family::<Stm32F1>();
        let clocks = clocks::<Stm32F1>(&bus);
        let _button = Pin::<Stm32F1, 'C', 13>::configure(&bus, &clocks, PinMode::InPullUp, 0);
        // Port C base 0x4001_1000, CRH nibble 5.
        assert_eq!(bus.peek(0x4001_1004) >> 20 & 0xF, 0b1000);
        assert_eq!(bus.writes_to(0x4001_1010), vec![1 << 13]);
        // IOPC and AFIO clocks.
        assert_eq!(bus.peek(0x4002_1018) & 0b10001, 0b10001);
    }

    #[test]
    fn output_uses_bsrr_without_reading_odr() {
        let bus = SimBus::for_family::<Stm32F4>();
        let clocks = clocks::<Stm32F4>(&bus);
        let mut led = Pin::<Stm32F4, 'D', 12>::configure(&bus, &clocks, PinMode::Out(Speed::Low), 0);
        bus.clear_log();
        led.set_high().unwrap();
        led.set_low().unwrap();
        assert_eq!(
            bus.writes(),
            vec![(0x4002_0C18, 1 << 12), (0x4002_0C18, 1 << 28)]
        );
        assert!(bus.accesses().iter().all(|a| matches!(a, crate::sim::Access::Write { .. })));
    }

    #[test]
    fn input_reads_idr() {
        let bus = SimBus::for_family::<Stm32F4>();
        let clocks = clocks::<Stm32F4>(&bus);
        let mut button = Pin::<Stm32F4, 'A', 0>::configure(&bus, &clocks, PinMode::InPullDown, 0);
        assert!(button.is_low().unwrap());
        bus.poke(0x4002_0010, 1);
        assert!(button.is_high().unwrap());
    }

    #[test]
    fn toggle_follows_output_latch() {
        let bus = SimBus::for_family::<Stm32F4>();
        let clocks = clocks::<Stm32F4>(&bus);
        let mut led = Pin::<Stm32F4, 'B', 7>::configure(&bus, &clocks, PinMode::Out(Speed::Low), 0);
        bus.poke(0x4002_0414, 1 << 7);
        StatefulOutputPin::toggle(&mut led).unwrap();
        assert_eq!(bus.writes_to(0x4002_0418).last(), Some(&(1 << 23)));
        assert!(led.is_set_high().unwrap());
    }

    #[test]
    fn full_speed_clock_gates_pins() {
        let bus = SimBus::for_family::<Stm32F4>();
        let clocks = full_speed_clock::<Stm32F4, _>(&bus).unwrap();
        let pin = Pin::<Stm32F4, 'A', 5>::configure(&bus, &clocks, PinMode::Out(Speed::Medium), 0);
        assert_eq!(pin.number(), 5);
    }
}
