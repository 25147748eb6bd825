//! Peripheral identity model.
//!
//! A chip family is a zero-sized type implementing [`ChipFamily`]: a set of
//! constant tables mapping (peripheral kind, instance) to a base address,
//! clock-enable bit and interrupt line. Handles such as
//! `Usart<Stm32F4, 2>` and `Port<Stm32F1, 'B'>` resolve their entry with
//! an associated constant, so there is no lookup at run time, and an
//! instance the family does not have fails constant evaluation when the
//! handle is used:
//!
//! ```compile_fail
//! use platform::family::{Stm32L0, Usart};
//! // The L0 has two USARTs.
//! let _ = Usart::<Stm32L0, 3>::INFO;
//! ```
//!
//! Tables follow the reference manuals (RM0008, RM0316, RM0090, RM0385,
//! RM0433, RM0367, RM0394).

use core::marker::PhantomData;

use crate::mmio::BitRef;

mod f1;
mod f3;
mod f4;
mod f7;
mod h7;
mod l0;
mod l4;

pub use f1::{F1Speed, Stm32F1};
pub use f3::{F3Speed, Stm32F3};
pub use f4::{F4Speed, Stm32F4};
pub use f7::{F7Speed, Stm32F7};
pub use h7::{H7Speed, Stm32H7};
pub use l0::{L0Speed, Stm32L0};
pub use l4::{L4Speed, Stm32L4};

/// Size of one peripheral register window.
pub const WINDOW: u32 = 0x400;

/// Bus a peripheral's clock is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusDomain {
    /// AHB (GPIO on most families).
    Ahb,
    /// Low-speed APB.
    Apb1,
    /// High-speed APB.
    Apb2,
}

/// Where a peripheral lives and how its clock is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeripheralInfo {
    /// Register block base address.
    pub base: u32,
    /// RCC clock-enable bit.
    pub enable: BitRef,
    /// Clock domain.
    pub bus: BusDomain,
    /// NVIC interrupt line, for peripherals that have one.
    pub irq: Option<u8>,
}

impl PeripheralInfo {
    /// Peripheral without an interrupt line.
    pub const fn new(base: u32, enable: BitRef, bus: BusDomain) -> Self {
        Self {
            base,
            enable,
            bus,
            irq: None,
        }
    }

    /// Same peripheral wired to NVIC line `irq`.
    #[must_use]
    pub const fn with_irq(mut self, irq: u8) -> Self {
        self.irq = Some(irq);
        self
    }

    /// `true` if the register windows of `self` and `other` intersect.
    pub const fn overlaps(&self, other: &PeripheralInfo) -> bool {
        let a_end = self.base.saturating_add(WINDOW);
        let b_end = other.base.saturating_add(WINDOW);
        self.base < b_end && other.base < a_end
    }
}

/// GPIO register layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpioLayout {
    /// F1: CRL/CRH nibbles (CNF + MODE), no alternate function number.
    Crl,
    /// MODER/OTYPER/OSPEEDR/PUPDR/AFR.
    Moder,
}

/// USART register layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsartLayout {
    /// SR/DR/BRR/CR1 (F1, F4).
    V1,
    /// CR1/BRR/ISR/ICR/RDR/TDR (F3, F7, H7, L0, L4).
    V2,
}

/// Constant address map of one chip family.
pub trait ChipFamily: 'static {
    /// Family label for logs.
    const NAME: &'static str;
    /// Reset and clock control block.
    const RCC: u32;
    /// Flash interface block.
    const FLASH: u32;
    /// Power control block.
    const PWR: u32;
    /// GPIO register layout.
    const GPIO_LAYOUT: GpioLayout;
    /// GPIO ports; index 0 is port A.
    const GPIO_PORTS: &'static [PeripheralInfo];
    /// Extra clock that must run for alternate-function pins (F1 AFIO).
    const GPIO_EXTRA_ENABLE: Option<BitRef> = None;
    /// USART register layout.
    const USART_LAYOUT: UsartLayout;
    /// U(S)ART instances; index 0 is USART1.
    const USARTS: &'static [PeripheralInfo];
}

/// Compile-time handle for U(S)ART number `N` (1-based) of family `F`.
#[derive(Debug, Clone, Copy)]
pub struct Usart<F, const N: usize>(PhantomData<F>);

impl<F: ChipFamily, const N: usize> Usart<F, N> {
    /// Table entry; fails to build for an instance `F` does not have.
    #[allow(clippy::indexing_slicing, clippy::arithmetic_side_effects)] // const-evaluated: out of range is a build error
    pub const INFO: PeripheralInfo = F::USARTS[N - 1];
}

/// Compile-time handle for GPIO port `P` (`'A'`, `'B'`, ...) of family `F`.
#[derive(Debug, Clone, Copy)]
pub struct Port<F, const P: char>(PhantomData<F>);

impl<F: ChipFamily, const P: char> Port<F, P> {
    /// Port index, `'A'` = 0.
    #[allow(clippy::arithmetic_side_effects)] // const-evaluated: a letter below 'A' is a build error
    pub const INDEX: usize = (P as u32 - 'A' as u32) as usize;

    /// Table entry; fails to build for a port `F` does not have.
    #[allow(clippy::indexing_slicing)] // const-evaluated: out of range is a build error
    pub const INFO: PeripheralInfo = F::GPIO_PORTS[Self::INDEX];
}

/// `count` GPIO ports from `base`, one window apart, enabled by
/// consecutive bits of `enable_reg` starting at `first_bit`.
#[allow(clippy::arithmetic_side_effects, clippy::cast_possible_truncation)] // const table construction
pub(crate) const fn gpio_ports<const COUNT: usize>(
    base: u32,
    enable_reg: u32,
    first_bit: u8,
    bus: BusDomain,
) -> [PeripheralInfo; COUNT] {
    let mut ports = [PeripheralInfo::new(0, BitRef::new(0, 0), BusDomain::Ahb); COUNT];
    let mut i = 0;
    while i < COUNT {
        ports[i] = PeripheralInfo::new(
            base + WINDOW * i as u32,
            BitRef::new(enable_reg, first_bit + i as u8),
            bus,
        );
        i += 1;
    }
    ports
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::vec::Vec;

    fn all_windows<F: ChipFamily>() -> Vec<PeripheralInfo> {
        let mut all: Vec<PeripheralInfo> = F::GPIO_PORTS.iter().chain(F::USARTS).copied().collect();
        for block in [F::RCC, F::FLASH, F::PWR] {
            all.push(PeripheralInfo::new(block, BitRef::new(0, 0), BusDomain::Ahb));
        }
        all
    }

    fn assert_disjoint<F: ChipFamily>() {
        let all = all_windows::<F>();
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert!(
                    !a.overlaps(b),
                    "{}: {:#010x} overlaps {:#010x}",
                    F::NAME,
                    a.base,
                    b.base
                );
            }
        }
    }

    fn assert_enable_bits_unique<F: ChipFamily>() {
        let all: Vec<PeripheralInfo> = F::GPIO_PORTS.iter().chain(F::USARTS).copied().collect();
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.enable, b.enable, "{}: shared enable bit", F::NAME);
            }
        }
    }

    #[test]
    fn register_windows_never_overlap() {
        assert_disjoint::<Stm32F1>();
        assert_disjoint::<Stm32F3>();
        assert_disjoint::<Stm32F4>();
        assert_disjoint::<Stm32F7>();
        assert_disjoint::<Stm32H7>();
        assert_disjoint::<Stm32L0>();
        assert_disjoint::<Stm32L4>();
    }

    #[test]
    fn enable_bits_are_distinct() {
        assert_enable_bits_unique::<Stm32F1>();
        assert_enable_bits_unique::<Stm32F3>();
        assert_enable_bits_unique::<Stm32F4>();
        assert_enable_bits_unique::<Stm32F7>();
        assert_enable_bits_unique::<Stm32H7>();
        assert_enable_bits_unique::<Stm32L0>();
        assert_enable_bits_unique::<Stm32L4>();
    }

    #[test]
    fn handles_resolve_at_compile_time() {
        const F1_USART2: PeripheralInfo = Usart::<Stm32F1, 2>::INFO;
        assert_eq!(F1_USART2.base, 0x4000_4400);
        assert_eq!(F1_USART2.irq, Some(38));
        assert_eq!(F1_USART2.bus, BusDomain::Apb1);

        assert_eq!(Port::<Stm32F4, 'C'>::INDEX, 2);
        assert_eq!(Port::<Stm32F4, 'C'>::INFO.base, 0x4002_0800);
        assert_eq!(Port::<Stm32F4, 'C'>::INFO.enable, BitRef::new(0x4002_3830, 2));
        assert_eq!(Usart::<Stm32F4, 6>::INFO.irq, Some(71));
    }

    #[test]
    fn every_usart_has_an_interrupt_line() {
        for info in Stm32F1::USARTS
            .iter()
            .chain(Stm32F3::USARTS)
            .chain(Stm32F4::USARTS)
            .chain(Stm32F7::USARTS)
            .chain(Stm32H7::USARTS)
            .chain(Stm32L0::USARTS)
            .chain(Stm32L4::USARTS)
        {
            assert!(info.irq.is_some());
        }
    }

    #[test]
    fn overlap_is_symmetric_and_window_sized() {
        let a = PeripheralInfo::new(0x4000_0000, BitRef::new(0, 0), BusDomain::Apb1);
        let b = PeripheralInfo::new(0x4000_0400, BitRef::new(0, 1), BusDomain::Apb1);
        let c = PeripheralInfo::new(0x4000_03FC, BitRef::new(0, 2), BusDomain::Apb1);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c) && c.overlaps(&a));
        assert!(b.overlaps(&c));
    }
}
