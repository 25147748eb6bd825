//! STM32F3 (RM0316). Same RCC layout as the F1, MODER-style GPIO on AHB
//! and the newer USART block.

#![allow(clippy::arithmetic_side_effects)] // register offsets are compile-time constants

use super::f1::{hse_only_script, hse_pll_script, standby_or_stop, F1_HANDSHAKES, F1_SWITCH};
use super::{gpio_ports, BusDomain, ChipFamily, GpioLayout, PeripheralInfo, UsartLayout};
use crate::clock::{
    ClockError, ClockPlan, ClockTree, Handshake, PowerDownMode, Script, Sequence, SwitchField,
    SystemClocks,
};
use crate::mmio::BitRef;

/// STM32F3 family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stm32F3;

/// Supported STM32F3 system clock speeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum F3Speed {
    /// HSE directly, no PLL.
    Hse8MHz,
    /// HSE through the PLL.
    #[default]
    Pll72MHz,
}

const RCC: u32 = 0x4002_1000;
const RCC_AHBENR: u32 = RCC + 0x14;
const RCC_APB2ENR: u32 = RCC + 0x18;
const RCC_APB1ENR: u32 = RCC + 0x1C;

impl ChipFamily for Stm32F3 {
    const NAME: &'static str = "stm32f3";
    const RCC: u32 = RCC;
    const FLASH: u32 = 0x4002_2000;
    const PWR: u32 = 0x4000_7000;
    const GPIO_LAYOUT: GpioLayout = GpioLayout::Moder;
    const GPIO_PORTS: &'static [PeripheralInfo] =
        &gpio_ports::<6>(0x4800_0000, RCC_AHBENR, 17, BusDomain::Ahb);
    const USART_LAYOUT: UsartLayout = UsartLayout::V2;
    const USARTS: &'static [PeripheralInfo] = &[
        PeripheralInfo::new(0x4001_3800, BitRef::new(RCC_APB2ENR, 14), BusDomain::Apb2).with_irq(37),
        PeripheralInfo::new(0x4000_4400, BitRef::new(RCC_APB1ENR, 17), BusDomain::Apb1).with_irq(38),
        PeripheralInfo::new(0x4000_4800, BitRef::new(RCC_APB1ENR, 18), BusDomain::Apb1).with_irq(39),
        PeripheralInfo::new(0x4000_4C00, BitRef::new(RCC_APB1ENR, 19), BusDomain::Apb1).with_irq(52),
        PeripheralInfo::new(0x4000_5000, BitRef::new(RCC_APB1ENR, 20), BusDomain::Apb1).with_irq(53),
    ];
}

impl ClockTree for Stm32F3 {
    type Target = F3Speed;

    const DEFAULT_XTAL_MHZ: u32 = 8;
    const HANDSHAKES: &'static [Handshake] = F1_HANDSHAKES;
    const SWITCH: SwitchField = F1_SWITCH;

    fn plan(target: F3Speed, xtal_mhz: u32) -> Result<ClockPlan, ClockError> {
        let mut script = Script::new();
        let clocks = match target {
            F3Speed::Hse8MHz => {
                hse_only_script(&mut script, xtal_mhz)?;
                SystemClocks::from_mhz(8, 8, 8, 8)
            }
            F3Speed::Pll72MHz => {
                hse_pll_script(&mut script, 72, xtal_mhz, false)?;
                SystemClocks::from_mhz(72, 72, 36, 72)
            }
        };
        Ok(ClockPlan {
            sequence: script.finish()?,
            clocks,
        })
    }

    fn power_down_sequence(mode: PowerDownMode) -> Result<Sequence, ClockError> {
        let mut script = Script::new();
        standby_or_stop(&mut script, mode);
        script.finish()
    }
}
