//! STM32F7 (RM0385). RCC, PWR and flash interface at the F4 addresses; the
//! USART block is the newer ISR/ICR layout. 216 MHz always runs with the
//! over-drive regulator.

#![allow(clippy::arithmetic_side_effects)] // register offsets are compile-time constants

use super::f4::{
    hse_pll_script, pll_input_divider, standby_or_stop, F4_AHB1ENR, F4_FLASH, F4_HANDSHAKES,
    F4_PWR, F4_RCC, F4_SWITCH, F4_USARTS, OVER_DRIVE_ABOVE_MHZ,
};
use super::{gpio_ports, BusDomain, ChipFamily, GpioLayout, PeripheralInfo, UsartLayout};
use crate::clock::{
    ClockError, ClockPlan, ClockTree, Handshake, PowerDownMode, Script, Sequence, SwitchField,
    SystemClocks,
};

/// STM32F7 family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stm32F7;

/// Supported STM32F7 system clock speeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum F7Speed {
    /// HSE through the PLL: VCO 432 MHz, PLLP /2.
    #[default]
    Mhz216,
}

/// PLLQ /8 (USB/SDMMC 54 MHz), HSE source, PLLN 432, PLLP /2.
const PLLCFGR_216MHZ: u32 = (8 << 24) | (1 << 22) | (432 << 6);

impl ChipFamily for Stm32F7 {
    const NAME: &'static str = "stm32f7";
    const RCC: u32 = F4_RCC;
    const FLASH: u32 = F4_FLASH;
    const PWR: u32 = F4_PWR;
    const GPIO_LAYOUT: GpioLayout = GpioLayout::Moder;
    const GPIO_PORTS: &'static [PeripheralInfo] =
        &gpio_ports::<11>(0x4002_0000, F4_AHB1ENR, 0, BusDomain::Ahb);
    const USART_LAYOUT: UsartLayout = UsartLayout::V2;
    const USARTS: &'static [PeripheralInfo] = F4_USARTS;
}

impl ClockTree for Stm32F7 {
    type Target = F7Speed;

    const DEFAULT_XTAL_MHZ: u32 = 25;
    const HANDSHAKES: &'static [Handshake] = F4_HANDSHAKES;
    const SWITCH: SwitchField = F4_SWITCH;

    fn plan(target: F7Speed, xtal_mhz: u32) -> Result<ClockPlan, ClockError> {
        let F7Speed::Mhz216 = target;
        let mut script = Script::new();
        // Seven wait states, prefetch and ART accelerator.
        hse_pll_script(
            &mut script,
            0x307,
            PLLCFGR_216MHZ | pll_input_divider(xtal_mhz)?,
            216 > OVER_DRIVE_ABOVE_MHZ,
        );
        Ok(ClockPlan {
            sequence: script.finish()?,
            clocks: SystemClocks::from_mhz(216, 216, 54, 108),
        })
    }

    fn power_down_sequence(mode: PowerDownMode) -> Result<Sequence, ClockError> {
        let mut script = Script::new();
        standby_or_stop(&mut script, mode);
        script.finish()
    }
}
