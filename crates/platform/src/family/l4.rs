//! STM32L4 (RM0394).

#![allow(clippy::arithmetic_side_effects)] // register offsets are compile-time constants

use super::{gpio_ports, BusDomain, ChipFamily, GpioLayout, PeripheralInfo, UsartLayout};
use crate::clock::{
    ClockError, ClockPlan, ClockTree, Handshake, PowerDownMode, Script, Sequence, Stage,
    SwitchField, SystemClocks,
};
use crate::mmio::BitRef;

/// STM32L4 family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stm32L4;

/// Supported STM32L4 system clock speeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum L4Speed {
    /// HSI16 × 10 / 2 through the PLL.
    #[default]
    Mhz80,
}

const RCC: u32 = 0x4002_1000;
const RCC_CR: u32 = RCC;
const RCC_CFGR: u32 = RCC + 0x08;
const RCC_PLLCFGR: u32 = RCC + 0x0C;
const RCC_AHB2ENR: u32 = RCC + 0x4C;
const RCC_APB1ENR1: u32 = RCC + 0x58;
const RCC_APB2ENR: u32 = RCC + 0x60;
const FLASH: u32 = 0x4002_2000;
const FLASH_ACR: u32 = FLASH;
const PWR: u32 = 0x4000_7000;
const PWR_CR1: u32 = PWR;
const PWR_SCR: u32 = PWR + 0x18;

const HSI16: Handshake = Handshake::in_register(RCC_CR, 8, 10);
const PLL: Handshake = Handshake::in_register(RCC_CR, 24, 25);
const SWITCH: SwitchField = SwitchField {
    reg: RCC_CFGR,
    request_shift: 0,
    status_shift: 2,
    width: 2,
};

const SW_PLL: u32 = 0b11;

/// Four wait states, prefetch, instruction and data caches.
const ACR_4WS: u32 = 0x704;
/// PLLREN, PLLN = 10, PLLM = /1, PLLR = /2, PLLSRC = HSI16.
const PLLCFGR_80MHZ: u32 = (1 << 24) | (10 << 8) | 0b10;

const PWREN: BitRef = BitRef::new(RCC_APB1ENR1, 28);
/// VOS range 1.
const CR1_VOS_RANGE1: u32 = 0b01 << 9;
const CR1_LPMS_STANDBY: u32 = 0b011;
const CR1_LPMS_STOP1: u32 = 0b001;
/// Clear all wake-up flags.
const SCR_CLEAR_WAKEUP: u32 = 0b1_1111;

impl ChipFamily for Stm32L4 {
    const NAME: &'static str = "stm32l4";
    const RCC: u32 = RCC;
    const FLASH: u32 = FLASH;
    const PWR: u32 = PWR;
    const GPIO_LAYOUT: GpioLayout = GpioLayout::Moder;
    const GPIO_PORTS: &'static [PeripheralInfo] =
        &gpio_ports::<5>(0x4800_0000, RCC_AHB2ENR, 0, BusDomain::Ahb);
    const USART_LAYOUT: UsartLayout = UsartLayout::V2;
    const USARTS: &'static [PeripheralInfo] = &[
        PeripheralInfo::new(0x4001_3800, BitRef::new(RCC_APB2ENR, 14), BusDomain::Apb2).with_irq(37),
        PeripheralInfo::new(0x4000_4400, BitRef::new(RCC_APB1ENR1, 17), BusDomain::Apb1).with_irq(38),
        PeripheralInfo::new(0x4000_4800, BitRef::new(RCC_APB1ENR1, 18), BusDomain::Apb1).with_irq(39),
    ];
}

impl ClockTree for Stm32L4 {
    type Target = L4Speed;

    /// Unused: the plan runs from HSI16.
    const DEFAULT_XTAL_MHZ: u32 = 0;
    const HANDSHAKES: &'static [Handshake] = &[HSI16, PLL];
    const SWITCH: SwitchField = SWITCH;

    fn plan(target: L4Speed, _xtal_mhz: u32) -> Result<ClockPlan, ClockError> {
        let L4Speed::Mhz80 = target;
        let mut script = Script::new();
        script.stage(Stage::FlashLatency).write(FLASH_ACR, ACR_4WS);
        script.stage(Stage::Oscillator).handshake(HSI16);
        script
            .stage(Stage::Pll)
            .write(RCC_PLLCFGR, PLLCFGR_80MHZ)
            .handshake(PLL);
        script
            .stage(Stage::Switch)
            .write(RCC_CFGR, SW_PLL)
            .await_switch(SWITCH, SW_PLL);
        Ok(ClockPlan {
            sequence: script.finish()?,
            clocks: SystemClocks::from_mhz(80, 80, 80, 80),
        })
    }

    fn power_down_sequence(mode: PowerDownMode) -> Result<Sequence, ClockError> {
        let lpms = match mode {
            PowerDownMode::Standby => CR1_LPMS_STANDBY,
            PowerDownMode::Stop => CR1_LPMS_STOP1,
        };
        let mut script = Script::new();
        script
            .stage(Stage::PowerDown)
            .set(PWREN)
            .write(PWR_CR1, CR1_VOS_RANGE1 | lpms)
            .write(PWR_SCR, SCR_CLEAR_WAKEUP)
            .deep_sleep();
        script.finish()
    }
}
