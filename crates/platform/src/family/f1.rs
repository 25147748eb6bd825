//! STM32F1 (RM0008).

#![allow(clippy::arithmetic_side_effects)] // register offsets are compile-time constants

use super::{gpio_ports, BusDomain, ChipFamily, GpioLayout, PeripheralInfo, UsartLayout};
use crate::clock::{
    ClockError, ClockPlan, ClockTree, Handshake, PowerDownMode, Script, Sequence, Stage,
    SwitchField, SystemClocks,
};
use crate::mmio::BitRef;

/// STM32F1 family (connectivity, performance and value lines).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stm32F1;

/// Supported STM32F1 system clock speeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum F1Speed {
    /// HSE directly, no PLL.
    Hse8MHz,
    /// HSE through the PLL.
    #[default]
    Pll72MHz,
}

const RCC: u32 = 0x4002_1000;
const RCC_CR: u32 = RCC;
const RCC_CFGR: u32 = RCC + 0x04;
const RCC_APB2ENR: u32 = RCC + 0x18;
const RCC_APB1ENR: u32 = RCC + 0x1C;
const FLASH: u32 = 0x4002_2000;
const FLASH_ACR: u32 = FLASH;
const PWR: u32 = 0x4000_7000;
const PWR_CR: u32 = PWR;

const HSE: Handshake = Handshake::in_register(RCC_CR, 16, 17);
const PLL: Handshake = Handshake::in_register(RCC_CR, 24, 25);
const SWITCH: SwitchField = SwitchField {
    reg: RCC_CFGR,
    request_shift: 0,
    status_shift: 2,
    width: 2,
};

const SW_HSE: u32 = 0b01;
const SW_PLL: u32 = 0b10;

/// Flash: two wait states, prefetch buffer on.
const ACR_72MHZ: u32 = 0x12;
/// Flash: zero wait states, prefetch buffer on.
const ACR_8MHZ: u32 = 0x10;

const CFGR_PLLSRC_HSE: u32 = 1 << 16;
const CFGR_PLLMUL_SHIFT: u32 = 18;
const CFGR_PPRE1_DIV2: u32 = 0b100 << 8;
const CFGR_PPRE1_MASK: u32 = 0b111 << 8;
const CFGR_ADCPRE_DIV6: u32 = 0b10 << 14;
const CFGR_ADCPRE_MASK: u32 = 0b11 << 14;

const PWREN: BitRef = BitRef::new(RCC_APB1ENR, 28);
const PDDS: BitRef = BitRef::new(PWR_CR, 1);

impl ChipFamily for Stm32F1 {
    const NAME: &'static str = "stm32f1";
    const RCC: u32 = RCC;
    const FLASH: u32 = FLASH;
    const PWR: u32 = PWR;
    const GPIO_LAYOUT: GpioLayout = GpioLayout::Crl;
    const GPIO_PORTS: &'static [PeripheralInfo] =
        &gpio_ports::<5>(0x4001_0800, RCC_APB2ENR, 2, BusDomain::Apb2);
    const GPIO_EXTRA_ENABLE: Option<BitRef> = Some(BitRef::new(RCC_APB2ENR, 0));
    const USART_LAYOUT: UsartLayout = UsartLayout::V1;
    const USARTS: &'static [PeripheralInfo] = &[
        PeripheralInfo::new(0x4001_3800, BitRef::new(RCC_APB2ENR, 14), BusDomain::Apb2).with_irq(37),
        PeripheralInfo::new(0x4000_4400, BitRef::new(RCC_APB1ENR, 17), BusDomain::Apb1).with_irq(38),
        PeripheralInfo::new(0x4000_4800, BitRef::new(RCC_APB1ENR, 18), BusDomain::Apb1).with_irq(39),
    ];
}

/// PLLMUL field for `sysclk / xtal`; the field encodes ×2..×16 as 0..14.
pub(super) fn pll_multiplier(sysclk_mhz: u32, xtal_mhz: u32) -> Result<u32, ClockError> {
    let unsupported = ClockError::UnsupportedCrystal { xtal_mhz };
    let factor = sysclk_mhz.checked_div(xtal_mhz).ok_or(unsupported)?;
    if factor.checked_mul(xtal_mhz) != Some(sysclk_mhz) || !(2..=16).contains(&factor) {
        return Err(unsupported);
    }
    Ok(factor - 2)
}

/// Shared HSE → PLL script of the F1/F3 clock tree (same RCC layout).
pub(super) fn hse_pll_script(
    script: &mut Script,
    sysclk_mhz: u32,
    xtal_mhz: u32,
    adc_prescaler: bool,
) -> Result<(), ClockError> {
    let multiplier = pll_multiplier(sysclk_mhz, xtal_mhz)?;
    let (prescaler_mask, prescaler) = if adc_prescaler {
        (
            CFGR_PPRE1_MASK | CFGR_ADCPRE_MASK,
            CFGR_PPRE1_DIV2 | CFGR_ADCPRE_DIV6,
        )
    } else {
        (CFGR_PPRE1_MASK, CFGR_PPRE1_DIV2)
    };

    script.stage(Stage::FlashLatency).write(FLASH_ACR, ACR_72MHZ);
    script.stage(Stage::Oscillator).handshake(HSE);
    script
        .stage(Stage::Pll)
        .write(
            RCC_CFGR,
            (multiplier << CFGR_PLLMUL_SHIFT) | CFGR_PLLSRC_HSE,
        )
        .handshake(PLL);
    script
        .stage(Stage::BusPrescalers)
        .modify(RCC_CFGR, prescaler_mask, prescaler);
    script.stage(Stage::Switch).switch_to(SWITCH, SW_PLL);
    Ok(())
}

/// Shared HSE-only script of the F1/F3 clock tree.
pub(super) fn hse_only_script(script: &mut Script, xtal_mhz: u32) -> Result<(), ClockError> {
    if xtal_mhz != 8 {
        return Err(ClockError::UnsupportedCrystal { xtal_mhz });
    }
    script.stage(Stage::FlashLatency).write(FLASH_ACR, ACR_8MHZ);
    script.stage(Stage::Oscillator).handshake(HSE);
    script.stage(Stage::Switch).switch_to(SWITCH, SW_HSE);
    Ok(())
}

/// Shared power-down script of the F1/F3 PWR block.
pub(super) fn standby_or_stop(script: &mut Script, mode: PowerDownMode) {
    script
        .stage(Stage::PowerDown)
        .set(PWREN)
        .put(PDDS, mode == PowerDownMode::Standby)
        .deep_sleep();
}

pub(super) const F1_HANDSHAKES: &[Handshake] = &[HSE, PLL];
pub(super) const F1_SWITCH: SwitchField = SWITCH;

impl ClockTree for Stm32F1 {
    type Target = F1Speed;

    const DEFAULT_XTAL_MHZ: u32 = 8;
    const HANDSHAKES: &'static [Handshake] = F1_HANDSHAKES;
    const SWITCH: SwitchField = SWITCH;

    fn plan(target: F1Speed, xtal_mhz: u32) -> Result<ClockPlan, ClockError> {
        let mut script = Script::new();
        let clocks = match target {
            F1Speed::Hse8MHz => {
                hse_only_script(&mut script, xtal_mhz)?;
                SystemClocks::from_mhz(8, 8, 8, 8)
            }
            F1Speed::Pll72MHz => {
                hse_pll_script(&mut script, 72, xtal_mhz, true)?;
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

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::clock::Step;

    #[test]
    fn multiplier_encoding() {
        assert_eq!(pll_multiplier(72, 8), Ok(7));
        assert_eq!(pll_multiplier(72, 12), Ok(4));
        assert!(pll_multiplier(72, 7).is_err());
        assert!(pll_multiplier(72, 0).is_err());
        assert!(pll_multiplier(72, 72).is_err());
    }

    #[test]
    fn pll_72mhz_register_values() {
        let plan = Stm32F1::plan(F1Speed::Pll72MHz, 8).unwrap();
        let steps: std::vec::Vec<Step> = plan.sequence.steps().iter().map(|&(_, s)| s).collect();
        assert_eq!(steps[0], Step::Write { reg: FLASH_ACR, value: 0x12 });
        assert!(steps.contains(&Step::Write {
            reg: RCC_CFGR,
            value: (7 << 18) | (1 << 16)
        }));
        assert!(steps.contains(&Step::Modify {
            reg: RCC_CFGR,
            clear: (0b111 << 8) | (0b11 << 14),
            set: (4 << 8) | (2 << 14)
        }));
        assert_eq!(plan.clocks, SystemClocks::from_mhz(72, 72, 36, 72));
    }

    #[test]
    fn hse_only_requires_8mhz_crystal() {
        assert!(Stm32F1::plan(F1Speed::Hse8MHz, 8).is_ok());
        assert_eq!(
            Stm32F1::plan(F1Speed::Hse8MHz, 12),
            Err(ClockError::UnsupportedCrystal { xtal_mhz: 12 })
        );
    }
}
