//! STM32L0 (RM0367). Cortex-M0+, no crystal on the supported boards: both
//! speeds run from HSI16. 32 MHz needs voltage range 1, which is selected
//! before the flash latency changes; 16 MHz stays in the reset range 2.

#![allow(clippy::arithmetic_side_effects)] // register offsets are compile-time constants

use super::{gpio_ports, BusDomain, ChipFamily, GpioLayout, PeripheralInfo, UsartLayout};
use crate::clock::{
    ClockError, ClockPlan, ClockTree, Handshake, PowerDownMode, Script, Sequence, Stage,
    SwitchField, SystemClocks,
};
use crate::mmio::BitRef;

/// STM32L0 family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stm32L0;

/// Supported STM32L0 system clock speeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum L0Speed {
    /// HSI16 directly.
    Hsi16MHz,
    /// HSI16 × 4 / 2 through the PLL.
    #[default]
    Pll32MHz,
}

const RCC: u32 = 0x4002_1000;
const RCC_CR: u32 = RCC;
const RCC_CFGR: u32 = RCC + 0x0C;
const RCC_IOPENR: u32 = RCC + 0x2C;
const RCC_APB2ENR: u32 = RCC + 0x34;
const RCC_APB1ENR: u32 = RCC + 0x38;
const FLASH: u32 = 0x4002_2000;
const FLASH_ACR: u32 = FLASH;
const PWR: u32 = 0x4000_7000;
const PWR_CR: u32 = PWR;
const PWR_CSR: u32 = PWR + 0x04;

const HSI16: Handshake = Handshake::in_register(RCC_CR, 0, 2);
const PLL: Handshake = Handshake::in_register(RCC_CR, 24, 25);
const SWITCH: SwitchField = SwitchField {
    reg: RCC_CFGR,
    request_shift: 0,
    status_shift: 2,
    width: 2,
};

const SW_HSI16: u32 = 0b01;
const SW_PLL: u32 = 0b11;

/// One wait state, prefetch on.
const ACR_1WS: u32 = 0x03;
/// HSI16 on; MSI, HSE and PLL off.
const CR_HSI16_ONLY: u32 = 0x01;
/// PLLMUL ×4, PLLDIV /2, PLLSRC = HSI16.
const CFGR_PLL_X4_DIV2: u32 = (0b0001 << 18) | (0b01 << 22);

const PWREN: BitRef = BitRef::new(RCC_APB1ENR, 28);
const PWR_CR_VOS: u32 = 0b11 << 11;
const PWR_CR_VOS_RANGE1: u32 = 0b01 << 11;
/// Set while the regulator moves to the new range.
const VOSF: BitRef = BitRef::new(PWR_CSR, 4);
/// VOS range 2, DBP, FWU, ULP, CWUF, LPSDSR; PDDS at bit 1.
const PWR_CR_LOW_POWER: u32 = (0b10 << 11) | (1 << 10) | (1 << 9) | (1 << 8) | (1 << 2) | 1;
const PWR_CR_PDDS: u32 = 1 << 1;

impl ChipFamily for Stm32L0 {
    const NAME: &'static str = "stm32l0";
    const RCC: u32 = RCC;
    const FLASH: u32 = FLASH;
    const PWR: u32 = PWR;
    const GPIO_LAYOUT: GpioLayout = GpioLayout::Moder;
    const GPIO_PORTS: &'static [PeripheralInfo] =
        &gpio_ports::<5>(0x5000_0000, RCC_IOPENR, 0, BusDomain::Ahb);
    const USART_LAYOUT: UsartLayout = UsartLayout::V2;
    const USARTS: &'static [PeripheralInfo] = &[
        PeripheralInfo::new(0x4001_3800, BitRef::new(RCC_APB2ENR, 14), BusDomain::Apb2).with_irq(27),
        PeripheralInfo::new(0x4000_4400, BitRef::new(RCC_APB1ENR, 17), BusDomain::Apb1).with_irq(28),
    ];
}

impl ClockTree for Stm32L0 {
    type Target = L0Speed;

    /// Unused: both plans run from HSI16.
    const DEFAULT_XTAL_MHZ: u32 = 0;
    const HANDSHAKES: &'static [Handshake] = &[HSI16, PLL];
    const SWITCH: SwitchField = SWITCH;

    fn plan(target: L0Speed, _xtal_mhz: u32) -> Result<ClockPlan, ClockError> {
        let mut script = Script::new();
        if target == L0Speed::Pll32MHz {
            script
                .stage(Stage::Supply)
                .set(PWREN)
                .modify(PWR_CR, PWR_CR_VOS, PWR_CR_VOS_RANGE1)
                .wait(VOSF, false);
        }
        script.stage(Stage::FlashLatency).write(FLASH_ACR, ACR_1WS);
        // Move onto HSI16 and stop the PLL, so its dividers may be changed.
        script
            .stage(Stage::Oscillator)
            .handshake(HSI16)
            .write(RCC_CFGR, SW_HSI16)
            .await_switch(SWITCH, SW_HSI16)
            .write(RCC_CR, CR_HSI16_ONLY)
            .wait(PLL.ready, false);

        let mhz = match target {
            L0Speed::Hsi16MHz => 16,
            L0Speed::Pll32MHz => {
                script
                    .stage(Stage::Pll)
                    .modify(RCC_CFGR, 0, CFGR_PLL_X4_DIV2)
                    .handshake(PLL);
                script.stage(Stage::Switch).switch_to(SWITCH, SW_PLL);
                32
            }
        };
        Ok(ClockPlan {
            sequence: script.finish()?,
            clocks: SystemClocks::from_mhz(mhz, mhz, mhz, mhz),
        })
    }

    fn power_down_sequence(mode: PowerDownMode) -> Result<Sequence, ClockError> {
        let pdds = match mode {
            PowerDownMode::Standby => PWR_CR_PDDS,
            PowerDownMode::Stop => 0,
        };
        let mut script = Script::new();
        script
            .stage(Stage::PowerDown)
            .set(PWREN)
            .write(PWR_CR, PWR_CR_LOW_POWER | pdds)
            .deep_sleep();
        script.finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::Step;

    #[test]
    fn pll_programmed_after_teardown() {
        let plan = Stm32L0::plan(L0Speed::Pll32MHz, 0).unwrap();
        let teardown = plan
            .sequence
            .position(|&(_, s)| s == Step::WaitBit { bit: PLL.ready, level: false })
            .unwrap();
        let pll = plan
            .sequence
            .position(|&(_, s)| s == Step::SetBit(PLL.request))
            .unwrap();
        assert!(teardown < pll);
    }

    #[test]
    fn range1_settles_before_flash_latency() {
        let plan = Stm32L0::plan(L0Speed::Pll32MHz, 0).unwrap();
        let steps = plan.sequence.steps();
        assert_eq!(
            steps.get(1),
            Some(&(
                Stage::Supply,
                Step::Modify {
                    reg: PWR_CR,
                    clear: PWR_CR_VOS,
                    set: PWR_CR_VOS_RANGE1
                }
            ))
        );
        let settled = plan
            .sequence
            .position(|&(_, s)| s == Step::WaitBit { bit: VOSF, level: false })
            .unwrap();
        let acr = plan
            .sequence
            .position(|&(_, s)| s.register() == Some(FLASH_ACR))
            .unwrap();
        assert!(settled < acr);
    }

    #[test]
    fn hsi16_plan_has_no_pll() {
        let plan = Stm32L0::plan(L0Speed::Hsi16MHz, 0).unwrap();
        assert!(!plan.sequence.steps().iter().any(|&(stage, _)| stage == Stage::Pll));
        assert!(!plan.sequence.steps().iter().any(|&(stage, _)| stage == Stage::Supply));
        assert_eq!(plan.clocks.sysclk_hz(), 16_000_000);
    }

    #[test]
    fn stop_leaves_pdds_clear() {
        let seq = Stm32L0::power_down_sequence(PowerDownMode::Stop).unwrap();
        assert!(seq.steps().contains(&(
            Stage::PowerDown,
            Step::Write {
                reg: PWR_CR,
                value: PWR_CR_LOW_POWER
            }
        )));
    }
}
