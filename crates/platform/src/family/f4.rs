//! STM32F4 (RM0090).
//!
//! 180 MHz needs the F42x/F43x over-drive regulator; it is switched on
//! after the PLL locks and before SYSCLK moves to the PLL. VOS keeps its
//! reset value (scale 1) on every plan.

#![allow(clippy::arithmetic_side_effects)] // register offsets are compile-time constants

use super::{gpio_ports, BusDomain, ChipFamily, GpioLayout, PeripheralInfo, UsartLayout};
use crate::clock::{
    ClockError, ClockPlan, ClockTree, Handshake, PowerDownMode, Script, Sequence, Stage,
    SwitchField, SystemClocks,
};
use crate::mmio::BitRef;

/// STM32F4 family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stm32F4;

/// Supported STM32F4 system clock speeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum F4Speed {
    /// F401 class.
    Mhz84,
    /// F410/F411/F412 class.
    Mhz100,
    /// F405/F407 class.
    #[default]
    Mhz168,
    /// F427/F429 class.
    Mhz180,
}

impl F4Speed {
    /// System clock in MHz.
    pub const fn mhz(self) -> u32 {
        match self {
            F4Speed::Mhz84 => 84,
            F4Speed::Mhz100 => 100,
            F4Speed::Mhz168 => 168,
            F4Speed::Mhz180 => 180,
        }
    }
}

const RCC: u32 = 0x4002_3800;
const RCC_CR: u32 = RCC;
const RCC_PLLCFGR: u32 = RCC + 0x04;
const RCC_CFGR: u32 = RCC + 0x08;
const RCC_AHB1ENR: u32 = RCC + 0x30;
const RCC_APB1ENR: u32 = RCC + 0x40;
const RCC_APB2ENR: u32 = RCC + 0x44;
const FLASH: u32 = 0x4002_3C00;
const FLASH_ACR: u32 = FLASH;
const PWR: u32 = 0x4000_7000;
const PWR_CR: u32 = PWR;
const PWR_CSR: u32 = PWR + 0x04;

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

/// APB2 = HCLK / 2, APB1 = HCLK / 4.
const CFGR_PRESCALERS: u32 = (0b100 << 13) | (0b101 << 10);

const PLLCFGR_SRC_HSE: u32 = 1 << 22;
const PLLCFGR_Q_SHIFT: u32 = 24;
const PLLCFGR_N_SHIFT: u32 = 6;

const PWREN: BitRef = BitRef::new(RCC_APB1ENR, 28);
const PDDS: BitRef = BitRef::new(PWR_CR, 1);

/// ODEN answered by ODRDY.
const OVER_DRIVE: Handshake = Handshake {
    request: BitRef::new(PWR_CR, 16),
    ready: BitRef::new(PWR_CSR, 16),
};
/// ODSWEN answered by ODSWRDY.
const OVER_DRIVE_SWITCH: Handshake = Handshake {
    request: BitRef::new(PWR_CR, 17),
    ready: BitRef::new(PWR_CSR, 17),
};

/// Above this SYSCLK the core needs the over-drive regulator.
pub(super) const OVER_DRIVE_ABOVE_MHZ: u32 = 168;

pub(super) const F4_HANDSHAKES: &[Handshake] = &[HSE, PLL, OVER_DRIVE, OVER_DRIVE_SWITCH];

/// PLLM divides the crystal down to a 1 MHz VCO input.
pub(super) fn pll_input_divider(xtal_mhz: u32) -> Result<u32, ClockError> {
    if (2..=63).contains(&xtal_mhz) {
        Ok(xtal_mhz)
    } else {
        Err(ClockError::UnsupportedCrystal { xtal_mhz })
    }
}

/// HSE → PLL bring-up shared by the F4 and F7 clock trees.
///
/// The prescalers go in first with the HSE selected, so APB1/APB2 never
/// see the PLL frequency undivided. With `over_drive` the regulator is
/// boosted once the PLL is locked.
pub(super) fn hse_pll_script(script: &mut Script, flash_acr: u32, pllcfgr: u32, over_drive: bool) {
    script.stage(Stage::FlashLatency).write(FLASH_ACR, flash_acr);
    script.stage(Stage::Oscillator).handshake(HSE);
    script
        .stage(Stage::Pll)
        .write(RCC_PLLCFGR, pllcfgr)
        .handshake(PLL);
    if over_drive {
        script
            .set(PWREN)
            .handshake(OVER_DRIVE)
            .handshake(OVER_DRIVE_SWITCH);
    }
    script
        .stage(Stage::BusPrescalers)
        .write(RCC_CFGR, CFGR_PRESCALERS | SW_HSE)
        .await_switch(SWITCH, SW_HSE);
    script
        .stage(Stage::Switch)
        .write(RCC_CFGR, CFGR_PRESCALERS | SW_PLL)
        .await_switch(SWITCH, SW_PLL);
}

/// Power-down shared by the F4 and F7 PWR blocks.
pub(super) fn standby_or_stop(script: &mut Script, mode: PowerDownMode) {
    script
        .stage(Stage::PowerDown)
        .set(PWREN)
        .put(PDDS, mode == PowerDownMode::Standby)
        .deep_sleep();
}

/// U(S)ART table shared by the F4 and F7.
pub(super) const F4_USARTS: &[PeripheralInfo] = &[
    PeripheralInfo::new(0x4001_1000, BitRef::new(RCC_APB2ENR, 4), BusDomain::Apb2).with_irq(37),
    PeripheralInfo::new(0x4000_4400, BitRef::new(RCC_APB1ENR, 17), BusDomain::Apb1).with_irq(38),
    PeripheralInfo::new(0x4000_4800, BitRef::new(RCC_APB1ENR, 18), BusDomain::Apb1).with_irq(39),
    PeripheralInfo::new(0x4000_4C00, BitRef::new(RCC_APB1ENR, 19), BusDomain::Apb1).with_irq(52),
    PeripheralInfo::new(0x4000_5000, BitRef::new(RCC_APB1ENR, 20), BusDomain::Apb1).with_irq(53),
    PeripheralInfo::new(0x4001_1400, BitRef::new(RCC_APB2ENR, 5), BusDomain::Apb2).with_irq(71),
];

pub(super) const F4_SWITCH: SwitchField = SWITCH;
pub(super) const F4_RCC: u32 = RCC;
pub(super) const F4_AHB1ENR: u32 = RCC_AHB1ENR;
pub(super) const F4_FLASH: u32 = FLASH;
pub(super) const F4_PWR: u32 = PWR;

impl ChipFamily for Stm32F4 {
    const NAME: &'static str = "stm32f4";
    const RCC: u32 = RCC;
    const FLASH: u32 = FLASH;
    const PWR: u32 = PWR;
    const GPIO_LAYOUT: GpioLayout = GpioLayout::Moder;
    const GPIO_PORTS: &'static [PeripheralInfo] =
        &gpio_ports::<9>(0x4002_0000, RCC_AHB1ENR, 0, BusDomain::Ahb);
    const USART_LAYOUT: UsartLayout = UsartLayout::V1;
    const USARTS: &'static [PeripheralInfo] = F4_USARTS;
}

impl ClockTree for Stm32F4 {
    type Target = F4Speed;

    const DEFAULT_XTAL_MHZ: u32 = 8;
    const HANDSHAKES: &'static [Handshake] = F4_HANDSHAKES;
    const SWITCH: SwitchField = SWITCH;

    fn plan(target: F4Speed, xtal_mhz: u32) -> Result<ClockPlan, ClockError> {
        let mhz = target.mhz();
        // VCO = 2 * sysclk, PLLP = /2, PLLQ = /7.
        let pllcfgr = (7 << PLLCFGR_Q_SHIFT)
            | PLLCFGR_SRC_HSE
            | ((2 * mhz) << PLLCFGR_N_SHIFT)
            | pll_input_divider(xtal_mhz)?;

        let mut script = Script::new();
        // Five wait states, prefetch, instruction and data caches.
        hse_pll_script(&mut script, 0x705, pllcfgr, mhz > OVER_DRIVE_ABOVE_MHZ);
        Ok(ClockPlan {
            sequence: script.finish()?,
            clocks: SystemClocks::from_mhz(mhz, mhz, mhz / 4, mhz / 2),
        })
    }

    fn power_down_sequence(mode: PowerDownMode) -> Result<Sequence, ClockError> {
        let mut script = Script::new();
        standby_or_stop(&mut script, mode);
        script.finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::Step;

    #[test]
    fn pllcfgr_for_168mhz_from_8mhz() {
        let plan = Stm32F4::plan(F4Speed::Mhz168, 8).unwrap();
        assert!(plan.sequence.steps().contains(&(
            Stage::Pll,
            Step::Write {
                reg: RCC_PLLCFGR,
                value: (7 << 24) | (1 << 22) | (336 << 6) | 8
            }
        )));
        assert_eq!(plan.clocks.pclk1_hz(), 42_000_000);
        assert_eq!(plan.clocks.pclk2_hz(), 84_000_000);
    }

    #[test]
    fn prescalers_applied_on_hse_before_pll_switch() {
        let plan = Stm32F4::plan(F4Speed::Mhz180, 8).unwrap();
        let hse = plan
            .sequence
            .position(|&(_, s)| s == Step::Write { reg: RCC_CFGR, value: CFGR_PRESCALERS | SW_HSE })
            .unwrap();
        let pll = plan
            .sequence
            .position(|&(_, s)| s == Step::Write { reg: RCC_CFGR, value: CFGR_PRESCALERS | SW_PLL })
            .unwrap();
        assert!(hse < pll);
    }

    #[test]
    fn over_drive_between_pll_lock_and_switch() {
        let plan = Stm32F4::plan(F4Speed::Mhz180, 8).unwrap();
        let locked = plan
            .sequence
            .position(|&(_, s)| s == Step::WaitBit { bit: PLL.ready, level: true })
            .unwrap();
        let enable = plan
            .sequence
            .position(|&(_, s)| s == Step::SetBit(OVER_DRIVE.request))
            .unwrap();
        let switched = plan
            .sequence
            .position(|&(_, s)| s == Step::WaitBit { bit: OVER_DRIVE_SWITCH.ready, level: true })
            .unwrap();
        let pll = plan
            .sequence
            .position(|&(_, s)| s == Step::Write { reg: RCC_CFGR, value: CFGR_PRESCALERS | SW_PLL })
            .unwrap();
        assert!(locked < enable && enable < switched && switched < pll);
        assert!(plan.sequence.steps().contains(&(Stage::Pll, Step::SetBit(PWREN))));
    }

    #[test]
    fn over_drive_only_above_168mhz() {
        for speed in [F4Speed::Mhz84, F4Speed::Mhz100, F4Speed::Mhz168] {
            let plan = Stm32F4::plan(speed, 8).unwrap();
            assert!(plan.sequence.steps().iter().all(|&(_, s)| s.register() != Some(PWR_CR)));
        }
    }

    #[test]
    fn crystal_must_fit_pllm() {
        assert_eq!(
            Stm32F4::plan(F4Speed::Mhz84, 1),
            Err(ClockError::UnsupportedCrystal { xtal_mhz: 1 })
        );
        assert!(Stm32F4::plan(F4Speed::Mhz84, 25).is_ok());
    }
}
