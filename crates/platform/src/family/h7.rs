//! STM32H7 single-core (RM0433).
//!
//! The H7 adds two steps around the common bring-up: the core supply must
//! be scaled to VOS1 before the flash latency and PLL can be raised, and
//! the I/O compensation cell is enabled once the fast clock is running.
//! Revision V silicon runs at 480 MHz; older revisions stop at 400 MHz.

#![allow(clippy::arithmetic_side_effects)] // register offsets are compile-time constants

use super::{gpio_ports, BusDomain, ChipFamily, GpioLayout, PeripheralInfo, UsartLayout};
use crate::clock::{
    ClockError, ClockPlan, ClockTree, Handshake, PowerDownMode, Script, Sequence, Stage,
    SwitchField, SystemClocks,
};
use crate::mmio::{BitRef, RegisterBus};

/// STM32H7 family (H742/H743/H750/H753).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stm32H7;

/// Supported STM32H7 system clock speeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum H7Speed {
    /// Any revision.
    #[default]
    Mhz400,
    /// Revision V only.
    Mhz480,
}

impl H7Speed {
    /// System clock in MHz.
    pub const fn mhz(self) -> u32 {
        match self {
            H7Speed::Mhz400 => 400,
            H7Speed::Mhz480 => 480,
        }
    }
}

const RCC: u32 = 0x5802_4400;
const RCC_CR: u32 = RCC;
const RCC_CFGR: u32 = RCC + 0x10;
const RCC_D1CFGR: u32 = RCC + 0x18;
const RCC_D2CFGR: u32 = RCC + 0x1C;
const RCC_D3CFGR: u32 = RCC + 0x20;
const RCC_PLLCKSELR: u32 = RCC + 0x28;
const RCC_PLLCFGR: u32 = RCC + 0x2C;
const RCC_PLL1DIVR: u32 = RCC + 0x30;
const RCC_AHB4ENR: u32 = RCC + 0xE0;
const RCC_APB1LENR: u32 = RCC + 0xE8;
const RCC_APB2ENR: u32 = RCC + 0xF0;
const RCC_APB4ENR: u32 = RCC + 0xF4;

const PWR: u32 = 0x5802_4800;
const PWR_CR3: u32 = PWR + 0x0C;
const PWR_CPUCR: u32 = PWR + 0x10;
const PWR_D3CR: u32 = PWR + 0x18;

const FLASH: u32 = 0x5200_2000;
const FLASH_ACR: u32 = FLASH;

const SYSCFG_CCCSR: u32 = 0x5800_0400 + 0x20;
const DBGMCU_IDC: u32 = 0x5C00_1000;

const HSE: Handshake = Handshake::in_register(RCC_CR, 16, 17);
const PLL1: Handshake = Handshake::in_register(RCC_CR, 24, 25);
/// Writing VOS (bits 15:14) is answered by VOSRDY (bit 13).
const VOS: Handshake = Handshake {
    request: BitRef::new(PWR_D3CR, 14),
    ready: BitRef::new(PWR_D3CR, 13),
};
const SWITCH: SwitchField = SwitchField {
    reg: RCC_CFGR,
    request_shift: 0,
    status_shift: 3,
    width: 3,
};

const SW_PLL1: u32 = 0b011;
const VOS_SCALE1: u32 = 0b11 << 14;
const SCUEN: BitRef = BitRef::new(PWR_CR3, 2);
/// Four wait states, WRHIGHFREQ = 2.
const ACR_4WS: u32 = 0x24;

/// DIVM1 = crystal (1 MHz reference), PLL1 from HSE.
const PLLCKSELR_SRC_HSE: u32 = 0b10;
const PLLCKSELR_DIVM1_SHIFT: u32 = 4;
/// PLL1: P, Q and R outputs enabled, wide VCO, integer mode.
const PLLCFGR_PLL1: u32 = 0x0007_0000;
/// PLL1DIVR: DIVP1 = /2 (field value 1), DIVN1 = 2 * sysclk.
const PLL1DIVR_DIVP_DIV2: u32 = 1 << 9;

/// HPRE /2, D1PPRE /2.
const D1CFGR: u32 = (0b100 << 4) | 0b1000;
/// D2PPRE1 /2, D2PPRE2 /2.
const D2CFGR: u32 = (0b100 << 8) | (0b100 << 4);
/// D3PPRE /2.
const D3CFGR: u32 = 0b100 << 4;

const SYSCFGEN: BitRef = BitRef::new(RCC_APB4ENR, 1);
const COMPENSATION_EN: BitRef = BitRef::new(SYSCFG_CCCSR, 0);

/// PDDS_D1 | PDDS_D2 | PDDS_D3.
const CPUCR_PDDS_ALL: u32 = 0b111;

const REV_V: u32 = 0x2003;

impl Stm32H7 {
    /// Fastest speed the running silicon revision supports.
    pub fn detect_target<B: RegisterBus>(bus: &B) -> H7Speed {
        if bus.read(DBGMCU_IDC) >> 16 == REV_V {
            H7Speed::Mhz480
        } else {
            H7Speed::Mhz400
        }
    }
}

impl ChipFamily for Stm32H7 {
    const NAME: &'static str = "stm32h7";
    const RCC: u32 = RCC;
    const FLASH: u32 = FLASH;
    const PWR: u32 = PWR;
    const GPIO_LAYOUT: GpioLayout = GpioLayout::Moder;
    const GPIO_PORTS: &'static [PeripheralInfo] =
        &gpio_ports::<11>(0x5802_0000, RCC_AHB4ENR, 0, BusDomain::Ahb);
    const USART_LAYOUT: UsartLayout = UsartLayout::V2;
    const USARTS: &'static [PeripheralInfo] = &[
        PeripheralInfo::new(0x4001_1000, BitRef::new(RCC_APB2ENR, 4), BusDomain::Apb2).with_irq(37),
        PeripheralInfo::new(0x4000_4400, BitRef::new(RCC_APB1LENR, 17), BusDomain::Apb1).with_irq(38),
        PeripheralInfo::new(0x4000_4800, BitRef::new(RCC_APB1LENR, 18), BusDomain::Apb1).with_irq(39),
        PeripheralInfo::new(0x4000_4C00, BitRef::new(RCC_APB1LENR, 19), BusDomain::Apb1).with_irq(52),
        PeripheralInfo::new(0x4000_5000, BitRef::new(RCC_APB1LENR, 20), BusDomain::Apb1).with_irq(53),
        PeripheralInfo::new(0x4001_1400, BitRef::new(RCC_APB2ENR, 5), BusDomain::Apb2).with_irq(71),
    ];
}

impl ClockTree for Stm32H7 {
    type Target = H7Speed;

    const DEFAULT_XTAL_MHZ: u32 = 8;
    const HANDSHAKES: &'static [Handshake] = &[VOS, HSE, PLL1];
    const SWITCH: SwitchField = SWITCH;

    fn plan(target: H7Speed, xtal_mhz: u32) -> Result<ClockPlan, ClockError> {
        if !(1..=63).contains(&xtal_mhz) {
            return Err(ClockError::UnsupportedCrystal { xtal_mhz });
        }
        let mhz = target.mhz();
        // DIVN1 field holds N - 1.
        let divn = 2 * mhz - 1;

        let mut script = Script::new();
        script
            .stage(Stage::Supply)
            .clear(SCUEN)
            .write(PWR_D3CR, VOS_SCALE1)
            .wait(VOS.ready, true);
        script.stage(Stage::FlashLatency).write(FLASH_ACR, ACR_4WS);
        script.stage(Stage::Oscillator).handshake(HSE);
        script
            .stage(Stage::Pll)
            .write(
                RCC_PLLCKSELR,
                (xtal_mhz << PLLCKSELR_DIVM1_SHIFT) | PLLCKSELR_SRC_HSE,
            )
            .write(RCC_PLLCFGR, PLLCFGR_PLL1)
            .write(RCC_PLL1DIVR, PLL1DIVR_DIVP_DIV2 | divn)
            .handshake(PLL1);
        script
            .stage(Stage::BusPrescalers)
            .write(RCC_D1CFGR, D1CFGR)
            .write(RCC_D2CFGR, D2CFGR)
            .write(RCC_D3CFGR, D3CFGR);
        script
            .stage(Stage::Switch)
            .write(RCC_CFGR, SW_PLL1)
            .await_switch(SWITCH, SW_PLL1);
        script
            .stage(Stage::Compensation)
            .set(SYSCFGEN)
            .set(COMPENSATION_EN);

        Ok(ClockPlan {
            sequence: script.finish()?,
            clocks: SystemClocks::from_mhz(mhz, mhz / 2, mhz / 4, mhz / 4),
        })
    }

    fn power_down_sequence(mode: PowerDownMode) -> Result<Sequence, ClockError> {
        let set = match mode {
            PowerDownMode::Standby => CPUCR_PDDS_ALL,
            PowerDownMode::Stop => 0,
        };
        let mut script = Script::new();
        script
            .stage(Stage::PowerDown)
            .modify(PWR_CPUCR, CPUCR_PDDS_ALL, set)
            .deep_sleep();
        script.finish()
    }

    fn preferred_target<B: RegisterBus>(bus: &B) -> H7Speed {
        Self::detect_target(bus)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::Step;
    use crate::sim::SimBus;

    #[test]
    fn revision_selects_speed() {
        let bus = SimBus::new();
        bus.poke(DBGMCU_IDC, (0x1003 << 16) | 0x450);
        assert_eq!(Stm32H7::detect_target(&bus), H7Speed::Mhz400);
        bus.poke(DBGMCU_IDC, (0x2003 << 16) | 0x450);
        assert_eq!(Stm32H7::detect_target(&bus), H7Speed::Mhz480);
    }

    #[test]
    fn divn_for_480mhz() {
        let plan = Stm32H7::plan(H7Speed::Mhz480, 8).unwrap();
        assert!(plan.sequence.steps().contains(&(
            Stage::Pll,
            Step::Write {
                reg: RCC_PLL1DIVR,
                value: (1 << 9) | 959
            }
        )));
        assert_eq!(plan.clocks.hclk_hz(), 240_000_000);
        assert_eq!(plan.clocks.pclk1_hz(), 120_000_000);
    }

    #[test]
    fn compensation_cell_follows_switch() {
        let plan = Stm32H7::plan(H7Speed::Mhz400, 8).unwrap();
        let switch = plan
            .sequence
            .position(|&(_, s)| s == Step::Write { reg: RCC_CFGR, value: SW_PLL1 })
            .unwrap();
        let cccsr = plan
            .sequence
            .position(|&(_, s)| s == Step::SetBit(COMPENSATION_EN))
            .unwrap();
        assert!(switch < cccsr);
    }

    #[test]
    fn standby_sets_all_domains() {
        let seq = Stm32H7::power_down_sequence(PowerDownMode::Standby).unwrap();
        assert_eq!(
            seq.steps().first(),
            Some(&(
                Stage::PowerDown,
                Step::Modify {
                    reg: PWR_CPUCR,
                    clear: 0b111,
                    set: 0b111
                }
            ))
        );
    }
}
