//! Clock bring-up on every supported family, against the simulated bus.

#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]

use platform::clock::{
    bring_up, full_speed_clock, power_down, ClockConfig, ClockError, ClockTree, PollLimit,
    PowerDownMode, Stage, SCB_SCR, SCR_SLEEPDEEP,
};
use platform::family::{
    F1Speed, F4Speed, Stm32F1, Stm32F3, Stm32F4, Stm32F7, Stm32H7, Stm32L0, Stm32L4,
};
use platform::mmio::mask;
use platform::sim::SimBus;
use platform::tick::{SYST_CSR, SYST_RVR};

fn first_write(bus: &SimBus, addr: u32) -> Option<usize> {
    bus.writes().iter().position(|&(a, _)| a == addr)
}

fn last_write(bus: &SimBus, addr: u32) -> Option<usize> {
    bus.writes().iter().rposition(|&(a, _)| a == addr)
}

/// Shared checks: expected SYSCLK, flash latency programmed before the
/// switch, SysTick armed for 1 ms, stages never go backwards.
fn brings_up<C: ClockTree>(expected_sysclk_mhz: u32) {
    let bus = SimBus::for_family::<C>();
    let clocks = full_speed_clock::<C, _>(&bus).unwrap();
    assert_eq!(clocks.sysclk_hz(), expected_sysclk_mhz * 1_000_000, "{}", C::NAME);

    let acr = first_write(&bus, C::FLASH).unwrap();
    let switch = last_write(&bus, C::SWITCH.reg).unwrap();
    assert!(acr < switch, "{}: flash latency after clock switch", C::NAME);

    assert_eq!(bus.peek(SYST_RVR), expected_sysclk_mhz * 1_000 - 1);
    assert_eq!(bus.peek(SYST_CSR), 0b111);

    let plan = C::plan(C::Target::default(), C::DEFAULT_XTAL_MHZ).unwrap();
    let steps = plan.sequence.steps();
    for pair in steps.windows(2) {
        assert!(pair[0].0 <= pair[1].0, "{}: {} after {}", C::NAME, pair[1].0, pair[0].0);
    }

    // The switch stage ends by polling the switch-status field.
    let (_, last_switch) = steps.iter().rev().find(|(stage, _)| *stage == Stage::Switch).unwrap();
    assert!(last_switch.is_wait(), "{}", C::NAME);
    assert_eq!(last_switch.register(), Some(C::SWITCH.reg), "{}", C::NAME);

    // Bring-up never executes WFE; every step names a register.
    assert!(steps.iter().all(|(_, step)| step.register().is_some()), "{}", C::NAME);
}

/// Running bring-up twice leaves every touched register as the first run did.
fn idempotent<C: ClockTree>() {
    let bus = SimBus::for_family::<C>();
    let first = full_speed_clock::<C, _>(&bus).unwrap();
    let touched: Vec<u32> = bus.writes().iter().map(|&(a, _)| a).collect();
    let snapshot: Vec<u32> = touched.iter().map(|&a| bus.peek(a)).collect();

    let second = full_speed_clock::<C, _>(&bus).unwrap();
    assert_eq!(first, second);
    let again: Vec<u32> = touched.iter().map(|&a| bus.peek(a)).collect();
    assert_eq!(snapshot, again, "{}", C::NAME);
}

/// Standby entry sets SLEEPDEEP and finishes with exactly one WFE.
fn powers_down<C: ClockTree>() {
    let bus = SimBus::for_family::<C>();
    power_down::<C, _>(&bus, PowerDownMode::Standby).unwrap();
    assert_ne!(bus.peek(SCB_SCR) & mask(SCR_SLEEPDEEP), 0, "{}", C::NAME);
    assert_eq!(bus.events(), 1);
    assert!(bus.writes().len() >= 2);

    let sequence = C::power_down_sequence(PowerDownMode::Standby).unwrap();
    let (last, rest) = sequence.steps().split_last().unwrap();
    assert_eq!(last.1.register(), None, "{}: WFE is not last", C::NAME);
    assert!(rest.iter().all(|(_, step)| !step.is_wait()), "{}", C::NAME);
}

/// A dead oscillator surfaces as a fault instead of hanging.
fn reports_hardware_fault<C: ClockTree>() {
    let bus = SimBus::new();
    let config = ClockConfig::<C::Target>::defaults::<C>().with_poll(PollLimit::Spins(16));
    let err = bring_up::<C, _>(&bus, &config).unwrap_err();
    assert!(matches!(err, ClockError::HardwareFault { .. }), "{}: {err:?}", C::NAME);
}

macro_rules! family_tests {
    ($($module:ident: $family:ty => $mhz:expr;)*) => {
        $(
            mod $module {
                use super::*;

                #[test]
                fn reaches_full_speed() {
                    brings_up::<$family>($mhz);
                }

                #[test]
                fn bring_up_is_idempotent() {
                    idempotent::<$family>();
                }

                #[test]
                fn standby_ends_in_wait_for_event() {
                    powers_down::<$family>();
                }

                #[test]
                fn missing_ready_flag_is_a_fault() {
                    reports_hardware_fault::<$family>();
                }
            }
        )*
    };
}

family_tests! {
    f1: Stm32F1 => 72;
    f3: Stm32F3 => 72;
    f4: Stm32F4 => 168;
    f7: Stm32F7 => 216;
    h7: Stm32H7 => 400;
    l0: Stm32L0 => 32;
    l4: Stm32L4 => 80;
}

#[test]
fn f4_fault_names_the_oscillator_stage() {
    let bus = SimBus::new();
    let config = ClockConfig::new(F4Speed::Mhz168, 8).with_poll(PollLimit::Spins(4));
    assert_eq!(
        bring_up::<Stm32F4, _>(&bus, &config),
        Err(ClockError::HardwareFault {
            stage: Stage::Oscillator,
            reg: 0x4002_3800
        })
    );
}

#[test]
fn h7_revision_v_runs_at_480() {
    let bus = SimBus::for_family::<Stm32H7>();
    bus.poke(0x5C00_1000, (0x2003 << 16) | 0x450);
    let clocks = full_speed_clock::<Stm32H7, _>(&bus).unwrap();
    assert_eq!(clocks.sysclk_hz(), 480_000_000);
}

#[test]
fn hse_only_skips_the_pll() {
    let bus = SimBus::for_family::<Stm32F1>();
    let clocks = bring_up::<Stm32F1, _>(&bus, &ClockConfig::new(F1Speed::Hse8MHz, 8)).unwrap();
    assert_eq!(clocks.sysclk_hz(), 8_000_000);
    // PLLON never requested.
    assert_eq!(bus.peek(0x4002_1000) & (1 << 24), 0);
}

#[test]
fn unsupported_crystal_touches_nothing() {
    let bus = SimBus::for_family::<Stm32F4>();
    let config = ClockConfig::new(F4Speed::Mhz168, 1);
    assert_eq!(
        bring_up::<Stm32F4, _>(&bus, &config),
        Err(ClockError::UnsupportedCrystal { xtal_mhz: 1 })
    );
    assert!(bus.accesses().is_empty());
}
