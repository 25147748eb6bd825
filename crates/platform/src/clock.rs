//! Clock & power state machine.
//!
//! Bring-up takes the system clock from the reset oscillator to a target
//! frequency in a fixed order:
//!
//! ```text
//! flash wait-states → oscillator on + ready → PLL program + lock
//!     → bus prescalers → switch + switch-status poll → SysTick
//! ```
//!
//! Families differ only in register layout and constants, so each family
//! describes its bring-up as data: a [`Sequence`] of [`Step`]s tagged with
//! the [`Stage`] they belong to. [`run`] is the one engine that executes a
//! sequence against a [`RegisterBus`]; each step performs exactly the
//! register accesses it names, in order.
//!
//! # Failure semantics
//!
//! Readiness polls spin forever by default ([`PollLimit::Forever`]): a
//! crystal or PLL that never locks leaves the part unusable, and there is
//! nothing to report the error to. [`PollLimit::Spins`] bounds every poll
//! and turns an expired poll into [`ClockError::HardwareFault`] for boards
//! that want to fall back or log.
//!
//! # Proof of bring-up
//!
//! [`bring_up`] returns [`SystemClocks`], which only this crate can
//! construct. Every peripheral constructor takes `&SystemClocks`, so no
//! peripheral register is written before the clock switch has completed.

use core::fmt;

use crate::family::{BusDomain, ChipFamily};
use crate::mmio::{mask, BitRef, RegisterBus};
use crate::tick;

/// Maximum number of steps in one [`Sequence`].
pub const MAX_STEPS: usize = 32;

/// Cortex-M System Control Register.
pub const SCB_SCR: u32 = 0xE000_ED10;
/// `SCR.SLEEPDEEP`: WFE/WFI enter the deep-sleep state selected by the PWR block.
pub const SCR_SLEEPDEEP: u8 = 2;

/// Hardware clock state while a stage executes.
///
/// This state exists only in status bits; software never stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockState {
    /// Running from the reset oscillator.
    Reset,
    /// External (or high-speed internal) oscillator starting up.
    OscillatorStabilizing,
    /// PLL programmed and locking; system clock not yet switched.
    PllLocking,
    /// System clock runs from the target source.
    Switched,
}

/// Bring-up and power-down stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Stage {
    /// Core voltage scaling (H7 VOS, L0 range 1).
    Supply,
    /// Flash wait-states for the target frequency.
    FlashLatency,
    /// Oscillator enable and ready poll.
    Oscillator,
    /// PLL dividers, enable and lock poll.
    Pll,
    /// AHB/APB prescalers.
    BusPrescalers,
    /// System clock switch and switch-status poll.
    Switch,
    /// Post-switch peripherals that need the final clock (H7 I/O compensation).
    Compensation,
    /// Power-domain configuration and wait-for-event.
    PowerDown,
}

impl Stage {
    /// The clock state the hardware is in while this stage executes.
    pub const fn state(self) -> ClockState {
        match self {
            Stage::Supply | Stage::FlashLatency => ClockState::Reset,
            Stage::Oscillator => ClockState::OscillatorStabilizing,
            Stage::Pll | Stage::BusPrescalers | Stage::Switch => ClockState::PllLocking,
            Stage::Compensation | Stage::PowerDown => ClockState::Switched,
        }
    }

    /// Short lowercase label.
    pub const fn name(self) -> &'static str {
        match self {
            Stage::Supply => "supply",
            Stage::FlashLatency => "flash latency",
            Stage::Oscillator => "oscillator",
            Stage::Pll => "pll",
            Stage::BusPrescalers => "bus prescalers",
            Stage::Switch => "switch",
            Stage::Compensation => "compensation",
            Stage::PowerDown => "power down",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One register operation of a clock sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    /// Write a whole register.
    Write {
        /// Register address.
        reg: u32,
        /// Value written.
        value: u32,
    },
    /// Clear then set bits (one read, one write).
    Modify {
        /// Register address.
        reg: u32,
        /// Bits cleared.
        clear: u32,
        /// Bits set.
        set: u32,
    },
    /// Set one bit.
    SetBit(BitRef),
    /// Clear one bit.
    ClearBit(BitRef),
    /// Poll until a bit reads `level`.
    WaitBit {
        /// Status bit.
        bit: BitRef,
        /// Level to wait for.
        level: bool,
    },
    /// Poll until `read(reg) & mask == value`.
    WaitField {
        /// Status register.
        reg: u32,
        /// Field mask.
        mask: u32,
        /// Expected field value (already shifted).
        value: u32,
    },
    /// Execute wait-for-event.
    WaitForEvent,
}

impl Step {
    /// Register this step touches, if any.
    pub const fn register(&self) -> Option<u32> {
        match *self {
            Step::Write { reg, .. } | Step::Modify { reg, .. } | Step::WaitField { reg, .. } => {
                Some(reg)
            }
            Step::SetBit(bit) | Step::ClearBit(bit) | Step::WaitBit { bit, .. } => Some(bit.reg),
            Step::WaitForEvent => None,
        }
    }

    /// `true` for polling steps.
    pub const fn is_wait(&self) -> bool {
        matches!(self, Step::WaitBit { .. } | Step::WaitField { .. })
    }
}

/// Fixed-capacity list of stage-tagged steps.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sequence {
    steps: heapless::Vec<(Stage, Step), MAX_STEPS>,
}

impl Sequence {
    /// Empty sequence.
    pub const fn new() -> Self {
        Self {
            steps: heapless::Vec::new(),
        }
    }

    /// Append one step.
    pub fn push(&mut self, stage: Stage, step: Step) -> Result<(), ClockError> {
        self.steps
            .push((stage, step))
            .map_err(|_| ClockError::SequenceOverflow)
    }

    /// All steps, in execution order.
    pub fn steps(&self) -> &[(Stage, Step)] {
        &self.steps
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// `true` if there are no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Index of the first step matching `pred`.
    pub fn position(&self, pred: impl Fn(&(Stage, Step)) -> bool) -> Option<usize> {
        self.steps.iter().position(pred)
    }
}

/// An oscillator or PLL enable bit and the ready bit hardware sets in response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Handshake {
    /// Enable request written by software.
    pub request: BitRef,
    /// Ready flag set by hardware.
    pub ready: BitRef,
}

impl Handshake {
    /// `request` in `reg` answered by `ready` in the same register.
    pub const fn in_register(reg: u32, request: u8, ready: u8) -> Self {
        Self {
            request: BitRef::new(reg, request),
            ready: BitRef::new(reg, ready),
        }
    }
}

/// System clock switch: a request field and the status field that reports
/// the active source once the switch completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SwitchField {
    /// Clock configuration register.
    pub reg: u32,
    /// Lowest bit of the source request (`SW`).
    pub request_shift: u8,
    /// Lowest bit of the source status (`SWS`).
    pub status_shift: u8,
    /// Field width in bits.
    pub width: u8,
}

impl SwitchField {
    #[allow(clippy::arithmetic_side_effects)] // width <= 3 on every family
    const fn field(self) -> u32 {
        mask(self.width) - 1
    }

    /// Status mask and expected value once `source` is active.
    pub const fn status(self, source: u32) -> (u32, u32) {
        let shift = self.status_shift as u32;
        (
            self.field().wrapping_shl(shift),
            (source & self.field()).wrapping_shl(shift),
        )
    }

    /// Request mask and value selecting `source`.
    pub const fn request(self, source: u32) -> (u32, u32) {
        let shift = self.request_shift as u32;
        (
            self.field().wrapping_shl(shift),
            (source & self.field()).wrapping_shl(shift),
        )
    }
}

/// Sequence builder used by the family clock trees.
///
/// Builder calls never fail; a capacity overflow is latched and reported by
/// [`Script::finish`].
#[derive(Debug)]
pub struct Script {
    sequence: Sequence,
    stage: Stage,
    overflow: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self::new()
    }
}

impl Script {
    /// Empty script positioned at [`Stage::FlashLatency`].
    pub const fn new() -> Self {
        Self {
            sequence: Sequence::new(),
            stage: Stage::FlashLatency,
            overflow: false,
        }
    }

    /// Tag the following steps with `stage`.
    pub fn stage(&mut self, stage: Stage) -> &mut Self {
        self.stage = stage;
        self
    }

    /// Append a raw step.
    pub fn step(&mut self, step: Step) -> &mut Self {
        if self.sequence.push(self.stage, step).is_err() {
            self.overflow = true;
        }
        self
    }

    /// Write a whole register.
    pub fn write(&mut self, reg: u32, value: u32) -> &mut Self {
        self.step(Step::Write { reg, value })
    }

    /// Clear then set bits.
    pub fn modify(&mut self, reg: u32, clear: u32, set: u32) -> &mut Self {
        self.step(Step::Modify { reg, clear, set })
    }

    /// Set one bit.
    pub fn set(&mut self, bit: BitRef) -> &mut Self {
        self.step(Step::SetBit(bit))
    }

    /// Clear one bit.
    pub fn clear(&mut self, bit: BitRef) -> &mut Self {
        self.step(Step::ClearBit(bit))
    }

    /// Set or clear one bit.
    pub fn put(&mut self, bit: BitRef, level: bool) -> &mut Self {
        if level {
            self.set(bit)
        } else {
            self.clear(bit)
        }
    }

    /// Poll until `bit` reads `level`.
    pub fn wait(&mut self, bit: BitRef, level: bool) -> &mut Self {
        self.step(Step::WaitBit { bit, level })
    }

    /// Poll until `read(reg) & mask == value`.
    pub fn wait_field(&mut self, reg: u32, mask: u32, value: u32) -> &mut Self {
        self.step(Step::WaitField { reg, mask, value })
    }

    /// Set the request bit, then poll the ready bit.
    pub fn handshake(&mut self, handshake: Handshake) -> &mut Self {
        self.set(handshake.request).wait(handshake.ready, true)
    }

    /// Request `source` in the switch field, then poll its status field.
    pub fn switch_to(&mut self, switch: SwitchField, source: u32) -> &mut Self {
        let (clear, set) = switch.request(source);
        self.modify(switch.reg, clear, set)
            .await_switch(switch, source)
    }

    /// Poll until the switch status reports `source`.
    pub fn await_switch(&mut self, switch: SwitchField, source: u32) -> &mut Self {
        let (mask, value) = switch.status(source);
        self.wait_field(switch.reg, mask, value)
    }

    /// Set `SCR.SLEEPDEEP` and execute wait-for-event.
    pub fn deep_sleep(&mut self) -> &mut Self {
        self.stage(Stage::PowerDown)
            .set(BitRef::new(SCB_SCR, SCR_SLEEPDEEP))
            .step(Step::WaitForEvent)
    }

    /// The finished sequence.
    pub fn finish(self) -> Result<Sequence, ClockError> {
        if self.overflow {
            return Err(ClockError::SequenceOverflow);
        }
        Ok(self.sequence)
    }
}

/// Bus frequencies after bring-up.
///
/// Only this crate constructs `SystemClocks`; holding one proves the clock
/// switch has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SystemClocks {
    sysclk_hz: u32,
    hclk_hz: u32,
    pclk1_hz: u32,
    pclk2_hz: u32,
}

const HZ_PER_MHZ: u32 = 1_000_000;

impl SystemClocks {
    pub(crate) const fn from_mhz(sysclk: u32, hclk: u32, pclk1: u32, pclk2: u32) -> Self {
        Self {
            sysclk_hz: sysclk.saturating_mul(HZ_PER_MHZ),
            hclk_hz: hclk.saturating_mul(HZ_PER_MHZ),
            pclk1_hz: pclk1.saturating_mul(HZ_PER_MHZ),
            pclk2_hz: pclk2.saturating_mul(HZ_PER_MHZ),
        }
    }

    /// Core clock.
    pub const fn sysclk_hz(&self) -> u32 {
        self.sysclk_hz
    }

    /// AHB clock.
    pub const fn hclk_hz(&self) -> u32 {
        self.hclk_hz
    }

    /// APB1 clock.
    pub const fn pclk1_hz(&self) -> u32 {
        self.pclk1_hz
    }

    /// APB2 clock.
    pub const fn pclk2_hz(&self) -> u32 {
        self.pclk2_hz
    }

    /// Clock feeding a peripheral on `bus`.
    pub const fn bus_hz(&self, bus: BusDomain) -> u32 {
        match bus {
            BusDomain::Ahb => self.hclk_hz,
            BusDomain::Apb1 => self.pclk1_hz,
            BusDomain::Apb2 => self.pclk2_hz,
        }
    }
}

/// A family's bring-up sequence and the frequencies it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockPlan {
    /// Register steps, flash latency through clock switch.
    pub sequence: Sequence,
    /// Frequencies once the sequence has run.
    pub clocks: SystemClocks,
}

/// Readiness poll policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollLimit {
    /// Spin until ready.
    #[default]
    Forever,
    /// Give up after this many reads and report [`ClockError::HardwareFault`].
    Spins(u32),
}

/// Low-power mode entered by [`power_down`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerDownMode {
    /// Volatile state lost; wake-up goes through the reset vector.
    Standby,
    /// Registers and RAM retained; execution continues after the WFE.
    Stop,
}

/// Clock bring-up inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockConfig<T> {
    /// Family-specific target speed.
    pub target: T,
    /// External crystal frequency in MHz (ignored by HSI-only plans).
    pub xtal_mhz: u32,
    /// Readiness poll policy.
    pub poll: PollLimit,
}

impl<T> ClockConfig<T> {
    /// Target `target` from a `xtal_mhz` crystal, polling forever.
    pub const fn new(target: T, xtal_mhz: u32) -> Self {
        Self {
            target,
            xtal_mhz,
            poll: PollLimit::Forever,
        }
    }

    /// Same configuration with a different poll policy.
    #[must_use]
    pub const fn with_poll(mut self, poll: PollLimit) -> Self {
        self.poll = poll;
        self
    }
}

impl<T: Default> ClockConfig<T> {
    /// Family default speed and crystal.
    pub fn defaults<C: ClockTree<Target = T>>() -> Self {
        Self::new(T::default(), C::DEFAULT_XTAL_MHZ)
    }
}

/// Clock bring-up error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockError {
    /// A bounded readiness poll expired.
    HardwareFault {
        /// Stage that was polling.
        stage: Stage,
        /// Status register that never reached the expected value.
        reg: u32,
    },
    /// A sequence needed more than [`MAX_STEPS`] steps.
    SequenceOverflow,
    /// The crystal frequency cannot reach the target with this family's PLL.
    UnsupportedCrystal {
        /// Requested crystal frequency.
        xtal_mhz: u32,
    },
}

impl fmt::Display for ClockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockError::HardwareFault { stage, reg } => {
                write!(f, "{stage} not ready (status register {reg:#010x})")
            }
            ClockError::SequenceOverflow => write!(f, "clock sequence exceeds {MAX_STEPS} steps"),
            ClockError::UnsupportedCrystal { xtal_mhz } => {
                write!(f, "unsupported crystal: {xtal_mhz} MHz")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ClockError {}

/// Per-family clock tree: supported speeds, bring-up and power-down scripts.
pub trait ClockTree: ChipFamily {
    /// Supported target speeds; `Default` is the family's full speed.
    type Target: Copy + Default + PartialEq + fmt::Debug;

    /// Crystal frequency assumed by [`full_speed_clock`].
    const DEFAULT_XTAL_MHZ: u32;

    /// Enable/ready pairs used by the bring-up script.
    const HANDSHAKES: &'static [Handshake];

    /// System clock switch field.
    const SWITCH: SwitchField;

    /// Bring-up sequence for `target`.
    fn plan(target: Self::Target, xtal_mhz: u32) -> Result<ClockPlan, ClockError>;

    /// Power-down sequence for `mode`, ending in wait-for-event.
    fn power_down_sequence(mode: PowerDownMode) -> Result<Sequence, ClockError>;

    /// Speed picked by [`full_speed_clock`]; families with
    /// revision-dependent limits read the silicon here.
    fn preferred_target<B: RegisterBus>(_bus: &B) -> Self::Target {
        Self::Target::default()
    }
}

fn poll(limit: PollLimit, mut ready: impl FnMut() -> bool) -> bool {
    match limit {
        PollLimit::Forever => {
            while !ready() {
                core::hint::spin_loop();
            }
            true
        }
        PollLimit::Spins(n) => (0..n).any(|_| {
            let done = ready();
            if !done {
                core::hint::spin_loop();
            }
            done
        }),
    }
}

fn hardware_fault(stage: Stage, reg: u32) -> ClockError {
    #[cfg(feature = "defmt")]
    defmt::error!("clock: {} not ready, status {=u32:#010x}", stage, reg);
    ClockError::HardwareFault { stage, reg }
}

fn execute<B: RegisterBus>(
    bus: &B,
    stage: Stage,
    step: Step,
    limit: PollLimit,
) -> Result<(), ClockError> {
    match step {
        Step::Write { reg, value } => bus.write(reg, value),
        Step::Modify { reg, clear, set } => bus.modify(reg, clear, set),
        Step::SetBit(bit) => bus.set_bit(bit.reg, bit.bit),
        Step::ClearBit(bit) => bus.clear_bit(bit.reg, bit.bit),
        Step::WaitBit { bit, level } => {
            if !poll(limit, || bus.read_bit(bit.reg, bit.bit) == level) {
                return Err(hardware_fault(stage, bit.reg));
            }
        }
        Step::WaitField { reg, mask, value } => {
            if !poll(limit, || bus.read(reg) & mask == value) {
                return Err(hardware_fault(stage, reg));
            }
        }
        Step::WaitForEvent => bus.wait_for_event(),
    }
    Ok(())
}

/// Execute `sequence` step by step.
pub fn run<B: RegisterBus>(bus: &B, sequence: &Sequence, limit: PollLimit) -> Result<(), ClockError> {
    let mut current = None;
    for &(stage, step) in sequence.steps() {
        if current != Some(stage) {
            #[cfg(feature = "defmt")]
            defmt::debug!("clock: {} ({})", stage, stage.state());
            current = Some(stage);
        }
        execute(bus, stage, step, limit)?;
    }
    Ok(())
}

/// Bring the clock tree of `C` to `config.target`, then arm SysTick for a
/// 1 ms tick.
///
/// Running bring-up again on an already switched chip writes the same
/// values and returns the same [`SystemClocks`].
pub fn bring_up<C: ClockTree, B: RegisterBus>(
    bus: &B,
    config: &ClockConfig<C::Target>,
) -> Result<SystemClocks, ClockError> {
    let plan = C::plan(config.target, config.xtal_mhz)?;
    run(bus, &plan.sequence, config.poll)?;
    tick::arm(bus, plan.clocks.sysclk_hz());

    #[cfg(feature = "defmt")]
    defmt::info!(
        "{=str}: sysclk {=u32} Hz, hclk {=u32} Hz, pclk1 {=u32} Hz, pclk2 {=u32} Hz",
        C::NAME,
        plan.clocks.sysclk_hz(),
        plan.clocks.hclk_hz(),
        plan.clocks.pclk1_hz(),
        plan.clocks.pclk2_hz()
    );
    Ok(plan.clocks)
}

/// [`bring_up`] with the family's preferred speed and default crystal.
pub fn full_speed_clock<C: ClockTree, B: RegisterBus>(bus: &B) -> Result<SystemClocks, ClockError> {
    let config = ClockConfig::new(C::preferred_target(bus), C::DEFAULT_XTAL_MHZ);
    bring_up::<C, B>(bus, &config)
}

/// Enter `mode`: power-domain clock, mode select, `SLEEPDEEP`, WFE.
///
/// On silicon, standby does not return (wake-up is a reset). Stop returns
/// once a wake-up event arrives.
pub fn power_down<C: ClockTree, B: RegisterBus>(bus: &B, mode: PowerDownMode) -> Result<(), ClockError> {
    let sequence = C::power_down_sequence(mode)?;
    run(bus, &sequence, PollLimit::Forever)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::sim::SimBus;

    const CR: u32 = 0x4002_1000;

    #[test]
    fn stages_map_to_monotonic_states() {
        let stages = [
            Stage::Supply,
            Stage::FlashLatency,
            Stage::Oscillator,
            Stage::Pll,
            Stage::BusPrescalers,
            Stage::Switch,
            Stage::Compensation,
            Stage::PowerDown,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].state() <= pair[1].state());
        }
    }

    #[test]
    fn script_overflow_is_reported_not_panicked() {
        let mut script = Script::new();
        for i in 0..=MAX_STEPS {
            script.write(CR, i as u32);
        }
        assert_eq!(script.finish(), Err(ClockError::SequenceOverflow));
    }

    #[test]
    fn handshake_sets_then_polls() {
        let mut script = Script::new();
        script
            .stage(Stage::Oscillator)
            .handshake(Handshake::in_register(CR, 16, 17));
        let seq = script.finish().unwrap();
        assert_eq!(
            seq.steps(),
            &[
                (Stage::Oscillator, Step::SetBit(BitRef::new(CR, 16))),
                (
                    Stage::Oscillator,
                    Step::WaitBit {
                        bit: BitRef::new(CR, 17),
                        level: true
                    }
                ),
            ]
        );
    }

    #[test]
    fn switch_field_masks() {
        let sw = SwitchField {
            reg: CR,
            request_shift: 0,
            status_shift: 3,
            width: 3,
        };
        assert_eq!(sw.request(0b011), (0b111, 0b011));
        assert_eq!(sw.status(0b011), (0b111_000, 0b011_000));
    }

    #[test]
    fn run_executes_each_step_once_in_order() {
        let bus = SimBus::new();
        let mut script = Script::new();
        script.write(CR, 0x12).modify(CR, 0x02, 0x100).set(BitRef::new(CR, 0));
        run(&bus, &script.finish().unwrap(), PollLimit::Forever).unwrap();
        assert_eq!(bus.writes(), vec![(CR, 0x12), (CR, 0x110), (CR, 0x111)]);
    }

    #[test]
    fn bounded_poll_reports_hardware_fault() {
        let bus = SimBus::new();
        let mut script = Script::new();
        script.stage(Stage::Pll).wait(BitRef::new(CR, 25), true);
        let err = run(&bus, &script.finish().unwrap(), PollLimit::Spins(10)).unwrap_err();
        assert_eq!(
            err,
            ClockError::HardwareFault {
                stage: Stage::Pll,
                reg: CR
            }
        );
    }

    #[test]
    fn bounded_poll_passes_when_ready() {
        let bus = SimBus::new();
        bus.poke(CR, 1 << 25);
        let mut script = Script::new();
        script.stage(Stage::Pll).wait(BitRef::new(CR, 25), true);
        assert!(run(&bus, &script.finish().unwrap(), PollLimit::Spins(1)).is_ok());
    }

    #[test]
    fn zero_spin_budget_always_faults() {
        let bus = SimBus::new();
        bus.poke(CR, u32::MAX);
        let mut script = Script::new();
        script.wait_field(CR, 0b1100, 0b1000);
        assert!(run(&bus, &script.finish().unwrap(), PollLimit::Spins(0)).is_err());
    }

    #[test]
    fn deep_sleep_ends_in_wfe() {
        let bus = SimBus::new();
        let mut script = Script::new();
        script.deep_sleep();
        run(&bus, &script.finish().unwrap(), PollLimit::Forever).unwrap();
        assert_eq!(bus.peek(SCB_SCR), 1 << SCR_SLEEPDEEP);
        assert_eq!(bus.events(), 1);
    }

    #[test]
    fn error_display() {
        let err = ClockError::HardwareFault {
            stage: Stage::Oscillator,
            reg: 0x4002_1000,
        };
        assert_eq!(
            std::format!("{err}"),
            "oscillator not ready (status register 0x40021000)"
        );
        assert_eq!(
            std::format!("{}", ClockError::UnsupportedCrystal { xtal_mhz: 7 }),
            "unsupported crystal: 7 MHz"
        );
    }
}
