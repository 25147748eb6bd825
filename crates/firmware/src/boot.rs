//! Boot sequence: clocks, timebase, console, status LED.
//!
//! Initialization order (MUST be respected, later steps depend on earlier ones):
//!   1. Clock tree (flash wait states before the faster clock is selected)
//!   2. SysTick from the new SYSCLK
//!   3. Console pins
//!   4. Console U(S)ART (BRR is computed from the bus clock of step 1)
//!   5. Status LED
//!   6. Interrupt half installed, then receive interrupt and NVIC line enabled

use platform::clock::{full_speed_clock, ClockError, SystemClocks};
use platform::gpio::GpioPin;
use platform::mmio::RegisterBus;
use platform::serial::{BufferedSerial, SerialBuffers, SerialConfig, SerialIrq};

use crate::board::Board;
use crate::console::IrqSlot;

/// Ordered list of boot sequence steps for documentation and testing.
///
/// # Correctness Invariants
///
/// - Flash latency must be raised before SYSCLK is switched to the PLL;
///   fetching at the new speed with too few wait states reads garbage.
/// - The console baud divisor is derived from the bus clock, so the
///   U(S)ART is configured only after the clock tree is final.
/// - The interrupt half must be installed before the receive interrupt is
///   unmasked; an early interrupt would find nothing to service it.
pub const BOOT_SEQUENCE_STEPS: &[&str] = &[
    "1. Clock tree: flash latency, oscillator, PLL, prescalers, switch",
    "2. SysTick: 1 ms tick from SYSCLK",
    "3. Console pins: TX alternate function, RX input",
    "4. Console U(S)ART: clock enable, BRR from bus clock, UE|TE|RE",
    "5. Status LED: push-pull output",
    "6. Console IRQ: install handler half, then RXNEIE + EIE + NVIC",
];

/// Console line rate.
pub const CONSOLE_BAUD: u32 = 115_200;

/// Console queue size (each direction holds one byte less).
pub const CONSOLE_QUEUE: usize = 64;

/// Peripherals brought up by [`bring_up`], before interrupts are live.
pub struct Console<'a, B, const N: usize> {
    /// Caller half of the console.
    pub serial: BufferedSerial<'a, B, N>,
    /// Interrupt half of the console.
    pub irq: SerialIrq<'a, B, N>,
    /// Status LED.
    pub led: GpioPin<B>,
    /// Final clock frequencies.
    pub clocks: SystemClocks,
}

impl<'a, B: RegisterBus, const N: usize> Console<'a, B, N> {
    /// Hand the interrupt half to `slot`, then enable the console interrupt.
    pub fn start(self, slot: &IrqSlot<SerialIrq<'a, B, N>>) -> (BufferedSerial<'a, B, N>, GpioPin<B>) {
        slot.install(self.irq);
        self.serial.listen();
        (self.serial, self.led)
    }
}

/// Run steps 1-5 of [`BOOT_SEQUENCE_STEPS`] for board `C`.
pub fn bring_up<C: Board, B: RegisterBus + Clone, const N: usize>(
    bus: B,
    buffers: &mut SerialBuffers<N>,
) -> Result<Console<'_, B, N>, ClockError> {
    let clocks = full_speed_clock::<C, _>(&bus)?;
    let _pins = C::console_pins(&bus, &clocks);
    let usart = C::console_usart(bus.clone(), &clocks, &SerialConfig::new(CONSOLE_BAUD));
    let led = C::status_led(bus, &clocks);
    let (serial, irq) = buffers.split(usart);

    #[cfg(feature = "defmt")]
    defmt::info!(
        "{=str}: console on USART{=usize} at {=u32} baud",
        C::NAME,
        C::CONSOLE_USART,
        CONSOLE_BAUD
    );

    Ok(Console {
        serial,
        irq,
        led,
        clocks,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    fn step_index(prefix: &str) -> usize {
        BOOT_SEQUENCE_STEPS
            .iter()
            .position(|s| s.contains(prefix))
            .unwrap()
    }

    #[test]
    fn clock_tree_precedes_console() {
        assert!(step_index("Clock tree") < step_index("SysTick"));
        assert!(step_index("Clock tree") < step_index("Console U(S)ART"));
    }

    #[test]
    fn handler_installed_before_interrupts_unmasked() {
        let irq = step_index("Console IRQ");
        assert_eq!(irq, BOOT_SEQUENCE_STEPS.len() - 1);
        let step = BOOT_SEQUENCE_STEPS[irq];
        assert!(step.find("install").unwrap() < step.find("RXNEIE").unwrap());
    }

    #[test]
    fn steps_are_numbered_in_order() {
        for (i, step) in BOOT_SEQUENCE_STEPS.iter().enumerate() {
            assert!(step.starts_with(&format!("{}.", i + 1)), "{step}");
        }
    }
}
