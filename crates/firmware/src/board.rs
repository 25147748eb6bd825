//! Board wiring per chip family: console U(S)ART, its pins and the status LED.
//!
//! | Family | Console | TX / RX     | AF | LED  |
//! |--------|---------|-------------|----|------|
//! | F1     | USART1  | PA9 / PA10  | -  | PC13 |
//! | F3     | USART1  | PA9 / PA10  | 7  | PE9  |
//! | F4     | USART1  | PA9 / PA10  | 7  | PD12 |
//! | F7     | USART1  | PA9 / PA10  | 7  | PB0  |
//! | H7     | USART1  | PA9 / PA10  | 7  | PB0  |
//! | L0     | USART2  | PA2 / PA3   | 4  | PA5  |
//! | L4     | USART1  | PA9 / PA10  | 7  | PB3  |

use platform::clock::{ClockTree, SystemClocks};
use platform::family::{Stm32F1, Stm32F3, Stm32F4, Stm32F7, Stm32H7, Stm32L0, Stm32L4};
use platform::gpio::{GpioPin, Pin, PinMode, Speed};
use platform::mmio::RegisterBus;
use platform::serial::{SerialConfig, UsartDev};

/// How a board connects its console and status LED.
pub trait Board: ClockTree {
    /// Console U(S)ART number (1-based), for logs.
    const CONSOLE_USART: usize;

    /// Configure the console TX and RX pins.
    fn console_pins<B: RegisterBus + Clone>(bus: &B, clocks: &SystemClocks) -> (GpioPin<B>, GpioPin<B>);

    /// Bring up the console U(S)ART.
    fn console_usart<B: RegisterBus>(bus: B, clocks: &SystemClocks, config: &SerialConfig) -> UsartDev<B>;

    /// Configure the status LED as a push-pull output.
    fn status_led<B: RegisterBus>(bus: B, clocks: &SystemClocks) -> GpioPin<B>;
}

const TX: PinMode = PinMode::AltOut(Speed::High);
const LED: PinMode = PinMode::Out(Speed::Low);

/// Implements [`Board`] for a family from its wiring.
macro_rules! board {
    ($family:ty, usart $n:literal, tx ($tp:literal, $tn:literal), rx ($rp:literal, $rn:literal), rx_mode $rx_mode:expr, af $af:literal, led ($lp:literal, $ln:literal)) => {
        impl Board for $family {
            const CONSOLE_USART: usize = $n;

            fn console_pins<B: RegisterBus + Clone>(
                bus: &B,
                clocks: &SystemClocks,
            ) -> (GpioPin<B>, GpioPin<B>) {
                (
                    Pin::<$family, $tp, $tn>::configure(bus.clone(), clocks, TX, $af),
                    Pin::<$family, $rp, $rn>::configure(bus.clone(), clocks, $rx_mode, $af),
                )
            }

            fn console_usart<B: RegisterBus>(
                bus: B,
                clocks: &SystemClocks,
                config: &SerialConfig,
            ) -> UsartDev<B> {
                UsartDev::init::<$family, $n>(bus, clocks, config)
            }

            fn status_led<B: RegisterBus>(bus: B, clocks: &SystemClocks) -> GpioPin<B> {
                Pin::<$family, $lp, $ln>::configure(bus, clocks, LED, 0)
            }
        }
    };
}

// F1 has no AF number: RX is a floating input, remapping lives in AFIO.
board!(Stm32F1, usart 1, tx ('A', 9), rx ('A', 10), rx_mode PinMode::InFloat, af 0, led ('C', 13));
board!(Stm32F3, usart 1, tx ('A', 9), rx ('A', 10), rx_mode PinMode::AltOut(Speed::High), af 7, led ('E', 9));
board!(Stm32F4, usart 1, tx ('A', 9), rx ('A', 10), rx_mode PinMode::AltOut(Speed::High), af 7, led ('D', 12));
board!(Stm32F7, usart 1, tx ('A', 9), rx ('A', 10), rx_mode PinMode::AltOut(Speed::High), af 7, led ('B', 0));
board!(Stm32H7, usart 1, tx ('A', 9), rx ('A', 10), rx_mode PinMode::AltOut(Speed::High), af 7, led ('B', 0));
board!(Stm32L0, usart 2, tx ('A', 2), rx ('A', 3), rx_mode PinMode::AltOut(Speed::High), af 4, led ('A', 5));
board!(Stm32L4, usart 1, tx ('A', 9), rx ('A', 10), rx_mode PinMode::AltOut(Speed::High), af 7, led ('B', 3));

#[cfg(any(
    all(feature = "stm32f1", any(feature = "stm32f3", feature = "stm32f4", feature = "stm32f7", feature = "stm32h7", feature = "stm32l0", feature = "stm32l4")),
    all(feature = "stm32f3", any(feature = "stm32f4", feature = "stm32f7", feature = "stm32h7", feature = "stm32l0", feature = "stm32l4")),
    all(feature = "stm32f4", any(feature = "stm32f7", feature = "stm32h7", feature = "stm32l0", feature = "stm32l4")),
    all(feature = "stm32f7", any(feature = "stm32h7", feature = "stm32l0", feature = "stm32l4")),
    all(feature = "stm32h7", any(feature = "stm32l0", feature = "stm32l4")),
    all(feature = "stm32l0", feature = "stm32l4"),
))]
compile_error!("select at most one chip feature");

/// The chip this firmware is built for.
#[cfg(feature = "stm32f1")]
pub type Chip = Stm32F1;
/// The chip this firmware is built for.
#[cfg(feature = "stm32f3")]
pub type Chip = Stm32F3;
/// The chip this firmware is built for.
#[cfg(feature = "stm32f7")]
pub type Chip = Stm32F7;
/// The chip this firmware is built for.
#[cfg(feature = "stm32h7")]
pub type Chip = Stm32H7;
/// The chip this firmware is built for.
#[cfg(feature = "stm32l0")]
pub type Chip = Stm32L0;
/// The chip this firmware is built for.
#[cfg(feature = "stm32l4")]
pub type Chip = Stm32L4;
/// The chip this firmware is built for (STM32F4 when no chip feature is set).
#[cfg(not(any(
    feature = "stm32f1",
    feature = "stm32f3",
    feature = "stm32f7",
    feature = "stm32h7",
    feature = "stm32l0",
    feature = "stm32l4"
)))]
pub type Chip = Stm32F4;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use platform::clock::full_speed_clock;
    use platform::sim::SimBus;

    #[test]
    fn f4_console_pins_use_af7() {
        let bus = SimBus::for_family::<Stm32F4>();
        let clocks = full_speed_clock::<Stm32F4, _>(&bus).unwrap();
        let (tx, rx) = Stm32F4::console_pins(&&bus, &clocks);
        assert_eq!((tx.number(), rx.number()), (9, 10));
        // GPIOA AFRH: pins 9 and 10 on AF7.
        assert_eq!(bus.peek(0x4002_0024) & 0xFF0, 0x770);
        // MODER: both alternate function.
        assert_eq!((bus.peek(0x4002_0000) >> 18) & 0b1111, 0b1010);
    }

    #[test]
    fn f1_rx_is_floating_input() {
        let bus = SimBus::for_family::<Stm32F1>();
        let clocks = full_speed_clock::<Stm32F1, _>(&bus).unwrap();
        let _ = Stm32F1::console_pins(&&bus, &clocks);
        // GPIOA CRH: PA9 = AF push-pull 50 MHz (0xB), PA10 = floating input (0x4).
        assert_eq!(bus.peek(0x4001_0804) & 0xFF0, 0x4B0);
    }

    #[test]
    fn l0_console_is_usart2() {
        let bus = SimBus::for_family::<Stm32L0>();
        let clocks = full_speed_clock::<Stm32L0, _>(&bus).unwrap();
        let dev = Stm32L0::console_usart(&bus, &clocks, &SerialConfig::default());
        assert_eq!(Stm32L0::CONSOLE_USART, 2);
        assert_eq!(dev.irq(), Some(28));
        assert_eq!(dev.regs().brr, 0x4000_440C);
    }

    #[test]
    fn led_drives_through_bsrr() {
        let bus = SimBus::for_family::<Stm32F1>();
        let clocks = full_speed_clock::<Stm32F1, _>(&bus).unwrap();
        let led = Stm32F1::status_led(&bus, &clocks);
        bus.clear_log();
        led.write(true);
        assert_eq!(bus.writes(), vec![(0x4001_1010, 1 << 13)]);
    }
}
