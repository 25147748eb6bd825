//! Register-level hardware layer for STM32 microcontrollers.
//!
//! Everything here talks to silicon through one primitive, [`RegisterBus`],
//! so the same drivers run on target (over [`mmio::Mmio`]) and in host
//! tests (over [`sim::SimBus`]).
//!
//! # Layers
//!
//! ```text
//! Application (firmware crate: boot, console echo loop)
//!         ↓
//! Drivers (clock bring-up, SysTick, GPIO, serial, bit-banged SPI/I2C)
//!         ↓
//! Identity model (chip family tables: base, clock enable, IRQ)
//!         ↓
//! Register access (RegisterBus: read / write / bit helpers / WFE)
//! ```
//!
//! # Modules
//!
//! - [`mmio`] - register access primitive
//! - [`family`] - per-family peripheral tables and compile-time handles
//! - [`clock`] - clock & power bring-up state machine
//! - [`tick`] - 1 ms SysTick timebase
//! - [`cycles`] - DWT core cycle counter
//! - [`gpio`] - pin configuration (CRL and MODER layouts)
//! - [`ring_buffer`] - lock-free SPSC byte queue
//! - [`serial`] - polled and interrupt-driven U(S)ART
//! - [`spi_bitbang`], [`i2c_bitbang`] - bus masters on plain GPIO pins
//!
//! # Features
//!
//! - `std`: host build with [`sim::SimBus`] (default; tests and tooling)
//! - `hardware`: [`mmio::Mmio`] volatile bus and the Cortex-M WFE
//! - `defmt`: defmt logging and `defmt::Format` on public types
//!
//! # Example
//!
//! ```
//! use platform::clock::full_speed_clock;
//! use platform::family::Stm32F4;
//! use platform::serial::{SerialConfig, UsartDev};
//! use platform::sim::SimBus;
//!
//! let bus = SimBus::for_family::<Stm32F4>();
//! let clocks = full_speed_clock::<Stm32F4, _>(&bus).unwrap();
//! assert_eq!(clocks.sysclk_hz(), 168_000_000);
//! let _console = UsartDev::init::<Stm32F4, 2>(&bus, &clocks, &SerialConfig::default());
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer defmt over println! in lib code
// Pedantic lints suppressed for this hardware crate:
#![allow(clippy::doc_markdown)] // hex addresses and register names in doc comments
#![allow(clippy::must_use_candidate)] // register accessors, callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::unreadable_literal)] // register values follow reference-manual grouping

pub mod clock;
pub mod cycles;
pub mod family;
pub mod gpio;
pub mod i2c_bitbang;
pub mod mmio;
pub mod ring_buffer;
pub mod serial;
#[cfg(any(test, feature = "std"))]
pub mod sim;
pub mod spi_bitbang;
pub mod tick;

pub use clock::{ClockConfig, ClockError, ClockTree, PollLimit, PowerDownMode, SystemClocks};
pub use family::{BusDomain, ChipFamily, PeripheralInfo, Port, Usart};
pub use gpio::{GpioPin, Pin, PinMode, Speed};
pub use i2c_bitbang::I2cBitBang;
pub use mmio::{BitRef, RegisterBus};
pub use ring_buffer::RingBuffer;
pub use serial::{BufferedSerial, SerialBuffers, SerialConfig, SerialIrq, UsartDev};
pub use spi_bitbang::SpiBitBang;
