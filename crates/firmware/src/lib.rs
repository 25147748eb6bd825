//! Bring-up firmware for STM32 boards.
//!
//! Boots the clock tree of the selected chip to full speed, starts the
//! 1 ms SysTick timebase and runs an interrupt-driven serial console.
//!
//! # Architecture
//!
//! ```text
//! Application Layer (main.rs: echo console, exception handlers)
//!         ↓
//! Boot + board wiring (boot, board, console)
//!         ↓
//! Platform (clock, tick, gpio, serial over RegisterBus)
//! ```
//!
//! # Features
//!
//! - `hardware` - Build for the target (cortex-m-rt, defmt, MMIO bus)
//! - `stm32f1` .. `stm32l4` - Chip family of the board (one at most;
//!   STM32F4 when none is given)
//!
//! # Examples
//!
//! ## Hardware Target
//!
//! ```bash
//! cargo build -p firmware --release --target thumbv7em-none-eabihf \
//!     --no-default-features --features hardware,stm32f4
//! ```
//!
//! ## Host tests
//!
//! ```bash
//! cargo test -p firmware
//! ```

#![cfg_attr(not(test), no_std)]
// Upgrade relevant warns to deny; keep pedantic as warn (too noisy for firmware)
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
// unsafe fn body is not implicitly unsafe block
// Logging discipline (allow println in tests via clippy.toml)
#![warn(clippy::print_stdout)] // prefer defmt over println! in lib code
#![warn(clippy::dbg_macro)] // dbg! should not be left in committed code
// Intentional allows for this codebase:
#![allow(clippy::module_name_repetitions)] // common in Rust crates; not a real issue
#![allow(clippy::missing_errors_doc)] // most errors are self-explanatory
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

pub mod board;
pub mod boot;
pub mod console;

pub use board::{Board, Chip};
pub use boot::{bring_up, Console, BOOT_SEQUENCE_STEPS, CONSOLE_BAUD, CONSOLE_QUEUE};
pub use console::IrqSlot;
