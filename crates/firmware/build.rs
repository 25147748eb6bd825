//! Emits `memory.x` for the selected chip on hardware builds.
//!
//! Cargo exposes features to build scripts as `CARGO_FEATURE_*` variables,
//! so the chip is picked here at run time rather than with `cfg`.

use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;

/// (feature, flash origin, flash length, RAM origin, RAM length)
const MEMORY: &[(&str, &str, &str, &str, &str)] = &[
    ("STM32F1", "0x08000000", "64K", "0x20000000", "20K"),
    ("STM32F3", "0x08000000", "256K", "0x20000000", "40K"),
    ("STM32F4", "0x08000000", "1024K", "0x20000000", "128K"),
    ("STM32F7", "0x08000000", "1024K", "0x20000000", "320K"),
    // DTCM: reachable at reset, before any RAM clock is enabled.
    ("STM32H7", "0x08000000", "2048K", "0x20000000", "128K"),
    ("STM32L0", "0x08000000", "64K", "0x20000000", "8K"),
    ("STM32L4", "0x08000000", "256K", "0x20000000", "64K"),
];

fn main() -> io::Result<()> {
    println!("cargo:rerun-if-changed=build.rs");

    // Only run linker script setup for hardware builds
    if env::var_os("CARGO_FEATURE_HARDWARE").is_none() {
        return Ok(());
    }

    let selected: Vec<_> = MEMORY
        .iter()
        .filter(|(chip, ..)| env::var_os(format!("CARGO_FEATURE_{chip}")).is_some())
        .collect();
    let &&(chip, flash, flash_len, ram, ram_len) = match selected.as_slice() {
        [one] => one,
        [] => return Err(io::Error::other("hardware build needs a chip feature (e.g. stm32f4)")),
        _ => return Err(io::Error::other("select exactly one chip feature")),
    };

    let memory_x = format!(
        "/* {chip} */\nMEMORY\n{{\n  FLASH : ORIGIN = {flash}, LENGTH = {flash_len}\n  RAM : ORIGIN = {ram}, LENGTH = {ram_len}\n}}\n"
    );

    // Put `memory.x` in our output directory and ensure it's on the linker search path.
    let out = PathBuf::from(
        env::var_os("OUT_DIR").ok_or_else(|| io::Error::other("OUT_DIR not set"))?,
    );
    fs::write(out.join("memory.x"), memory_x)?;
    println!("cargo:rustc-link-search={}", out.display());
    Ok(())
}
