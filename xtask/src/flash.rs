use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

use crate::chip::Chip;

pub fn run(chip: Chip, release: bool) -> Result<()> {
    let mode = if release { "release" } else { "debug" };

    println!();
    println!(
        "{}",
        format!("🔨 Building firmware for {} ({mode} mode)...", chip.probe_name())
            .cyan()
            .bold()
    );
    println!();

    let build_start = Instant::now();
    let features = chip.firmware_features();
    let mut build_cmd = Command::new("cargo");
    build_cmd.args([
        "build",
        "-p",
        "firmware",
        "--target",
        chip.target(),
        "--no-default-features",
        "--features",
        features.as_str(),
    ]);

    if release {
        build_cmd.arg("--release");
    }

    let build_output = build_cmd.output().context("Failed to run cargo build")?;

    if !build_output.status.success() {
        eprintln!("{}", "✗ Build failed".red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&build_output.stderr));
        anyhow::bail!("Build failed");
    }

    println!(
        "{}",
        format!(
            "✓ Build successful in {:.2}s",
            build_start.elapsed().as_secs_f64()
        )
        .green()
    );
    println!();

    show_binary_size(chip, release);
    println!();

    // Flash with probe-rs; `run` keeps the RTT session open for defmt logs.
    println!(
        "{}",
        format!("📡 Flashing to {}...", chip.probe_name()).cyan().bold()
    );
    println!("   {}", "Connecting to probe...".dimmed());

    let flash_start = Instant::now();
    let status = Command::new("probe-rs")
        .args([
            "run",
            "--chip",
            chip.probe_name(),
            "--probe-index",
            "0",
            chip.binary_path(release).as_str(),
        ])
        .status()
        .context("Failed to run probe-rs. Is probe-rs installed? (cargo install probe-rs-tools)")?;

    if !status.success() {
        eprintln!("{}", "✗ Flash failed".red().bold());
        anyhow::bail!("Flash failed - check that the probe is connected and the device is powered");
    }

    println!(
        "{}",
        format!(
            "✓ Session ended after {:.2}s",
            flash_start.elapsed().as_secs_f64()
        )
        .green()
    );
    println!();

    Ok(())
}

/// Print section sizes if `rust-size` (cargo-binutils) is installed.
fn show_binary_size(chip: Chip, release: bool) {
    let output = Command::new("rust-size")
        .arg(chip.binary_path(release))
        .arg("-A")
        .output();

    if let Ok(out) = output {
        if out.status.success() {
            println!("{}", "📊 Binary size:".cyan());
            let size_output = String::from_utf8_lossy(&out.stdout);
            for line in size_output.lines() {
                println!("   {}", line.dimmed());
            }
        }
    }
}
