//! Millisecond timebase on the Cortex-M SysTick timer.
//!
//! [`arm`] programs SysTick from the core clock so the exception fires
//! once per millisecond; the firmware's `SysTick` handler calls
//! [`on_tick`]. The counter wraps after about 49.7 days; [`wait_ms`]
//! compares wrapping differences, so it is unaffected by the wrap.
//!
//! The handler is the only writer of the counter. It uses a plain
//! load/store pair instead of `fetch_add`, which ARMv6-M (L0) lacks.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::mmio::RegisterBus;

/// SysTick control and status register.
pub const SYST_CSR: u32 = 0xE000_E010;
/// SysTick reload value register.
pub const SYST_RVR: u32 = 0xE000_E014;
/// SysTick current value register.
pub const SYST_CVR: u32 = 0xE000_E018;

const CSR_ENABLE: u32 = 1 << 0;
const CSR_TICKINT: u32 = 1 << 1;
const CSR_CLKSOURCE_CORE: u32 = 1 << 2;

/// Ticks per second.
pub const TICK_HZ: u32 = 1_000;

/// RVR is 24 bits wide.
const RVR_MAX: u32 = 0x00FF_FFFF;

static TICKS: AtomicU32 = AtomicU32::new(0);

/// Core clock cycles per tick.
pub const fn period_for(sysclk_hz: u32) -> u32 {
    sysclk_hz / TICK_HZ
}

/// Start SysTick on the core clock with a 1 ms period.
pub fn arm<B: RegisterBus>(bus: &B, sysclk_hz: u32) {
    let reload = period_for(sysclk_hz).saturating_sub(1).min(RVR_MAX);
    bus.write(SYST_RVR, reload);
    bus.write(SYST_CVR, 0);
    bus.write(SYST_CSR, CSR_ENABLE | CSR_TICKINT | CSR_CLKSOURCE_CORE);
}

/// Advance the counter by one. Call only from the SysTick exception.
#[inline]
pub fn on_tick() {
    let now = TICKS.load(Ordering::Relaxed);
    TICKS.store(now.wrapping_add(1), Ordering::Release);
}

/// Milliseconds since SysTick was armed (wrapping).
#[inline]
pub fn millis() -> u32 {
    TICKS.load(Ordering::Acquire)
}

/// Busy-wait for at least `ms` milliseconds.
pub fn wait_ms(ms: u32) {
    let start = millis();
    while millis().wrapping_sub(start) < ms {
        core::hint::spin_loop();
    }
}
