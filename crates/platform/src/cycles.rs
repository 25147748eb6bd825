//! Core cycle counter (DWT `CYCCNT`) for timing short sections.
//!
//! Present on Cortex-M3 and up. The L0's Cortex-M0+ has no `CYCCNT`, so
//! [`count`] means nothing there.

use crate::mmio::RegisterBus;

/// Debug exception and monitor control register.
pub const DEMCR: u32 = 0xE000_EDFC;
/// DWT control register.
pub const DWT_CTRL: u32 = 0xE000_1000;
/// DWT cycle count register.
pub const DWT_CYCCNT: u32 = 0xE000_1004;

/// DEMCR: trace blocks (DWT, ITM) enabled.
const DEMCR_TRCENA: u8 = 24;
const CTRL_CYCCNTENA: u8 = 0;

/// Power the DWT, zero the counter and start it.
pub fn start<B: RegisterBus>(bus: &B) {
    bus.set_bit(DEMCR, DEMCR_TRCENA);
    bus.write(DWT_CYCCNT, 0);
    bus.set_bit(DWT_CTRL, CTRL_CYCCNTENA);
}

/// Freeze the counter at its current value.
pub fn stop<B: RegisterBus>(bus: &B) {
    bus.clear_bit(DWT_CTRL, CTRL_CYCCNTENA);
}

/// Core cycles since [`start`] (wraps every 2^32 cycles).
#[inline]
pub fn count<B: RegisterBus>(bus: &B) -> u32 {
    bus.read(DWT_CYCCNT)
}

/// Cycles elapsed since the counter read `since`, across one wrap.
#[inline]
pub fn cycles_since<B: RegisterBus>(bus: &B, since: u32) -> u32 {
    count(bus).wrapping_sub(since)
}
