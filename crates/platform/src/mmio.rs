//! Register access primitive.
//!
//! Every peripheral register in this crate is reached through a
//! [`RegisterBus`]: a 32-bit read or write at a fixed physical address.
//! On target the bus is [`Mmio`], where each logical access is exactly one
//! `read_volatile` / `write_volatile`. Host tests use
//! [`crate::sim::SimBus`], which stores register values in memory and
//! models the few hardware side effects the drivers depend on.
//!
//! # Bit writes are not atomic
//!
//! [`RegisterBus::write_bit`] is a read-modify-write. If an interrupt
//! handler modifies the same register between the read and the write, the
//! handler's change is lost. Main-flow code that shares a register with an
//! ISR must use [`interrupt_free_modify`].

/// Names a single bit inside a 32-bit register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitRef {
    /// Absolute register address.
    pub reg: u32,
    /// Bit index, `0..=31`.
    pub bit: u8,
}

impl BitRef {
    /// Bit `bit` of the register at `reg`.
    pub const fn new(reg: u32, bit: u8) -> Self {
        Self { reg, bit }
    }

    /// Single-bit mask for this bit.
    pub const fn mask(self) -> u32 {
        mask(self.bit)
    }
}

/// `1 << bit`, with the shift reduced modulo 32.
pub const fn mask(bit: u8) -> u32 {
    1u32.wrapping_shl(bit as u32)
}

/// Fixed-width access to memory-mapped registers.
///
/// Implementors provide the three primitive operations; the bit helpers are
/// built on top of them and never touch more than the one register named.
pub trait RegisterBus {
    /// Read the 32-bit register at `addr`.
    fn read(&self, addr: u32) -> u32;

    /// Write `value` to the 32-bit register at `addr`.
    fn write(&self, addr: u32, value: u32);

    /// Execute the processor's wait-for-event instruction.
    fn wait_for_event(&self);

    /// Read one bit of the register at `addr`.
    #[inline]
    fn read_bit(&self, addr: u32, bit: u8) -> bool {
        self.read(addr) & mask(bit) != 0
    }

    /// Set or clear one bit (non-atomic read-modify-write).
    #[inline]
    fn write_bit(&self, addr: u32, bit: u8, level: bool) {
        let value = self.read(addr);
        let value = if level { value | mask(bit) } else { value & !mask(bit) };
        self.write(addr, value);
    }

    /// `write_bit(addr, bit, true)`.
    #[inline]
    fn set_bit(&self, addr: u32, bit: u8) {
        self.write_bit(addr, bit, true);
    }

    /// `write_bit(addr, bit, false)`.
    #[inline]
    fn clear_bit(&self, addr: u32, bit: u8) {
        self.write_bit(addr, bit, false);
    }

    /// Clear the bits in `clear`, then set the bits in `set` (one read, one write).
    #[inline]
    fn modify(&self, addr: u32, clear: u32, set: u32) {
        let value = self.read(addr);
        self.write(addr, (value & !clear) | set);
    }

    /// Spin until bit `bit` of `addr` reads as `level`. No timeout.
    #[inline]
    fn wait_bit(&self, addr: u32, bit: u8, level: bool) {
        while self.read_bit(addr, bit) != level {
            core::hint::spin_loop();
        }
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for &B {
    #[inline]
    fn read(&self, addr: u32) -> u32 {
        (**self).read(addr)
    }

    #[inline]
    fn write(&self, addr: u32, value: u32) {
        (**self).write(addr, value);
    }

    #[inline]
    fn wait_for_event(&self) {
        (**self).wait_for_event();
    }
}

/// Read-modify-write of a register that an interrupt handler also writes.
///
/// The read and the write happen inside one critical section, so the ISR
/// cannot run between them.
pub fn interrupt_free_modify<B: RegisterBus>(bus: &B, addr: u32, clear: u32, set: u32) {
    critical_section::with(|_| bus.modify(addr, clear, set));
}

/// NVIC interrupt set-enable registers (`ISER0..ISER7`).
pub const NVIC_ISER: u32 = 0xE000_E100;

/// Unmask interrupt line `irq` in the NVIC.
///
/// `ISER` is write-one-to-set, so this is a plain write with no
/// read-modify-write hazard.
pub fn nvic_enable<B: RegisterBus>(bus: &B, irq: u8) {
    let word = u32::from(irq / 32);
    bus.write(NVIC_ISER.wrapping_add(word.wrapping_mul(4)), mask(irq % 32));
}

/// The physical register map of the running chip.
///
/// Zero-sized; copies are free. Every access is a single volatile load or
/// store at the given address.
#[cfg(feature = "hardware")]
#[derive(Debug, Clone, Copy)]
pub struct Mmio {
    _private: (),
}

#[cfg(feature = "hardware")]
impl Mmio {
    /// Create a handle to the physical register map.
    ///
    /// # Safety
    ///
    /// The caller must be running on the chip family whose addresses are
    /// passed to this bus. Any address handed to [`RegisterBus::read`] or
    /// [`RegisterBus::write`] is dereferenced without checks.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

#[cfg(feature = "hardware")]
impl RegisterBus for Mmio {
    #[inline(always)]
    fn read(&self, addr: u32) -> u32 {
        // SAFETY: `Mmio::new` contract: `addr` is a valid, aligned register
        // address on the running chip.
        unsafe { core::ptr::read_volatile(addr as usize as *const u32) }
    }

    #[inline(always)]
    fn write(&self, addr: u32, value: u32) {
        // SAFETY: see `read`.
        unsafe { core::ptr::write_volatile(addr as usize as *mut u32, value) }
    }

    #[inline(always)]
    fn wait_for_event(&self) {
        cortex_m::asm::wfe();
    }
}
