//! Hand-off of the console's interrupt half to its handler.

use core::cell::RefCell;

use critical_section::Mutex;

/// A value owned by an interrupt handler once installed.
///
/// The main flow installs the value once; afterwards only the handler
/// touches it, each time inside a critical section.
pub struct IrqSlot<T> {
    inner: Mutex<RefCell<Option<T>>>,
}

impl<T> IrqSlot<T> {
    /// Empty slot; `const` so it can be a `static`.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Store `value`, replacing any previous one.
    pub fn install(&self, value: T) {
        critical_section::with(|cs| {
            self.inner.borrow_ref_mut(cs).replace(value);
        });
    }

    /// Run `f` on the installed value; `None` if the slot is empty.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).as_mut().map(f))
    }

    /// `true` once a value has been installed.
    pub fn is_installed(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow_ref(cs).is_some())
    }
}

impl<T> Default for IrqSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slot_skips_handler() {
        let slot: IrqSlot<u32> = IrqSlot::new();
        assert_eq!(slot.with(|v| *v + 1), None);
        assert!(!slot.is_installed());
    }

    #[test]
    fn installed_value_is_mutable() {
        static SLOT: IrqSlot<u32> = IrqSlot::new();
        SLOT.install(41);
        SLOT.with(|v| *v += 1);
        assert_eq!(SLOT.with(|v| *v), Some(42));
    }
}
