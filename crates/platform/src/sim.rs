//! Simulated register bus for host tests.
//!
//! [`SimBus`] keeps every register in a map (unwritten registers read as
//! zero) and logs each access in order. Silicon side effects that the
//! drivers poll on are modelled with a small set of [`Rule`]s:
//!
//! - [`Rule::Follow`]: a status field mirrors a request field after every
//!   write to the request register (oscillator ready bits, clock switch
//!   status).
//! - [`Rule::ReadClears`]: reading a data register clears a flag (USART
//!   receive-not-empty).
//! - [`Rule::WriteOneToClear`]: writing a clear register clears the
//!   matching flags in a status register (USART ICR).
//!
//! [`SimBus::poke`] and [`SimBus::peek`] stand in for the hardware side:
//! they change or inspect register state without being logged and without
//! triggering rules. [`SimBus::queue_reads`] feeds a register a value per
//! read, for inputs that change while a driver samples them (bit-banged
//! data lines).

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::vec::Vec;

use crate::clock::{ClockTree, Handshake, SwitchField};
use crate::mmio::{mask, BitRef, RegisterBus};
use crate::serial::UsartRegs;

/// One logged register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// `read(addr)` returned `value`.
    Read {
        /// Register address.
        addr: u32,
        /// Value returned to the driver.
        value: u32,
    },
    /// `write(addr, value)`.
    Write {
        /// Register address.
        addr: u32,
        /// Value written by the driver.
        value: u32,
    },
}

/// A modelled hardware side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// After a write to `from`, copy `width` bits at `from_shift` into `to`
    /// at `to_shift`.
    Follow {
        /// Request register.
        from: u32,
        /// Lowest bit of the request field.
        from_shift: u8,
        /// Status register (may equal `from`).
        to: u32,
        /// Lowest bit of the status field.
        to_shift: u8,
        /// Field width in bits.
        width: u8,
    },
    /// Reading `data` clears `flag`.
    ReadClears {
        /// Data register.
        data: u32,
        /// Status flag cleared by the read.
        flag: BitRef,
    },
    /// Writing `reg` clears, in `target`, every bit written as one.
    WriteOneToClear {
        /// Clear register.
        reg: u32,
        /// Status register.
        target: u32,
    },
}

impl From<Handshake> for Rule {
    fn from(h: Handshake) -> Self {
        Rule::Follow {
            from: h.request.reg,
            from_shift: h.request.bit,
            to: h.ready.reg,
            to_shift: h.ready.bit,
            width: 1,
        }
    }
}

impl From<SwitchField> for Rule {
    fn from(s: SwitchField) -> Self {
        Rule::Follow {
            from: s.reg,
            from_shift: s.request_shift,
            to: s.reg,
            to_shift: s.status_shift,
            width: s.width,
        }
    }
}

/// In-memory register file with an access log.
#[derive(Debug, Default)]
pub struct SimBus {
    regs: RefCell<BTreeMap<u32, u32>>,
    log: RefCell<Vec<Access>>,
    rules: RefCell<Vec<Rule>>,
    queued: RefCell<BTreeMap<u32, VecDeque<u32>>>,
    events: Cell<usize>,
}

#[allow(clippy::arithmetic_side_effects)] // field masks are built from widths <= 32
fn field_mask(width: u8) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        mask(width) - 1
    }
}

impl SimBus {
    /// Empty bus: every register reads zero, no rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus with the oscillator handshakes and clock switch of `C` modelled,
    /// so that `clock::bring_up::<C, _>` completes.
    pub fn for_family<C: ClockTree>() -> Self {
        let bus = Self::new();
        for &handshake in C::HANDSHAKES {
            bus.add_rule(handshake.into());
        }
        bus.add_rule(C::SWITCH.into());
        bus
    }

    /// Model a U(S)ART: reading the receive data register clears RXNE and,
    /// on parts with an ICR, writing it clears the matching status flags.
    pub fn model_usart(&self, regs: &UsartRegs) {
        self.add_rule(Rule::ReadClears {
            data: regs.rx_data,
            flag: regs.rxne(),
        });
        if let Some(icr) = regs.icr {
            self.add_rule(Rule::WriteOneToClear {
                reg: icr,
                target: regs.status,
            });
        }
    }

    /// Make the next reads of `addr` return `values`, one per read, in
    /// order. Each queued value is stored when read, so once the queue runs
    /// out the register keeps the last one.
    pub fn queue_reads(&self, addr: u32, values: impl IntoIterator<Item = u32>) {
        self.queued.borrow_mut().entry(addr).or_default().extend(values);
    }

    /// Install an additional side-effect rule.
    pub fn add_rule(&self, rule: Rule) {
        self.rules.borrow_mut().push(rule);
    }

    /// Set a register from the hardware side (not logged, no rules).
    pub fn poke(&self, addr: u32, value: u32) {
        self.regs.borrow_mut().insert(addr, value);
    }

    /// Set or clear one bit from the hardware side.
    pub fn poke_bit(&self, addr: u32, bit: u8, level: bool) {
        let value = self.peek(addr);
        let value = if level { value | mask(bit) } else { value & !mask(bit) };
        self.poke(addr, value);
    }

    /// Current register value, without logging or side effects.
    pub fn peek(&self, addr: u32) -> u32 {
        self.regs.borrow().get(&addr).copied().unwrap_or(0)
    }

    /// Every access so far, oldest first.
    pub fn accesses(&self) -> Vec<Access> {
        self.log.borrow().clone()
    }

    /// Every write so far as `(addr, value)`, oldest first.
    pub fn writes(&self) -> Vec<(u32, u32)> {
        self.log
            .borrow()
            .iter()
            .filter_map(|a| match *a {
                Access::Write { addr, value } => Some((addr, value)),
                Access::Read { .. } => None,
            })
            .collect()
    }

    /// Values written to `addr`, oldest first.
    pub fn writes_to(&self, addr: u32) -> Vec<u32> {
        self.writes()
            .into_iter()
            .filter(|&(a, _)| a == addr)
            .map(|(_, v)| v)
            .collect()
    }

    /// Forget the access log (register values are kept).
    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }

    /// Number of wait-for-event instructions executed.
    pub fn events(&self) -> usize {
        self.events.get()
    }

    fn apply_write_rules(&self, addr: u32, value: u32) {
        let rules = self.rules.borrow();
        for rule in rules.iter() {
            match *rule {
                Rule::Follow {
                    from,
                    from_shift,
                    to,
                    to_shift,
                    width,
                } if from == addr => {
                    let field = field_mask(width);
                    let requested = value.wrapping_shr(u32::from(from_shift)) & field;
                    let status = self.peek(to) & !field.wrapping_shl(u32::from(to_shift));
                    self.poke(to, status | requested.wrapping_shl(u32::from(to_shift)));
                }
                Rule::WriteOneToClear { reg, target } if reg == addr => {
                    let status = self.peek(target);
                    self.poke(target, status & !value);
                }
                _ => {}
            }
        }
    }

    fn apply_read_rules(&self, addr: u32) {
        let rules = self.rules.borrow();
        for rule in rules.iter() {
            if let Rule::ReadClears { data, flag } = *rule {
                if data == addr {
                    self.poke_bit(flag.reg, flag.bit, false);
                }
            }
        }
    }
}

impl RegisterBus for SimBus {
    fn read(&self, addr: u32) -> u32 {
        let next = self.queued.borrow_mut().get_mut(&addr).and_then(VecDeque::pop_front);
        if let Some(next) = next {
            self.poke(addr, next);
        }
        let value = self.peek(addr);
        self.log.borrow_mut().push(Access::Read { addr, value });
        self.apply_read_rules(addr);
        value
    }

    fn write(&self, addr: u32, value: u32) {
        self.log.borrow_mut().push(Access::Write { addr, value });
        self.poke(addr, value);
        self.apply_write_rules(addr, value);
    }

    fn wait_for_event(&self) {
        self.events.set(self.events.get().wrapping_add(1));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unwritten_registers_read_zero() {
        let bus = SimBus::new();
        assert_eq!(bus.read(0x4002_1000), 0);
    }

    #[test]
    fn follow_rule_mirrors_request_field() {
        let bus = SimBus::new();
        bus.add_rule(Rule::Follow {
            from: 0x10,
            from_shift: 0,
            to: 0x10,
            to_shift: 2,
            width: 2,
        });
        bus.write(0x10, 0b10);
        assert_eq!(bus.peek(0x10), 0b1010);
        bus.write(0x10, 0b01);
        assert_eq!(bus.peek(0x10), 0b0101);
    }

    #[test]
    fn read_clears_after_returning_value() {
        let bus = SimBus::new();
        bus.add_rule(Rule::ReadClears {
            data: 0x24,
            flag: BitRef::new(0x1C, 5),
        });
        bus.poke(0x1C, 1 << 5);
        bus.poke(0x24, u32::from(b'x'));
        assert_eq!(bus.read(0x1C), 1 << 5);
        assert_eq!(bus.read(0x24), u32::from(b'x'));
        assert_eq!(bus.peek(0x1C), 0);
    }

    #[test]
    fn write_one_to_clear_only_touches_written_bits() {
        let bus = SimBus::new();
        bus.add_rule(Rule::WriteOneToClear {
            reg: 0x20,
            target: 0x1C,
        });
        bus.poke(0x1C, 0b1010_1111);
        bus.write(0x20, 0x0F);
        assert_eq!(bus.peek(0x1C), 0b1010_0000);
    }

    #[test]
    fn queued_reads_come_back_in_order_then_stick() {
        let bus = SimBus::new();
        bus.queue_reads(0x10, [1, 0, 1]);
        let seen: Vec<u32> = (0..5).map(|_| bus.read(0x10)).collect();
        assert_eq!(seen, vec![1, 0, 1, 1, 1]);
        assert_eq!(bus.peek(0x10), 1);
    }

    #[test]
    fn log_keeps_order_and_kind() {
        let bus = SimBus::new();
        bus.write(4, 1);
        let _ = bus.read(4);
        assert_eq!(
            bus.accesses(),
            vec![
                Access::Write { addr: 4, value: 1 },
                Access::Read { addr: 4, value: 1 }
            ]
        );
        bus.clear_log();
        assert!(bus.accesses().is_empty());
        assert_eq!(bus.peek(4), 1);
    }
}
