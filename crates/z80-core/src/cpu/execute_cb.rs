//! CB-prefixed instruction execution: shifts, rotates, BIT, RES, SET.

use crate::alu::{self, ShiftOp};
use crate::bus::Bus;
use crate::flags::{CF, HF, PF, SF, XF, YF, ZF};
use crate::tables;

use super::Z80;

impl Z80 {
    /// Execute a CB-prefixed instruction and return its base T-states.
    pub(super) fn execute_cb<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let op = self.fetch_opcode(bus);
        let r = op & 7;

        match op {
            // Shift/rotate (function selected by bits 5-3)
            0x00..=0x3F => {
                let value = if r == 6 {
                    bus.mem_read(self.regs.hl())
                } else {
                    self.get_reg8(r)
                };
                let carry = self.regs.f & CF != 0;
                let (result, flags) = alu::shift(ShiftOp::from_opcode(op), value, carry);
                self.regs.f = flags;
                if r == 6 {
                    bus.mem_write(self.regs.hl(), result);
                } else {
                    self.set_reg8(r, result);
                }
            }

            // BIT n, r
            0x40..=0x7F => {
                let value = if r == 6 {
                    bus.mem_read(self.regs.hl())
                } else {
                    self.get_reg8(r)
                };
                self.bit_flags(op, value);
            }

            // RES n, r / SET n, r
            _ => {
                let value = if r == 6 {
                    bus.mem_read(self.regs.hl())
                } else {
                    self.get_reg8(r)
                };
                let result = Self::res_set(op, value);
                if r == 6 {
                    bus.mem_write(self.regs.hl(), result);
                } else {
                    self.set_reg8(r, result);
                }
            }
        }

        tables::CYCLES_CB[op as usize]
    }

    /// Flags for BIT n: Z from the inverted bit, P mirroring Z, H set,
    /// N clear, C preserved. S only appears when bit 7 tests non-zero,
    /// and X/Y follow the bit-number pattern (Y for bit 5, X for bit 3,
    /// both only on a non-zero test).
    pub(super) fn bit_flags(&mut self, op: u8, value: u8) {
        let bit = (op >> 3) & 7;
        let is_zero = value & (1 << bit) == 0;

        let mut flags = (self.regs.f & CF) | HF;
        if is_zero {
            flags |= ZF | PF;
        }
        if bit == 7 && !is_zero {
            flags |= SF;
        }
        if bit == 5 && !is_zero {
            flags |= YF;
        }
        if bit == 3 && !is_zero {
            flags |= XF;
        }
        self.regs.f = flags;
    }

    /// RES/SET transform for CB opcodes 0x80-0xFF. No flags.
    pub(super) fn res_set(op: u8, value: u8) -> u8 {
        let bit = (op >> 3) & 7;
        if op & 0x40 == 0 {
            value & !(1 << bit)
        } else {
            value | (1 << bit)
        }
    }
}
