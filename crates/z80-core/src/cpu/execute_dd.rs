//! DD-prefixed (index) instruction execution, including DDCB.
//!
//! These handlers operate on IX. The FD prefix reuses them with IY
//! swapped into IX around the call, which is observationally identical
//! and avoids a duplicate table.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]

use crate::alu::{self, ShiftOp};
use crate::bus::Bus;
use crate::flags::{CF, PF, SF, ZF};
use crate::tables;

use super::Z80;

impl Z80 {
    /// Execute after a DD (or, via the swap, FD) prefix byte and return
    /// the instruction's base T-states.
    ///
    /// The continuation byte is peeked first: when it is not a DD opcode
    /// the prefix degrades to a NOP and PC is left pointing at the byte,
    /// so the next `step()` re-decodes it unprefixed.
    pub(super) fn execute_index<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let op = bus.mem_read(self.regs.pc);

        if op == 0xCB {
            self.regs.pc = self.regs.pc.wrapping_add(1);
            self.regs.inc_r();
            return self.execute_index_cb(bus);
        }
        if tables::CYCLES_DD[op as usize] == 0 {
            return 4;
        }

        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.regs.inc_r();
        self.execute_index_op(bus, op);
        tables::CYCLES_DD[op as usize]
    }

    fn execute_index_op<B: Bus + ?Sized>(&mut self, bus: &mut B, op: u8) {
        match op {
            // ADD IX, rr (09=BC, 19=DE, 29=IX, 39=SP)
            0x09 | 0x19 | 0x29 | 0x39 => {
                let operand = match (op >> 4) & 3 {
                    0 => self.regs.bc(),
                    1 => self.regs.de(),
                    2 => self.regs.ix,
                    _ => self.regs.sp,
                };
                let (result, flags) = alu::add16(self.regs.ix, operand);
                self.regs.ix = result;
                self.regs.f = (self.regs.f & (SF | ZF | PF)) | flags;
            }

            // LD IX, nn
            0x21 => self.regs.ix = self.fetch_word(bus),

            // LD (nn), IX
            0x22 => {
                let addr = self.fetch_word(bus);
                let ix = self.regs.ix;
                self.write_word(bus, addr, ix);
            }

            // INC IX / DEC IX
            0x23 => self.regs.ix = self.regs.ix.wrapping_add(1),
            0x2B => self.regs.ix = self.regs.ix.wrapping_sub(1),

            // INC/DEC IXH, INC/DEC IXL (undocumented)
            0x24 => {
                let (result, flags) = alu::inc8(self.ixh());
                self.set_ixh(result);
                self.regs.f = (self.regs.f & CF) | flags;
            }
            0x25 => {
                let (result, flags) = alu::dec8(self.ixh());
                self.set_ixh(result);
                self.regs.f = (self.regs.f & CF) | flags;
            }
            0x2C => {
                let (result, flags) = alu::inc8(self.ixl());
                self.set_ixl(result);
                self.regs.f = (self.regs.f & CF) | flags;
            }
            0x2D => {
                let (result, flags) = alu::dec8(self.ixl());
                self.set_ixl(result);
                self.regs.f = (self.regs.f & CF) | flags;
            }

            // LD IXH, n / LD IXL, n (undocumented)
            0x26 => {
                let value = self.fetch_byte(bus);
                self.set_ixh(value);
            }
            0x2E => {
                let value = self.fetch_byte(bus);
                self.set_ixl(value);
            }

            // LD IX, (nn)
            0x2A => {
                let addr = self.fetch_word(bus);
                self.regs.ix = self.read_word(bus, addr);
            }

            // INC (IX+d) / DEC (IX+d)
            0x34 => {
                let addr = self.index_addr(bus);
                let (result, flags) = alu::inc8(bus.mem_read(addr));
                bus.mem_write(addr, result);
                self.regs.f = (self.regs.f & CF) | flags;
            }
            0x35 => {
                let addr = self.index_addr(bus);
                let (result, flags) = alu::dec8(bus.mem_read(addr));
                bus.mem_write(addr, result);
                self.regs.f = (self.regs.f & CF) | flags;
            }

            // LD (IX+d), n
            0x36 => {
                let addr = self.index_addr(bus);
                let value = self.fetch_byte(bus);
                bus.mem_write(addr, value);
            }

            // LD r, IXH / LD r, IXL (undocumented; r = B, C, D, E, A)
            0x44 | 0x4C | 0x54 | 0x5C | 0x7C => {
                let value = self.ixh();
                self.set_reg8((op >> 3) & 7, value);
            }
            0x45 | 0x4D | 0x55 | 0x5D | 0x7D => {
                let value = self.ixl();
                self.set_reg8((op >> 3) & 7, value);
            }

            // LD r, (IX+d) - destinations H and L are the real registers.
            0x46 | 0x4E | 0x56 | 0x5E | 0x66 | 0x6E | 0x7E => {
                let addr = self.index_addr(bus);
                let value = bus.mem_read(addr);
                self.set_reg8((op >> 3) & 7, value);
            }

            // LD IXH, r / LD IXL, r (undocumented; sources H and L read
            // IXH and IXL, not the real registers)
            0x60..=0x65 | 0x67 => {
                let value = self.index_source(op);
                self.set_ixh(value);
            }
            0x68..=0x6D | 0x6F => {
                let value = self.index_source(op);
                self.set_ixl(value);
            }

            // LD (IX+d), r - sources H and L are the real registers.
            0x70..=0x75 | 0x77 => {
                let addr = self.index_addr(bus);
                let value = self.get_reg8(op & 7);
                bus.mem_write(addr, value);
            }

            // ALU A, IXH / ALU A, IXL (undocumented)
            0x84 | 0x8C | 0x94 | 0x9C | 0xA4 | 0xAC | 0xB4 | 0xBC => {
                let value = self.ixh();
                self.alu_a(op, value);
            }
            0x85 | 0x8D | 0x95 | 0x9D | 0xA5 | 0xAD | 0xB5 | 0xBD => {
                let value = self.ixl();
                self.alu_a(op, value);
            }

            // ALU A, (IX+d)
            0x86 | 0x8E | 0x96 | 0x9E | 0xA6 | 0xAE | 0xB6 | 0xBE => {
                let addr = self.index_addr(bus);
                let value = bus.mem_read(addr);
                self.alu_a(op, value);
            }

            // POP IX / PUSH IX
            0xE1 => self.regs.ix = self.pop_word(bus),
            0xE5 => {
                let ix = self.regs.ix;
                self.push_word(bus, ix);
            }

            // EX (SP), IX
            0xE3 => {
                let sp = self.regs.sp;
                let value = self.read_word(bus, sp);
                let ix = self.regs.ix;
                self.write_word(bus, sp, ix);
                self.regs.ix = value;
            }

            // JP (IX)
            0xE9 => self.regs.pc = self.regs.ix,

            // LD SP, IX
            0xF9 => self.regs.sp = self.regs.ix,

            _ => unreachable!("filtered by the DD cycle table"),
        }
    }

    /// Execute a DDCB/FDCB instruction: displacement byte, then the
    /// sub-opcode. Shift/rotate and RES/SET write the transformed byte
    /// back to (IX+d) and, for non-(HL) target encodings, mirror it into
    /// the selected register - the classic undocumented side effect.
    fn execute_index_cb<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let addr = self.index_addr(bus);
        let op = self.fetch_byte(bus);
        let target = op & 7;

        match op {
            // Shift/rotate
            0x00..=0x3F => {
                let value = bus.mem_read(addr);
                let carry = self.regs.f & CF != 0;
                let (result, flags) = alu::shift(ShiftOp::from_opcode(op), value, carry);
                self.regs.f = flags;
                bus.mem_write(addr, result);
                if target != 6 {
                    self.set_reg8(target, result);
                }
            }

            // BIT n, (IX+d) - read-only
            0x40..=0x7F => {
                let value = bus.mem_read(addr);
                self.bit_flags(op, value);
            }

            // RES / SET
            _ => {
                let value = bus.mem_read(addr);
                let result = Self::res_set(op, value);
                bus.mem_write(addr, result);
                if target != 6 {
                    self.set_reg8(target, result);
                }
            }
        }

        tables::CYCLES_CB[op as usize] + tables::DDCB_EXTRA
    }

    /// Effective address IX + signed displacement, fetched at PC.
    fn index_addr<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u16 {
        let displacement = self.fetch_byte(bus);
        self.regs.ix.wrapping_add((displacement as i8) as u16)
    }

    /// Source operand for the undocumented LD IXH/IXL, r forms: encodings
    /// 4 and 5 select IXH and IXL instead of H and L.
    fn index_source(&self, op: u8) -> u8 {
        match op & 7 {
            4 => self.ixh(),
            5 => self.ixl(),
            r => self.get_reg8(r),
        }
    }

    fn ixh(&self) -> u8 {
        (self.regs.ix >> 8) as u8
    }

    fn ixl(&self) -> u8 {
        self.regs.ix as u8
    }

    fn set_ixh(&mut self, value: u8) {
        self.regs.ix = (self.regs.ix & 0x00FF) | (u16::from(value) << 8);
    }

    fn set_ixl(&mut self, value: u8) {
        self.regs.ix = (self.regs.ix & 0xFF00) | u16::from(value);
    }
}
