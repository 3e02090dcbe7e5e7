//! Unprefixed instruction execution.

#![allow(clippy::too_many_lines)]
#![allow(clippy::match_same_arms)]

use crate::alu;
use crate::bus::Bus;
use crate::flags::{sz53p, CF, HF, NF, PF, SF, XF, YF, ZF};
use crate::tables;

use super::{LastInstruction, Z80};

impl Z80 {
    /// Execute one unprefixed instruction. The opcode byte has already
    /// been fetched; operand bytes are fetched here. Taken branches add
    /// their surcharge to `self.extra`.
    pub(super) fn execute_primary<B: Bus + ?Sized>(&mut self, bus: &mut B, op: u8) {
        match op {
            // NOP
            0x00 => {}

            // LD rr, nn (01=BC, 11=DE, 21=HL, 31=SP)
            0x01 | 0x11 | 0x21 | 0x31 => {
                let value = self.fetch_word(bus);
                self.set_rp((op >> 4) & 3, value);
            }

            // LD (BC), A
            0x02 => bus.mem_write(self.regs.bc(), self.regs.a),

            // INC rr (03=BC, 13=DE, 23=HL, 33=SP)
            0x03 | 0x13 | 0x23 | 0x33 => {
                let rp = (op >> 4) & 3;
                let value = self.get_rp(rp).wrapping_add(1);
                self.set_rp(rp, value);
            }

            // INC r (04=B, 0C=C, 14=D, 1C=E, 24=H, 2C=L, 34=(HL), 3C=A)
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                let r = (op >> 3) & 7;
                let value = if r == 6 {
                    bus.mem_read(self.regs.hl())
                } else {
                    self.get_reg8(r)
                };
                let (result, flags) = alu::inc8(value);
                if r == 6 {
                    bus.mem_write(self.regs.hl(), result);
                } else {
                    self.set_reg8(r, result);
                }
                self.regs.f = (self.regs.f & CF) | flags;
            }

            // DEC r (05=B, 0D=C, 15=D, 1D=E, 25=H, 2D=L, 35=(HL), 3D=A)
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                let r = (op >> 3) & 7;
                let value = if r == 6 {
                    bus.mem_read(self.regs.hl())
                } else {
                    self.get_reg8(r)
                };
                let (result, flags) = alu::dec8(value);
                if r == 6 {
                    bus.mem_write(self.regs.hl(), result);
                } else {
                    self.set_reg8(r, result);
                }
                self.regs.f = (self.regs.f & CF) | flags;
            }

            // LD r, n (06=B, 0E=C, 16=D, 1E=E, 26=H, 2E=L, 36=(HL), 3E=A)
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
                let r = (op >> 3) & 7;
                let value = self.fetch_byte(bus);
                if r == 6 {
                    bus.mem_write(self.regs.hl(), value);
                } else {
                    self.set_reg8(r, value);
                }
            }

            // RLCA - unlike RLC A this preserves S, Z and P.
            0x07 => {
                let carry = self.regs.a >> 7;
                self.regs.a = (self.regs.a << 1) | carry;
                self.regs.f = (self.regs.f & (SF | ZF | PF))
                    | (self.regs.a & (YF | XF))
                    | if carry != 0 { CF } else { 0 };
            }

            // EX AF, AF'
            0x08 => {
                let af = self.regs.af();
                let shadow = self.regs.af_alt();
                self.regs.set_af(shadow);
                self.regs.set_af_alt(af);
            }

            // ADD HL, rr (09=BC, 19=DE, 29=HL, 39=SP)
            0x09 | 0x19 | 0x29 | 0x39 => {
                let (result, flags) = alu::add16(self.regs.hl(), self.get_rp((op >> 4) & 3));
                self.regs.set_hl(result);
                self.regs.f = (self.regs.f & (SF | ZF | PF)) | flags;
            }

            // LD A, (BC)
            0x0A => self.regs.a = bus.mem_read(self.regs.bc()),

            // DEC rr (0B=BC, 1B=DE, 2B=HL, 3B=SP)
            0x0B | 0x1B | 0x2B | 0x3B => {
                let rp = (op >> 4) & 3;
                let value = self.get_rp(rp).wrapping_sub(1);
                self.set_rp(rp, value);
            }

            // RRCA
            0x0F => {
                let carry = self.regs.a & 1;
                self.regs.a = (self.regs.a >> 1) | (carry << 7);
                self.regs.f = (self.regs.f & (SF | ZF | PF))
                    | (self.regs.a & (YF | XF))
                    | if carry != 0 { CF } else { 0 };
            }

            // DJNZ e
            0x10 => {
                let displacement = self.fetch_byte(bus);
                self.regs.b = self.regs.b.wrapping_sub(1);
                if self.regs.b != 0 {
                    self.jump_relative(displacement);
                    self.extra += tables::JR_TAKEN;
                }
            }

            // LD (DE), A
            0x12 => bus.mem_write(self.regs.de(), self.regs.a),

            // RLA
            0x17 => {
                let old_carry = self.regs.f & CF;
                let new_carry = self.regs.a >> 7;
                self.regs.a = (self.regs.a << 1) | old_carry;
                self.regs.f = (self.regs.f & (SF | ZF | PF))
                    | (self.regs.a & (YF | XF))
                    | if new_carry != 0 { CF } else { 0 };
            }

            // JR e
            0x18 => {
                let displacement = self.fetch_byte(bus);
                self.jump_relative(displacement);
            }

            // LD A, (DE)
            0x1A => self.regs.a = bus.mem_read(self.regs.de()),

            // RRA
            0x1F => {
                let old_carry = (self.regs.f & CF) << 7;
                let new_carry = self.regs.a & 1;
                self.regs.a = (self.regs.a >> 1) | old_carry;
                self.regs.f = (self.regs.f & (SF | ZF | PF))
                    | (self.regs.a & (YF | XF))
                    | if new_carry != 0 { CF } else { 0 };
            }

            // JR cc, e (20=NZ, 28=Z, 30=NC, 38=C)
            0x20 | 0x28 | 0x30 | 0x38 => {
                let displacement = self.fetch_byte(bus);
                if self.condition(((op >> 3) & 7) - 4) {
                    self.jump_relative(displacement);
                    self.extra += tables::JR_TAKEN;
                }
            }

            // LD (nn), HL
            0x22 => {
                let addr = self.fetch_word(bus);
                let hl = self.regs.hl();
                self.write_word(bus, addr, hl);
            }

            // DAA
            0x27 => {
                let flags = self.regs.f;
                let (result, new_flags) = alu::daa(
                    self.regs.a,
                    flags & HF != 0,
                    flags & NF != 0,
                    flags & CF != 0,
                );
                self.regs.a = result;
                self.regs.f = new_flags;
            }

            // LD HL, (nn)
            0x2A => {
                let addr = self.fetch_word(bus);
                let value = self.read_word(bus, addr);
                self.regs.set_hl(value);
            }

            // CPL
            0x2F => {
                self.regs.a = !self.regs.a;
                self.regs.f = (self.regs.f & (SF | ZF | PF | CF))
                    | HF
                    | NF
                    | (self.regs.a & (YF | XF));
            }

            // LD (nn), A
            0x32 => {
                let addr = self.fetch_word(bus);
                bus.mem_write(addr, self.regs.a);
            }

            // SCF - X/Y copied from A.
            0x37 => {
                self.regs.f = (self.regs.f & (SF | ZF | PF)) | CF | (self.regs.a & (YF | XF));
            }

            // LD A, (nn)
            0x3A => {
                let addr = self.fetch_word(bus);
                self.regs.a = bus.mem_read(addr);
            }

            // CCF - old carry becomes H, X/Y copied from A.
            0x3F => {
                let old_carry = self.regs.f & CF;
                self.regs.f = (self.regs.f & (SF | ZF | PF))
                    | (self.regs.a & (YF | XF))
                    | if old_carry != 0 { HF } else { CF };
            }

            // HALT
            0x76 => {
                self.halted = true;
                self.regs.iff1 = true;
                self.regs.iff2 = true;
            }

            // LD r, r' (40-7F except 76)
            0x40..=0x7F => {
                let src = op & 7;
                let dst = (op >> 3) & 7;
                let value = if src == 6 {
                    bus.mem_read(self.regs.hl())
                } else {
                    self.get_reg8(src)
                };
                if dst == 6 {
                    bus.mem_write(self.regs.hl(), value);
                } else {
                    self.set_reg8(dst, value);
                }
            }

            // ALU A, r (80-BF)
            0x80..=0xBF => {
                let r = op & 7;
                let value = if r == 6 {
                    bus.mem_read(self.regs.hl())
                } else {
                    self.get_reg8(r)
                };
                self.alu_a(op, value);
            }

            // RET cc (C0=NZ, C8=Z, D0=NC, D8=C, E0=PO, E8=PE, F0=P, F8=M)
            0xC0 | 0xC8 | 0xD0 | 0xD8 | 0xE0 | 0xE8 | 0xF0 | 0xF8 => {
                if self.condition((op >> 3) & 7) {
                    self.regs.pc = self.pop_word(bus);
                    self.extra += tables::RET_TAKEN;
                    self.last_instruction = LastInstruction::Ret;
                }
            }

            // POP rr (C1=BC, D1=DE, E1=HL, F1=AF)
            0xC1 | 0xD1 | 0xE1 | 0xF1 => {
                let value = self.pop_word(bus);
                match (op >> 4) & 3 {
                    0 => self.regs.set_bc(value),
                    1 => self.regs.set_de(value),
                    2 => self.regs.set_hl(value),
                    _ => self.regs.set_af(value),
                }
            }

            // JP cc, nn
            0xC2 | 0xCA | 0xD2 | 0xDA | 0xE2 | 0xEA | 0xF2 | 0xFA => {
                let addr = self.fetch_word(bus);
                if self.condition((op >> 3) & 7) {
                    self.regs.pc = addr;
                }
            }

            // JP nn
            0xC3 => {
                self.regs.pc = self.fetch_word(bus);
            }

            // CALL cc, nn
            0xC4 | 0xCC | 0xD4 | 0xDC | 0xE4 | 0xEC | 0xF4 | 0xFC => {
                let addr = self.fetch_word(bus);
                if self.condition((op >> 3) & 7) {
                    let pc = self.regs.pc;
                    self.push_word(bus, pc);
                    self.regs.pc = addr;
                    self.extra += tables::CALL_TAKEN;
                    self.last_instruction = LastInstruction::Call;
                }
            }

            // PUSH rr (C5=BC, D5=DE, E5=HL, F5=AF)
            0xC5 | 0xD5 | 0xE5 | 0xF5 => {
                let value = match (op >> 4) & 3 {
                    0 => self.regs.bc(),
                    1 => self.regs.de(),
                    2 => self.regs.hl(),
                    _ => self.regs.af(),
                };
                self.push_word(bus, value);
            }

            // ALU A, n (C6=ADD, CE=ADC, D6=SUB, DE=SBC, E6=AND, EE=XOR, F6=OR, FE=CP)
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let value = self.fetch_byte(bus);
                self.alu_a(op, value);
            }

            // RST n (C7=00, CF=08, D7=10, DF=18, E7=20, EF=28, F7=30, FF=38)
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                let pc = self.regs.pc;
                self.push_word(bus, pc);
                self.regs.pc = u16::from(op & 0x38);
                self.last_instruction = LastInstruction::Rst;
            }

            // RET
            0xC9 => {
                self.regs.pc = self.pop_word(bus);
                self.last_instruction = LastInstruction::Ret;
            }

            // CALL nn
            0xCD => {
                let addr = self.fetch_word(bus);
                let pc = self.regs.pc;
                self.push_word(bus, pc);
                self.regs.pc = addr;
                self.last_instruction = LastInstruction::Call;
            }

            // OUT (n), A - A supplies the high port byte.
            0xD3 => {
                let port = self.fetch_byte(bus);
                bus.io_write((u16::from(self.regs.a) << 8) | u16::from(port), self.regs.a);
            }

            // EXX
            0xD9 => {
                core::mem::swap(&mut self.regs.b, &mut self.regs.b_alt);
                core::mem::swap(&mut self.regs.c, &mut self.regs.c_alt);
                core::mem::swap(&mut self.regs.d, &mut self.regs.d_alt);
                core::mem::swap(&mut self.regs.e, &mut self.regs.e_alt);
                core::mem::swap(&mut self.regs.h, &mut self.regs.h_alt);
                core::mem::swap(&mut self.regs.l, &mut self.regs.l_alt);
            }

            // IN A, (n) - no flags affected, unlike IN r,(C).
            0xDB => {
                let port = self.fetch_byte(bus);
                self.regs.a = bus.io_read((u16::from(self.regs.a) << 8) | u16::from(port));
            }

            // EX (SP), HL
            0xE3 => {
                let sp = self.regs.sp;
                let value = self.read_word(bus, sp);
                let hl = self.regs.hl();
                self.write_word(bus, sp, hl);
                self.regs.set_hl(value);
            }

            // JP (HL)
            0xE9 => self.regs.pc = self.regs.hl(),

            // EX DE, HL
            0xEB => {
                let de = self.regs.de();
                let hl = self.regs.hl();
                self.regs.set_de(hl);
                self.regs.set_hl(de);
            }

            // DI - takes effect after the next instruction.
            0xF3 => {
                self.pending_di = true;
                self.pending_ei = false;
            }

            // LD SP, HL
            0xF9 => self.regs.sp = self.regs.hl(),

            // EI - takes effect after the next instruction.
            0xFB => {
                self.pending_ei = true;
                self.pending_di = false;
            }

            // Prefix bytes never reach this table.
            0xCB | 0xDD | 0xED | 0xFD => {
                unreachable!("prefix bytes are routed by dispatch")
            }
        }
    }

    /// Perform an ALU operation on A, selected by bits 5-3 of the opcode.
    pub(super) fn alu_a(&mut self, op: u8, value: u8) {
        match (op >> 3) & 7 {
            // ADD
            0 => {
                let (result, flags) = alu::add8(self.regs.a, value, false);
                self.regs.a = result;
                self.regs.f = flags;
            }
            // ADC
            1 => {
                let carry = self.regs.f & CF != 0;
                let (result, flags) = alu::add8(self.regs.a, value, carry);
                self.regs.a = result;
                self.regs.f = flags;
            }
            // SUB
            2 => {
                let (result, flags) = alu::sub8(self.regs.a, value, false);
                self.regs.a = result;
                self.regs.f = flags;
            }
            // SBC
            3 => {
                let carry = self.regs.f & CF != 0;
                let (result, flags) = alu::sub8(self.regs.a, value, carry);
                self.regs.a = result;
                self.regs.f = flags;
            }
            // AND - the only logical op that sets H.
            4 => {
                self.regs.a &= value;
                self.regs.f = sz53p(self.regs.a) | HF;
            }
            // XOR
            5 => {
                self.regs.a ^= value;
                self.regs.f = sz53p(self.regs.a);
            }
            // OR
            6 => {
                self.regs.a |= value;
                self.regs.f = sz53p(self.regs.a);
            }
            // CP - A restored, X/Y from the operand.
            _ => {
                self.regs.f = alu::cp8(self.regs.a, value);
            }
        }
    }
}
