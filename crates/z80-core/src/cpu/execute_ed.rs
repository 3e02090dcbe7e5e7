//! ED-prefixed instruction execution, including the block primitives.

#![allow(clippy::cast_possible_truncation)]

use crate::alu;
use crate::bus::Bus;
use crate::flags::{sz53, sz53p, CF, HF, NF, PF, SF, XF, YF, ZF};
use crate::tables;

use super::{LastInstruction, Z80};

impl Z80 {
    /// Execute an ED-prefixed instruction and return its base T-states.
    /// Opcodes without an ED meaning act as a two-byte NOP.
    pub(super) fn execute_ed<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let op = self.fetch_opcode(bus);

        match op {
            // IN r, (C) (40=B, 48=C, 50=D, 58=E, 60=H, 68=L, 78=A).
            // 70 is the undocumented IN (C): flags only, result discarded.
            0x40 | 0x48 | 0x50 | 0x58 | 0x60 | 0x68 | 0x70 | 0x78 => {
                let value = bus.io_read(self.regs.bc());
                let r = (op >> 3) & 7;
                if r != 6 {
                    self.set_reg8(r, value);
                }
                self.regs.f = (self.regs.f & CF) | sz53p(value);
            }

            // OUT (C), r. 71 is the undocumented OUT (C),0.
            0x41 | 0x49 | 0x51 | 0x59 | 0x61 | 0x69 | 0x71 | 0x79 => {
                let r = (op >> 3) & 7;
                let value = if r == 6 { 0 } else { self.get_reg8(r) };
                bus.io_write(self.regs.bc(), value);
            }

            // SBC HL, rr (42=BC, 52=DE, 62=HL, 72=SP)
            0x42 | 0x52 | 0x62 | 0x72 => {
                let carry = self.regs.f & CF != 0;
                let (result, flags) =
                    alu::sbc16(self.regs.hl(), self.get_rp((op >> 4) & 3), carry);
                self.regs.set_hl(result);
                self.regs.f = flags;
            }

            // LD (nn), rr (43=BC, 53=DE, 63=HL, 73=SP)
            0x43 | 0x53 | 0x63 | 0x73 => {
                let addr = self.fetch_word(bus);
                let value = self.get_rp((op >> 4) & 3);
                self.write_word(bus, addr, value);
            }

            // NEG (and undocumented mirrors)
            0x44 | 0x4C | 0x54 | 0x5C | 0x64 | 0x6C | 0x74 | 0x7C => {
                let (result, flags) = alu::sub8(0, self.regs.a, false);
                self.regs.a = result;
                self.regs.f = flags;
            }

            // RETN (and undocumented mirrors) / RETI
            0x45 | 0x55 | 0x65 | 0x75 | 0x4D | 0x5D | 0x6D | 0x7D => {
                self.regs.iff1 = self.regs.iff2;
                self.regs.pc = self.pop_word(bus);
                self.last_instruction = LastInstruction::Ret;
            }

            // IM 0 / IM 1 / IM 2 (and undocumented mirrors)
            0x46 | 0x4E | 0x66 | 0x6E => self.regs.im = 0,
            0x56 | 0x76 => self.regs.im = 1,
            0x5E | 0x7E => self.regs.im = 2,

            // LD I, A
            0x47 => self.regs.i = self.regs.a,

            // ADC HL, rr (4A=BC, 5A=DE, 6A=HL, 7A=SP)
            0x4A | 0x5A | 0x6A | 0x7A => {
                let carry = self.regs.f & CF != 0;
                let (result, flags) =
                    alu::adc16(self.regs.hl(), self.get_rp((op >> 4) & 3), carry);
                self.regs.set_hl(result);
                self.regs.f = flags;
            }

            // LD rr, (nn) (4B=BC, 5B=DE, 6B=HL, 7B=SP)
            0x4B | 0x5B | 0x6B | 0x7B => {
                let addr = self.fetch_word(bus);
                let value = self.read_word(bus, addr);
                self.set_rp((op >> 4) & 3, value);
            }

            // LD R, A - the only way to write R's bit 7.
            0x4F => self.regs.r = self.regs.a,

            // LD A, I / LD A, R - P reflects IFF2.
            0x57 => {
                self.regs.a = self.regs.i;
                self.interrupt_register_flags();
            }
            0x5F => {
                self.regs.a = self.regs.r;
                self.interrupt_register_flags();
            }

            // RRD - low nibble of (HL) into A, A's low nibble rotated in.
            0x67 => {
                let value = bus.mem_read(self.regs.hl());
                let result = (self.regs.a << 4) | (value >> 4);
                self.regs.a = (self.regs.a & 0xF0) | (value & 0x0F);
                bus.mem_write(self.regs.hl(), result);
                self.regs.f = (self.regs.f & CF) | sz53p(self.regs.a);
            }

            // RLD
            0x6F => {
                let value = bus.mem_read(self.regs.hl());
                let result = (value << 4) | (self.regs.a & 0x0F);
                self.regs.a = (self.regs.a & 0xF0) | (value >> 4);
                bus.mem_write(self.regs.hl(), result);
                self.regs.f = (self.regs.f & CF) | sz53p(self.regs.a);
            }

            // LDI / LDD / LDIR / LDDR
            0xA0 => self.block_ld(bus, false, false),
            0xA8 => self.block_ld(bus, true, false),
            0xB0 => self.block_ld(bus, false, true),
            0xB8 => self.block_ld(bus, true, true),

            // CPI / CPD / CPIR / CPDR
            0xA1 => self.block_cp(bus, false, false),
            0xA9 => self.block_cp(bus, true, false),
            0xB1 => self.block_cp(bus, false, true),
            0xB9 => self.block_cp(bus, true, true),

            // INI / IND / INIR / INDR
            0xA2 => self.block_in(bus, false, false),
            0xAA => self.block_in(bus, true, false),
            0xB2 => self.block_in(bus, false, true),
            0xBA => self.block_in(bus, true, true),

            // OUTI / OUTD / OTIR / OTDR
            0xA3 => self.block_out(bus, false, false),
            0xAB => self.block_out(bus, true, false),
            0xB3 => self.block_out(bus, false, true),
            0xBB => self.block_out(bus, true, true),

            // Everything else is a two-byte NOP.
            _ => {}
        }

        tables::CYCLES_ED[op as usize]
    }

    /// Flags for LD A,I and LD A,R: S/Z/X/Y from A, H and N clear,
    /// C preserved, P loaded from IFF2.
    fn interrupt_register_flags(&mut self) {
        self.regs.f = (self.regs.f & CF)
            | sz53(self.regs.a)
            | if self.regs.iff2 { PF } else { 0 };
    }

    /// LDI/LDD body: (DE) <- (HL), pointers step, BC counts down.
    /// X/Y derive from `copied + A` (X = bit 3, Y = bit 1); P holds the
    /// "more to copy" condition.
    fn block_ld<B: Bus + ?Sized>(&mut self, bus: &mut B, decrement: bool, repeat: bool) {
        let step = if decrement { 0xFFFFu16 } else { 1 };
        let value = bus.mem_read(self.regs.hl());
        bus.mem_write(self.regs.de(), value);
        self.regs.set_hl(self.regs.hl().wrapping_add(step));
        self.regs.set_de(self.regs.de().wrapping_add(step));
        self.regs.set_bc(self.regs.bc().wrapping_sub(1));

        let n = value.wrapping_add(self.regs.a);
        self.regs.f = (self.regs.f & (SF | ZF | CF))
            | (n & XF)
            | if n & 0x02 != 0 { YF } else { 0 }
            | if self.regs.bc() != 0 { PF } else { 0 };

        if repeat && self.regs.bc() != 0 {
            self.repeat_block();
        }
    }

    /// CPI/CPD body: compare A with (HL) without storing; X/Y derive from
    /// `A - (HL) - H` using the half-borrow of the comparison.
    fn block_cp<B: Bus + ?Sized>(&mut self, bus: &mut B, decrement: bool, repeat: bool) {
        let step = if decrement { 0xFFFFu16 } else { 1 };
        let value = bus.mem_read(self.regs.hl());
        let result = self.regs.a.wrapping_sub(value);
        let half = self.regs.a & 0x0F < value & 0x0F;
        let n = result.wrapping_sub(u8::from(half));

        self.regs.set_hl(self.regs.hl().wrapping_add(step));
        self.regs.set_bc(self.regs.bc().wrapping_sub(1));

        self.regs.f = (self.regs.f & CF)
            | NF
            | if result == 0 { ZF } else { 0 }
            | if result & 0x80 != 0 { SF } else { 0 }
            | if half { HF } else { 0 }
            | (n & XF)
            | if n & 0x02 != 0 { YF } else { 0 }
            | if self.regs.bc() != 0 { PF } else { 0 };

        if repeat && self.regs.bc() != 0 && result != 0 {
            self.repeat_block();
        }
    }

    /// INI/IND body: (HL) <- port(BC), B counts down.
    fn block_in<B: Bus + ?Sized>(&mut self, bus: &mut B, decrement: bool, repeat: bool) {
        let step = if decrement { 0xFFFFu16 } else { 1 };
        let value = bus.io_read(self.regs.bc());
        bus.mem_write(self.regs.hl(), value);
        self.regs.b = self.regs.b.wrapping_sub(1);
        self.regs.set_hl(self.regs.hl().wrapping_add(step));

        let c_adjusted = if decrement {
            self.regs.c.wrapping_sub(1)
        } else {
            self.regs.c.wrapping_add(1)
        };
        let k = u16::from(value) + u16::from(c_adjusted);
        self.block_io_flags(value, k);

        if repeat && self.regs.b != 0 {
            self.repeat_block();
        }
    }

    /// OUTI/OUTD body: port(BC) <- (HL) with B already counted down.
    fn block_out<B: Bus + ?Sized>(&mut self, bus: &mut B, decrement: bool, repeat: bool) {
        let step = if decrement { 0xFFFFu16 } else { 1 };
        let value = bus.mem_read(self.regs.hl());
        self.regs.b = self.regs.b.wrapping_sub(1);
        bus.io_write(self.regs.bc(), value);
        self.regs.set_hl(self.regs.hl().wrapping_add(step));

        let k = u16::from(value) + u16::from(self.regs.l);
        self.block_io_flags(value, k);

        if repeat && self.regs.b != 0 {
            self.repeat_block();
        }
    }

    /// Shared flag rule for the I/O block primitives: Z/S/X/Y from the
    /// decremented B, N from bit 7 of the transferred byte, H and C from
    /// the 9-bit overflow of `k`, P from the parity of `(k & 7) ^ B`.
    fn block_io_flags(&mut self, value: u8, k: u16) {
        let b = self.regs.b;
        self.regs.f = (if b == 0 { ZF } else { 0 })
            | (b & (SF | YF | XF))
            | if value & 0x80 != 0 { NF } else { 0 }
            | if k & 0xFF < u16::from(value) { HF | CF } else { 0 }
            | (sz53p((k as u8) & 7 ^ b) & PF);
    }

    /// Rewind PC over the ED-prefixed opcode so the instruction reissues,
    /// charging the taken-branch surcharge.
    fn repeat_block(&mut self) {
        self.regs.pc = self.regs.pc.wrapping_sub(2);
        self.extra += tables::BLOCK_REPEAT;
    }
}
