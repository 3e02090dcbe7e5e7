//! Z80 CPU: fetch/decode driver, interrupt acknowledgement and the
//! execution helpers shared by the opcode tables.

#![allow(clippy::cast_possible_truncation)] // Intentional truncation for low byte extraction.
#![allow(clippy::cast_possible_wrap)] // Intentional i8 casts for displacements.

mod execute;
mod execute_cb;
mod execute_dd;
mod execute_ed;

use crate::bus::Bus;
use crate::registers::{Registers, POWER_ON_SP};
use crate::tables;

/// T-states charged per `step()` while the CPU is halted.
pub const HALTED_TICK: u32 = 1;

/// How control last transferred. Consumed by call mocking and the
/// call-return stop predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LastInstruction {
    #[default]
    None,
    Call,
    Rst,
    Int,
    Ret,
}

/// Z80 CPU.
///
/// The CPU does not own its bus; memory and I/O are borrowed mutably for
/// the duration of each [`Z80::step`] or [`Z80::interrupt`] call, so the
/// host can observe or script every access.
pub struct Z80 {
    /// Programmer-visible register file.
    pub regs: Registers,

    /// Set by HALT, cleared by any accepted interrupt.
    halted: bool,
    /// One-shot delay flags for DI/EI. Mutually exclusive; they commit
    /// after the next full instruction.
    pending_di: bool,
    pending_ei: bool,
    /// Taken-branch surcharge accumulated while executing one instruction.
    extra: u32,
    last_instruction: LastInstruction,
}

impl Z80 {
    /// Create a CPU in the power-on state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            halted: false,
            pending_di: false,
            pending_ei: false,
            extra: 0,
            last_instruction: LastInstruction::None,
        }
    }

    /// Reset the power-on-defined subset: SP, PC, A, F, R, interrupt mode
    /// and flip-flops. Every other register keeps its value.
    pub fn reset(&mut self) {
        self.regs.sp = POWER_ON_SP;
        self.regs.pc = 0;
        self.regs.a = 0;
        self.regs.f = 0;
        self.regs.r = 0;
        self.regs.im = 0;
        self.regs.iff1 = false;
        self.regs.iff2 = false;
        self.halted = false;
        self.pending_di = false;
        self.pending_ei = false;
        self.last_instruction = LastInstruction::None;
    }

    /// True after HALT until an interrupt is accepted.
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.halted
    }

    /// Force the halt state. Hosts use this to resume a CPU that HALTed
    /// without going through an interrupt.
    pub fn set_halted(&mut self, halted: bool) {
        self.halted = halted;
    }

    /// How control last transferred.
    #[must_use]
    pub const fn last_instruction(&self) -> LastInstruction {
        self.last_instruction
    }

    /// Override the transfer tag. Used by hosts that simulate a RET on the
    /// CPU's behalf (call mocking).
    pub fn set_last_instruction(&mut self, tag: LastInstruction) {
        self.last_instruction = tag;
    }

    /// Execute one instruction and return the T-states it consumed.
    ///
    /// When halted, returns [`HALTED_TICK`] and leaves all state
    /// untouched. A pending DI or EI from the previous instruction
    /// commits once this instruction completes.
    pub fn step<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u32 {
        if self.halted {
            return HALTED_TICK;
        }

        let di_armed = self.pending_di;
        let ei_armed = self.pending_ei;
        self.last_instruction = LastInstruction::None;
        self.extra = 0;

        let op = self.fetch_opcode(bus);
        let base = self.dispatch(bus, op);
        let cycles = base + self.extra;

        if di_armed && self.pending_di {
            self.regs.iff1 = false;
            self.regs.iff2 = false;
            self.pending_di = false;
        }
        if ei_armed && self.pending_ei {
            self.regs.iff1 = true;
            self.regs.iff2 = true;
            self.pending_ei = false;
        }

        cycles
    }

    /// Acknowledge an interrupt and return the T-states consumed.
    ///
    /// An NMI is always accepted: IFF2 latches IFF1, IFF1 clears, PC is
    /// pushed and execution resumes at 0x0066. A maskable interrupt is
    /// accepted only while IFF1 is set; both flip-flops clear and the
    /// current mode decides the rest: mode 0 executes `data` as an opcode
    /// (+2 T-states), mode 1 restarts at 0x0038, mode 2 vectors through
    /// the word at `(I << 8) | data`. A refused interrupt returns 0 and
    /// changes nothing.
    pub fn interrupt<B: Bus + ?Sized>(&mut self, bus: &mut B, non_maskable: bool, data: u8) -> u32 {
        if non_maskable {
            self.halted = false;
            self.regs.iff2 = self.regs.iff1;
            self.regs.iff1 = false;
            self.regs.inc_r();
            let pc = self.regs.pc;
            self.push_word(bus, pc);
            self.regs.pc = 0x0066;
            self.last_instruction = LastInstruction::Int;
            return 11;
        }

        if !self.regs.iff1 {
            return 0;
        }

        self.halted = false;
        self.regs.iff1 = false;
        self.regs.iff2 = false;
        self.regs.inc_r();

        let cycles = match self.regs.im {
            0 => {
                // The device supplies the opcode on the data bus.
                self.extra = 0;
                let base = self.dispatch(bus, data);
                base + self.extra + 2
            }
            1 => {
                let pc = self.regs.pc;
                self.push_word(bus, pc);
                self.regs.pc = 0x0038;
                13
            }
            _ => {
                let pc = self.regs.pc;
                self.push_word(bus, pc);
                let vector = (u16::from(self.regs.i) << 8) | u16::from(data);
                self.regs.pc = self.read_word(bus, vector);
                19
            }
        };

        self.last_instruction = LastInstruction::Int;
        cycles
    }

    /// Push a 16-bit word (high byte first, SP pre-decremented).
    pub fn push_word<B: Bus + ?Sized>(&mut self, bus: &mut B, value: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.mem_write(self.regs.sp, (value >> 8) as u8);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.mem_write(self.regs.sp, value as u8);
    }

    /// Pop a 16-bit word (low byte first, SP post-incremented).
    pub fn pop_word<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u16 {
        let lo = bus.mem_read(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = bus.mem_read(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        (u16::from(hi) << 8) | u16::from(lo)
    }

    // -----------------------------------------------------------------------
    // Decode plumbing
    // -----------------------------------------------------------------------

    /// Route one opcode to its table. Prefix handlers fetch their own
    /// continuation bytes; the returned count is the table's base cost,
    /// taken-branch surcharges accumulate in `self.extra`.
    fn dispatch<B: Bus + ?Sized>(&mut self, bus: &mut B, op: u8) -> u32 {
        match op {
            0xCB => self.execute_cb(bus),
            0xED => self.execute_ed(bus),
            0xDD => self.execute_index(bus),
            0xFD => {
                // FD reuses the DD handlers with IY swapped into IX.
                core::mem::swap(&mut self.regs.ix, &mut self.regs.iy);
                let cycles = self.execute_index(bus);
                core::mem::swap(&mut self.regs.ix, &mut self.regs.iy);
                cycles
            }
            _ => {
                self.execute_primary(bus, op);
                tables::CYCLES[op as usize]
            }
        }
    }

    /// Fetch the next opcode byte, applying the refresh increment.
    fn fetch_opcode<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u8 {
        self.regs.inc_r();
        self.fetch_byte(bus)
    }

    /// Fetch one operand byte at PC.
    pub(crate) fn fetch_byte<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u8 {
        let value = bus.mem_read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    /// Fetch a little-endian operand word at PC.
    pub(crate) fn fetch_word<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch_byte(bus);
        let hi = self.fetch_byte(bus);
        (u16::from(hi) << 8) | u16::from(lo)
    }

    /// Read a little-endian word.
    pub(crate) fn read_word<B: Bus + ?Sized>(&mut self, bus: &mut B, addr: u16) -> u16 {
        let lo = bus.mem_read(addr);
        let hi = bus.mem_read(addr.wrapping_add(1));
        (u16::from(hi) << 8) | u16::from(lo)
    }

    /// Write a little-endian word.
    pub(crate) fn write_word<B: Bus + ?Sized>(&mut self, bus: &mut B, addr: u16, value: u16) {
        bus.mem_write(addr, value as u8);
        bus.mem_write(addr.wrapping_add(1), (value >> 8) as u8);
    }

    /// Relative jump by a sign-extended displacement.
    pub(crate) fn jump_relative(&mut self, displacement: u8) {
        self.regs.pc = self.regs.pc.wrapping_add((displacement as i8) as u16);
    }

    /// 8-bit register by encoding (0=B 1=C 2=D 3=E 4=H 5=L 7=A).
    /// Encoding 6 is (HL); callers handle it before getting here.
    pub(crate) fn get_reg8(&self, code: u8) -> u8 {
        match code {
            0 => self.regs.b,
            1 => self.regs.c,
            2 => self.regs.d,
            3 => self.regs.e,
            4 => self.regs.h,
            5 => self.regs.l,
            7 => self.regs.a,
            _ => unreachable!("(HL) operands are handled by the opcode arms"),
        }
    }

    pub(crate) fn set_reg8(&mut self, code: u8, value: u8) {
        match code {
            0 => self.regs.b = value,
            1 => self.regs.c = value,
            2 => self.regs.d = value,
            3 => self.regs.e = value,
            4 => self.regs.h = value,
            5 => self.regs.l = value,
            7 => self.regs.a = value,
            _ => unreachable!("(HL) operands are handled by the opcode arms"),
        }
    }

    /// 16-bit register pair by encoding (0=BC 1=DE 2=HL 3=SP).
    pub(crate) fn get_rp(&self, code: u8) -> u16 {
        match code & 3 {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.regs.hl(),
            _ => self.regs.sp,
        }
    }

    pub(crate) fn set_rp(&mut self, code: u8, value: u16) {
        match code & 3 {
            0 => self.regs.set_bc(value),
            1 => self.regs.set_de(value),
            2 => self.regs.set_hl(value),
            _ => self.regs.sp = value,
        }
    }

    /// Condition by encoding (0=NZ 1=Z 2=NC 3=C 4=PO 5=PE 6=P 7=M).
    pub(crate) fn condition(&self, code: u8) -> bool {
        use crate::flags::{CF, PF, SF, ZF};
        match code {
            0 => self.regs.f & ZF == 0,
            1 => self.regs.f & ZF != 0,
            2 => self.regs.f & CF == 0,
            3 => self.regs.f & CF != 0,
            4 => self.regs.f & PF == 0,
            5 => self.regs.f & PF != 0,
            6 => self.regs.f & SF == 0,
            _ => self.regs.f & SF != 0,
        }
    }
}

impl Default for Z80 {
    fn default() -> Self {
        Self::new()
    }
}
