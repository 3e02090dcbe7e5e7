//! Zilog Z80 instruction interpreter.
//!
//! Each call to `step()` executes exactly one instruction and returns the
//! T-states it consumed. Covers the primary opcode table plus the CB, DD,
//! ED, FD, DDCB and FDCB prefix groups, documented and undocumented
//! opcodes, the undocumented X/Y flag copies, and interrupt
//! acknowledgement in modes 0, 1 and 2.

mod alu;
mod bus;
mod cpu;
mod flags;
mod registers;
mod tables;

pub use bus::Bus;
pub use cpu::{LastInstruction, Z80, HALTED_TICK};
pub use flags::{parity, Flags, CF, HF, NF, PF, SF, XF, YF, ZF};
pub use registers::Registers;
