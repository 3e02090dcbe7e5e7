//! Test harness for Z80 assembly programs.
//!
//! Pairs the [`z80_core`] interpreter with a host shell that lets unit
//! tests load assembled code, drive execution with breakpoints and step
//! hooks, and assert over register state, memory contents and port
//! traffic.
//!
//! A typical scenario builds a [`Harness`], loads bytes or a compiled
//! [`Program`], optionally attaches an [`IoSpy`] and step mocks, then
//! drives the CPU with [`Harness::run`] or [`Harness::call`]:
//!
//! ```
//! use z80_bench::{Harness, RunOptions};
//!
//! let mut harness = Harness::new();
//! // LD A,0x12; HALT
//! harness.load(&[0x3E, 0x12, 0x76], 0u16).unwrap();
//! let result = harness.run(None, RunOptions::new()).unwrap();
//! assert_eq!(harness.cpu().regs.a, 0x12);
//! assert_eq!(result.instructions, 2);
//! ```

mod error;
mod format;
mod harness;
mod memory;
mod mocks;
mod program;
mod spy;
mod symbols;

pub use error::{BenchError, Result};
pub use harness::{
    Harness, MemorySnapshot, RunOptions, RunResult, DEFAULT_CALL_SP, DEFAULT_STEP_LIMIT,
};
pub use memory::{Memory, MEM_SIZE};
pub use mocks::{StepAction, StepContext};
pub use program::{Addr, Assembler, Program};
pub use spy::{Bytes, IoSpy};
pub use symbols::SymbolTable;
