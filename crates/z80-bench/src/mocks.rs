//! Step observers: the ordered chain evaluated before each instruction.

use z80_core::{LastInstruction, Z80};

use crate::format;
use crate::memory::Memory;

/// Answer from a step observer.
///
/// The first non-`Run` answer in the chain decides the step's fate:
/// `Break` stops the run loop, `Skip` suppresses the instruction (no PC
/// advance beyond what the observer did itself, no T-states charged).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    Run,
    Break,
    Skip,
}

/// Mutable view handed to step observers and call mocks.
pub struct StepContext<'a> {
    pub cpu: &'a mut Z80,
    pub memory: &'a mut Memory,
}

pub(crate) type StepFn = Box<dyn FnMut(&mut StepContext<'_>) -> StepAction>;
pub(crate) type CallFn = Box<dyn FnMut(&mut StepContext<'_>)>;

/// One observer in the step-mock chain.
pub(crate) enum StepMock {
    /// Replace a subroutine with a host callback. Fires only when PC
    /// matches *and* control arrived by CALL, RST or an interrupt, then
    /// simulates the RET so the caller continues normally.
    FakeCall { addr: u16, callback: CallFn },
    /// User observer at one PC.
    OnStep { addr: u16, callback: StepFn },
    /// User observer on every step.
    OnEveryStep { callback: StepFn },
    /// One-line register dump per step; always lets the step run.
    Logger,
}

impl StepMock {
    /// Chain ordering: fake-call observers run before user step
    /// observers, address-unconditional observers after, the logger last.
    pub(crate) fn priority(&self) -> u8 {
        match self {
            StepMock::FakeCall { .. } => 0,
            StepMock::OnStep { .. } => 1,
            StepMock::OnEveryStep { .. } => 2,
            StepMock::Logger => 3,
        }
    }

    pub(crate) fn observe(&mut self, ctx: &mut StepContext<'_>) -> StepAction {
        match self {
            StepMock::FakeCall { addr, callback } => {
                let called = ctx.cpu.regs.pc == *addr
                    && matches!(
                        ctx.cpu.last_instruction(),
                        LastInstruction::Call | LastInstruction::Rst | LastInstruction::Int
                    );
                if !called {
                    return StepAction::Run;
                }
                callback(ctx);
                // Simulate the RET the mocked body would have executed.
                let sp = ctx.cpu.regs.sp;
                let lo = ctx.memory.read(sp);
                let hi = ctx.memory.read(sp.wrapping_add(1));
                ctx.cpu.regs.sp = sp.wrapping_add(2);
                ctx.cpu.regs.pc = (u16::from(hi) << 8) | u16::from(lo);
                ctx.cpu.set_last_instruction(LastInstruction::Ret);
                StepAction::Skip
            }
            StepMock::OnStep { addr, callback } => {
                if ctx.cpu.regs.pc == *addr {
                    callback(ctx)
                } else {
                    StepAction::Run
                }
            }
            StepMock::OnEveryStep { callback } => callback(ctx),
            StepMock::Logger => {
                println!("{}", format::brief_registers(ctx.cpu));
                StepAction::Run
            }
        }
    }
}
