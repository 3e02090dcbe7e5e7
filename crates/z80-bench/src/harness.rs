//! The execution harness: owns a CPU and its backing memory, resolves
//! symbols, and drives the run loop with breakpoints, step mocks and
//! bus hooks.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use z80_core::{Bus, LastInstruction, Z80};

use crate::error::{BenchError, Result};
use crate::format;
use crate::memory::Memory;
use crate::mocks::{StepAction, StepContext, StepMock};
use crate::program::{Addr, Assembler, Program};
use crate::symbols::SymbolTable;

/// Default instruction budget per run.
pub const DEFAULT_STEP_LIMIT: u64 = 10_000_000;

/// Default SP seeded by [`Harness::call`] when neither the options nor
/// the harness override it.
pub const DEFAULT_CALL_SP: u16 = 0xFF00;

/// Options for [`Harness::run`] and [`Harness::call`].
#[derive(Default)]
pub struct RunOptions {
    /// Maximum instructions to execute; exceeding it is a normal stop,
    /// not an error. 0 means the default budget.
    pub steps: u64,
    /// Stop when the started routine returns (RET executed with SP back
    /// at entry + 2).
    pub call: bool,
    /// Seed SP before running.
    pub sp: Option<Addr>,
    /// Install a breakpoint for the duration of this run.
    pub break_at: Option<Addr>,
    /// Count executed instructions per address.
    pub coverage: bool,
}

impl RunOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn steps(mut self, steps: u64) -> Self {
        self.steps = steps;
        self
    }

    #[must_use]
    pub fn call(mut self) -> Self {
        self.call = true;
        self
    }

    #[must_use]
    pub fn sp(mut self, sp: impl Into<Addr>) -> Self {
        self.sp = Some(sp.into());
        self
    }

    #[must_use]
    pub fn break_at(mut self, addr: impl Into<Addr>) -> Self {
        self.break_at = Some(addr.into());
        self
    }

    #[must_use]
    pub fn coverage(mut self) -> Self {
        self.coverage = true;
        self
    }

    fn step_limit(&self) -> u64 {
        if self.steps == 0 {
            DEFAULT_STEP_LIMIT
        } else {
            self.steps
        }
    }
}

/// Result of a run: instructions executed, T-states consumed, and the
/// per-address execution counts when coverage was requested.
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    pub instructions: u64,
    pub t_states: u64,
    pub coverage: HashMap<u16, u64>,
}

/// In-memory snapshot of the RAM image and symbol table.
#[derive(Clone)]
pub struct MemorySnapshot {
    image: Vec<u8>,
    symbols: HashMap<String, u16>,
}

type MemReadHook = Box<dyn FnMut(u16) -> Option<u8>>;
type MemWriteHook = Box<dyn FnMut(u16, u8) -> bool>;
type IoReadHook = Box<dyn FnMut(u16) -> u8>;
type IoWriteHook = Box<dyn FnMut(u16, u8)>;

#[derive(Default)]
struct Hooks {
    mem_read: Option<MemReadHook>,
    mem_write: Option<MemWriteHook>,
    io_read: Option<IoReadHook>,
    io_write: Option<IoWriteHook>,
}

/// The bus the CPU sees: hooks first, backing memory as the fallback.
struct HarnessBus<'a> {
    memory: &'a mut Memory,
    hooks: &'a mut Hooks,
}

impl Bus for HarnessBus<'_> {
    fn mem_read(&mut self, addr: u16) -> u8 {
        if let Some(hook) = &mut self.hooks.mem_read {
            if let Some(value) = hook(addr) {
                return value;
            }
        }
        self.memory.read(addr)
    }

    fn mem_write(&mut self, addr: u16, value: u8) {
        if let Some(hook) = &mut self.hooks.mem_write {
            if hook(addr, value) {
                return;
            }
        }
        self.memory.write(addr, value);
    }

    fn io_read(&mut self, port: u16) -> u8 {
        match &mut self.hooks.io_read {
            Some(hook) => hook(port),
            None => 0xFF,
        }
    }

    fn io_write(&mut self, port: u16, value: u8) {
        if let Some(hook) = &mut self.hooks.io_write {
            hook(port, value);
        }
    }
}

/// Owns one CPU, 64 KiB of memory, a symbol table, breakpoints, the
/// step-mock chain and the bus hooks. Tests construct one per scenario.
pub struct Harness {
    cpu: Z80,
    memory: Memory,
    symbols: SymbolTable,
    breakpoints: HashSet<u16>,
    mocks: Vec<StepMock>,
    hooks: Hooks,
    assembler: Option<Box<dyn Assembler>>,
    default_call_sp: u16,
    trace: bool,
}

impl Harness {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cpu: Z80::new(),
            memory: Memory::new(),
            symbols: SymbolTable::new(),
            breakpoints: HashSet::new(),
            mocks: Vec::new(),
            hooks: Hooks::default(),
            assembler: None,
            default_call_sp: DEFAULT_CALL_SP,
            trace: false,
        }
    }

    pub fn cpu(&self) -> &Z80 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Z80 {
        &mut self.cpu
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Install the assembler collaborator used by `compile`.
    pub fn set_assembler(&mut self, assembler: impl Assembler + 'static) {
        self.assembler = Some(Box::new(assembler));
    }

    /// SP used by `call` when the options don't override it.
    pub fn set_default_call_sp(&mut self, sp: u16) {
        self.default_call_sp = sp;
    }

    /// Print a brief register line before every executed instruction.
    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    // -----------------------------------------------------------------------
    // Addresses and loading
    // -----------------------------------------------------------------------

    /// Resolve a numeric or symbolic address.
    ///
    /// # Errors
    ///
    /// `SymbolNotFound` when a symbol is not in the table.
    pub fn get_address(&self, addr: impl Into<Addr>) -> Result<u16> {
        match addr.into() {
            Addr::Num(n) => Ok(n),
            Addr::Sym(name) => self
                .symbols
                .lookup(&name)
                .ok_or(BenchError::SymbolNotFound(name)),
        }
    }

    /// Write bytes into backing memory at the resolved address.
    ///
    /// # Errors
    ///
    /// `SymbolNotFound` when `start` is an unknown symbol.
    pub fn load(&mut self, bytes: &[u8], start: impl Into<Addr>) -> Result<()> {
        let start = self.get_address(start)?;
        self.memory.load(start, bytes);
        Ok(())
    }

    /// Merge a compiled program's symbols and load its bytes at 0.
    pub fn load_program(&mut self, program: &Program) {
        self.symbols.merge(&program.symbols);
        self.memory.load(0, &program.data);
    }

    /// Assemble source via the installed collaborator and load the result.
    ///
    /// # Errors
    ///
    /// `NoAssembler` without a collaborator, `Assemble` on assembler
    /// failure, `SymbolNotFound` for a symbolic `start`.
    pub fn compile(&mut self, source: &str, start: Option<Addr>) -> Result<()> {
        let origin = match start {
            Some(addr) => self.get_address(addr)?,
            None => 0,
        };
        let assembler = self.assembler.as_ref().ok_or(BenchError::NoAssembler)?;
        let program = assembler
            .assemble(source, origin)
            .map_err(BenchError::Assemble)?;
        self.load_program(&program);
        Ok(())
    }

    /// Read a source file and `compile` it.
    ///
    /// # Errors
    ///
    /// `Io` for filesystem problems, plus everything `compile` raises.
    pub fn compile_file(&mut self, path: impl AsRef<Path>, start: Option<Addr>) -> Result<()> {
        let source = fs::read_to_string(path)?;
        self.compile(&source, start)
    }

    /// Copy of a memory slice at the resolved address.
    ///
    /// # Errors
    ///
    /// `SymbolNotFound` when `start` is an unknown symbol.
    pub fn get_memory(&self, start: impl Into<Addr>, length: usize) -> Result<Vec<u8>> {
        let start = self.get_address(start)?;
        Ok(self.memory.copy_range(start, length))
    }

    // -----------------------------------------------------------------------
    // Breakpoints and step mocks
    // -----------------------------------------------------------------------

    /// Stop the run loop whenever PC reaches this address.
    ///
    /// # Errors
    ///
    /// `SymbolNotFound` for an unknown symbol.
    pub fn set_breakpoint(&mut self, addr: impl Into<Addr>) -> Result<()> {
        let addr = self.get_address(addr)?;
        self.breakpoints.insert(addr);
        Ok(())
    }

    /// Remove a breakpoint.
    ///
    /// # Errors
    ///
    /// `SymbolNotFound` for an unknown symbol.
    pub fn clear_breakpoint(&mut self, addr: impl Into<Addr>) -> Result<()> {
        let addr = self.get_address(addr)?;
        self.breakpoints.remove(&addr);
        Ok(())
    }

    /// Replace the subroutine at `addr` with a host callback. The mock
    /// fires only when control arrives by CALL, RST or an interrupt; it
    /// runs the callback, then simulates the RET so the caller resumes
    /// with stack discipline intact. Fallthrough and jumps are untouched.
    ///
    /// # Errors
    ///
    /// `SymbolNotFound` for an unknown symbol.
    pub fn mock_call(
        &mut self,
        addr: impl Into<Addr>,
        callback: impl FnMut(&mut StepContext<'_>) + 'static,
    ) -> Result<()> {
        let addr = self.get_address(addr)?;
        self.push_mock(StepMock::FakeCall {
            addr,
            callback: Box::new(callback),
        });
        Ok(())
    }

    /// Observe steps at one PC. The callback decides the step's fate.
    ///
    /// # Errors
    ///
    /// `SymbolNotFound` for an unknown symbol.
    pub fn mock_step(
        &mut self,
        addr: impl Into<Addr>,
        callback: impl FnMut(&mut StepContext<'_>) -> StepAction + 'static,
    ) -> Result<()> {
        let addr = self.get_address(addr)?;
        self.push_mock(StepMock::OnStep {
            addr,
            callback: Box::new(callback),
        });
        Ok(())
    }

    /// Observe every step.
    pub fn mock_all_steps(
        &mut self,
        callback: impl FnMut(&mut StepContext<'_>) -> StepAction + 'static,
    ) {
        self.push_mock(StepMock::OnEveryStep {
            callback: Box::new(callback),
        });
    }

    /// Append the logging observer: one brief register line per step.
    pub fn log_each_step(&mut self) {
        self.push_mock(StepMock::Logger);
    }

    /// Keep the chain in its documented order: fake-call observers,
    /// then on-step, on-every-step, and the logger last. Mocks of the
    /// same kind stay in insertion order.
    fn push_mock(&mut self, mock: StepMock) {
        let position = self
            .mocks
            .partition_point(|existing| existing.priority() <= mock.priority());
        self.mocks.insert(position, mock);
    }

    // -----------------------------------------------------------------------
    // Bus hooks
    // -----------------------------------------------------------------------

    /// Shadow memory reads. `None` falls through to backing memory.
    pub fn on_mem_read(&mut self, hook: impl FnMut(u16) -> Option<u8> + 'static) {
        self.hooks.mem_read = Some(Box::new(hook));
    }

    /// Observe memory writes. Returning `true` suppresses the write to
    /// backing memory.
    pub fn on_mem_write(&mut self, hook: impl FnMut(u16, u8) -> bool + 'static) {
        self.hooks.mem_write = Some(Box::new(hook));
    }

    /// Answer IN instructions. Without a hook, reads float to 0xFF.
    pub fn on_io_read(&mut self, hook: impl FnMut(u16) -> u8 + 'static) {
        self.hooks.io_read = Some(Box::new(hook));
    }

    /// Observe OUT instructions.
    pub fn on_io_write(&mut self, hook: impl FnMut(u16, u8) + 'static) {
        self.hooks.io_write = Some(Box::new(hook));
    }

    // -----------------------------------------------------------------------
    // Running
    // -----------------------------------------------------------------------

    /// Run from `start` (or the current PC) until a stop condition hits:
    /// HALT, the step budget, a breakpoint, a BREAK from the mock chain,
    /// or - with `options.call` - the started routine returning.
    ///
    /// The loop itself never fails; only resolving the addresses in
    /// `start` and the options can.
    ///
    /// # Errors
    ///
    /// `SymbolNotFound` for unknown symbols in `start`, `sp` or
    /// `break_at`.
    pub fn run(&mut self, start: Option<Addr>, options: RunOptions) -> Result<RunResult> {
        if let Some(addr) = start {
            let pc = self.get_address(addr)?;
            self.cpu.regs.pc = pc;
            self.cpu.set_last_instruction(LastInstruction::None);
            self.cpu.set_halted(false);
        }
        if let Some(sp) = options.sp.clone() {
            self.cpu.regs.sp = self.get_address(sp)?;
        }
        let temp_breakpoint = match options.break_at.clone() {
            Some(addr) => {
                let resolved = self.get_address(addr)?;
                let added = self.breakpoints.insert(resolved);
                Some((resolved, added))
            }
            None => None,
        };

        let entry_sp = self.cpu.regs.sp;
        let step_limit = options.step_limit();
        let mut result = RunResult::default();

        loop {
            if self.cpu.is_halted() {
                break;
            }
            if result.instructions >= step_limit {
                break;
            }
            let pc = self.cpu.regs.pc;
            if self.breakpoints.contains(&pc) {
                break;
            }

            match self.observe_step() {
                StepAction::Break => break,
                StepAction::Skip => continue,
                StepAction::Run => {}
            }

            if options.call
                && self.cpu.last_instruction() == LastInstruction::Ret
                && self.cpu.regs.sp == entry_sp.wrapping_add(2)
            {
                break;
            }

            if self.trace {
                println!("{}", format::brief_registers(&self.cpu));
            }
            if options.coverage {
                *result.coverage.entry(pc).or_insert(0) += 1;
            }

            let mut bus = HarnessBus {
                memory: &mut self.memory,
                hooks: &mut self.hooks,
            };
            result.t_states += u64::from(self.cpu.step(&mut bus));
            result.instructions += 1;
        }

        if let Some((addr, added)) = temp_breakpoint {
            if added {
                self.breakpoints.remove(&addr);
            }
        }
        Ok(result)
    }

    /// Seed SP (from the options or the default call SP) and run with the
    /// call-return stop enabled.
    ///
    /// # Errors
    ///
    /// As for [`Harness::run`].
    pub fn call(&mut self, start: impl Into<Addr>, options: RunOptions) -> Result<RunResult> {
        let mut options = options;
        options.call = true;
        if options.sp.is_none() {
            options.sp = Some(Addr::Num(self.default_call_sp));
        }
        self.run(Some(start.into()), options)
    }

    /// Evaluate the mock chain in order; first non-RUN answer wins.
    fn observe_step(&mut self) -> StepAction {
        if self.mocks.is_empty() {
            return StepAction::Run;
        }
        let mut mocks = std::mem::take(&mut self.mocks);
        let mut action = StepAction::Run;
        {
            let mut ctx = StepContext {
                cpu: &mut self.cpu,
                memory: &mut self.memory,
            };
            for mock in &mut mocks {
                let answer = mock.observe(&mut ctx);
                if answer != StepAction::Run {
                    action = answer;
                    break;
                }
            }
        }
        self.mocks = mocks;
        action
    }

    // -----------------------------------------------------------------------
    // Diagnostics and snapshots
    // -----------------------------------------------------------------------

    /// Multi-line register dump including the shadow bank.
    #[must_use]
    pub fn show_registers(&self) -> String {
        format::full_registers(&self.cpu)
    }

    /// One-line register summary.
    #[must_use]
    pub fn format_brief_registers(&self) -> String {
        format::brief_registers(&self.cpu)
    }

    /// Hex dump of a memory range.
    ///
    /// # Errors
    ///
    /// `SymbolNotFound` for an unknown symbol.
    pub fn dump_memory(&self, start: impl Into<Addr>, length: usize) -> Result<String> {
        let start = self.get_address(start)?;
        Ok(format::dump_memory(&self.memory, start, length))
    }

    /// Capture the RAM image and symbol table.
    #[must_use]
    pub fn save_memory(&self) -> MemorySnapshot {
        MemorySnapshot {
            image: self.memory.image(),
            symbols: self.symbols.snapshot(),
        }
    }

    /// Restore a snapshot taken with [`Harness::save_memory`].
    pub fn load_memory(&mut self, snapshot: &MemorySnapshot) {
        self.memory.restore(&snapshot.image);
        self.symbols.replace(snapshot.symbols.clone());
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
