//! Scripted I/O expectations.
//!
//! An [`IoSpy`] is built as an ordered list of phases, each expecting a
//! run of reads or writes on one port. Attached to a harness it replaces
//! the I/O hooks: reads are answered from the script, writes are checked
//! against it. Mismatches never abort the run - they are recorded so the
//! test can fail with complete diagnostics afterwards, via
//! [`IoSpy::assert_complete`].

use std::cell::RefCell;
use std::fmt::Write as _;
use std::rc::Rc;

use crate::harness::Harness;
use crate::program::Addr;
use crate::symbols::SymbolTable;

/// Expectation payload: one byte, a byte run, or a text string (one
/// expected transaction per character).
#[derive(Debug, Clone)]
pub struct Bytes(pub Vec<u8>);

impl From<u8> for Bytes {
    fn from(value: u8) -> Self {
        Bytes(vec![value])
    }
}

impl From<&[u8]> for Bytes {
    fn from(value: &[u8]) -> Self {
        Bytes(value.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Bytes {
    fn from(value: &[u8; N]) -> Self {
        Bytes(value.to_vec())
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(value: Vec<u8>) -> Self {
        Bytes(value)
    }
}

impl From<&str> for Bytes {
    fn from(value: &str) -> Self {
        Bytes(value.bytes().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Read,
    Write,
}

struct Phase {
    direction: Direction,
    port: Addr,
    values: Vec<u8>,
    consumed: usize,
    /// Let opposite-direction traffic pass silently while this phase is
    /// current (reads passed this way return 0).
    ignore_opposite: bool,
}

#[derive(Default)]
struct SpyInner {
    phases: Vec<Phase>,
    current: usize,
    failures: Vec<String>,
    symbols: Option<SymbolTable>,
}

/// Scripted recorder-expectation object for port traffic.
///
/// Cheap to clone (shared interior), so tests keep a handle for the
/// completeness assertion after attaching the hooks to a harness.
#[derive(Clone, Default)]
pub struct IoSpy {
    inner: Rc<RefCell<SpyInner>>,
}

impl IoSpy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a read phase: the next `values.len()` IN transactions must
    /// hit `port` and are answered with the scripted bytes in order.
    #[must_use]
    pub fn expect_read(self, port: impl Into<Addr>, values: impl Into<Bytes>) -> Self {
        self.push_phase(Direction::Read, port.into(), values.into());
        self
    }

    /// Append a write phase: the next `values.len()` OUT transactions
    /// must hit `port` with the scripted bytes in order.
    #[must_use]
    pub fn expect_write(self, port: impl Into<Addr>, values: impl Into<Bytes>) -> Self {
        self.push_phase(Direction::Write, port.into(), values.into());
        self
    }

    /// Let reads pass silently (answered with 0) while the most recently
    /// added phase is current.
    #[must_use]
    pub fn ignoring_reads(self) -> Self {
        self.mark_ignore();
        self
    }

    /// Let writes pass silently while the most recently added phase is
    /// current.
    #[must_use]
    pub fn ignoring_writes(self) -> Self {
        self.mark_ignore();
        self
    }

    /// Install this spy as the harness's I/O hooks and bind the symbol
    /// table for lazy port resolution.
    pub fn attach(&self, harness: &mut Harness) {
        self.inner.borrow_mut().symbols = Some(harness.symbols().clone());

        let spy = self.clone();
        harness.on_io_read(move |port| spy.inner.borrow_mut().handle_read(port));
        let spy = self.clone();
        harness.on_io_write(move |port, value| spy.inner.borrow_mut().handle_write(port, value));
    }

    /// True iff every scripted phase has been fully consumed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        let inner = self.inner.borrow();
        inner.current >= inner.phases.len()
    }

    /// Recorded mismatches, in order of occurrence.
    #[must_use]
    pub fn failures(&self) -> Vec<String> {
        self.inner.borrow().failures.clone()
    }

    /// Panic unless the script completed with no mismatches. The message
    /// lists every recorded failure and any unconsumed expectations.
    pub fn assert_complete(&self) {
        let inner = self.inner.borrow();
        let mut problems = String::new();
        for failure in &inner.failures {
            let _ = writeln!(problems, "  {failure}");
        }
        for phase in &inner.phases[inner.current.min(inner.phases.len())..] {
            let _ = writeln!(
                problems,
                "  unconsumed {} expectation on port {:?} ({} of {} left)",
                match phase.direction {
                    Direction::Read => "read",
                    Direction::Write => "write",
                },
                phase.port,
                phase.values.len() - phase.consumed,
                phase.values.len(),
            );
        }
        assert!(problems.is_empty(), "IO spy not satisfied:\n{problems}");
    }

    fn push_phase(&self, direction: Direction, port: Addr, values: Bytes) {
        if values.0.is_empty() {
            return;
        }
        self.inner.borrow_mut().phases.push(Phase {
            direction,
            port,
            values: values.0,
            consumed: 0,
            ignore_opposite: false,
        });
    }

    fn mark_ignore(&self) {
        if let Some(phase) = self.inner.borrow_mut().phases.last_mut() {
            phase.ignore_opposite = true;
        }
    }
}

impl SpyInner {
    fn handle_read(&mut self, port: u16) -> u8 {
        let masked = port & 0xFF;

        if self.current >= self.phases.len() {
            self.failures.push(format!(
                "not expecting an IO read (port {masked:#04X}) - script complete"
            ));
            return 0;
        }
        if self.phases[self.current].direction != Direction::Read {
            if self.phases[self.current].ignore_opposite {
                return 0;
            }
            self.failures
                .push(format!("not expecting an IO read (port {masked:#04X})"));
            return 0;
        }

        if let Some(expected) = self.resolve_current_port() {
            if expected & 0xFF != masked {
                self.failures.push(format!(
                    "IO read on port {masked:#04X}, expected port {:#04X}",
                    expected & 0xFF
                ));
            }
        }

        let phase = &mut self.phases[self.current];
        let value = phase.values[phase.consumed];
        phase.consumed += 1;
        if phase.consumed >= phase.values.len() {
            self.current += 1;
        }
        value
    }

    fn handle_write(&mut self, port: u16, value: u8) {
        let masked = port & 0xFF;

        if self.current >= self.phases.len() {
            self.failures.push(format!(
                "not expecting an IO write (port {masked:#04X}, value {value:#04X}) - script complete"
            ));
            return;
        }
        if self.phases[self.current].direction != Direction::Write {
            if self.phases[self.current].ignore_opposite {
                return;
            }
            self.failures.push(format!(
                "not expecting an IO write (port {masked:#04X}, value {value:#04X})"
            ));
            return;
        }

        if let Some(expected) = self.resolve_current_port() {
            if expected & 0xFF != masked {
                self.failures.push(format!(
                    "IO write on port {masked:#04X}, expected port {:#04X}",
                    expected & 0xFF
                ));
            }
        }

        let phase = &mut self.phases[self.current];
        let expected_value = phase.values[phase.consumed];
        if value != expected_value {
            self.failures.push(format!(
                "IO write of {value:#04X} on port {masked:#04X}, expected {expected_value:#04X}"
            ));
        }
        phase.consumed += 1;
        if phase.consumed >= phase.values.len() {
            self.current += 1;
        }
    }

    /// Resolve the current phase's port, recording a failure for an
    /// unresolvable symbol (the transaction is still consumed so the run
    /// can continue producing diagnostics).
    fn resolve_current_port(&mut self) -> Option<u16> {
        match self.phases[self.current].port.clone() {
            Addr::Num(n) => Some(n),
            Addr::Sym(name) => {
                let resolved = self.symbols.as_ref().and_then(|table| table.lookup(&name));
                if resolved.is_none() {
                    self.failures
                        .push(format!("Symbol {name} not found for port expectation"));
                }
                resolved
            }
        }
    }
}
