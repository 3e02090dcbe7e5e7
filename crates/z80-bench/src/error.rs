//! Harness error type.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BenchError>;

/// Errors surfaced by the harness entry points.
///
/// The CPU core itself never fails; everything here is a user-input
/// problem caught before or while setting up a run.
#[derive(Debug, Error)]
pub enum BenchError {
    /// A symbolic address did not resolve against the symbol table.
    #[error("Symbol {0} not found")]
    SymbolNotFound(String),

    /// `compile` was called with no assembler collaborator installed.
    #[error("no assembler installed")]
    NoAssembler,

    /// The assembler collaborator rejected the source.
    #[error("assembly failed: {0}")]
    Assemble(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
