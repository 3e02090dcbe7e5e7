//! Memory and I/O bus interface.

/// Memory and I/O bus interface.
///
/// The CPU reaches all external state through this trait: opcode fetches,
/// operand reads, stack traffic and port I/O. The bus borrows mutably for
/// the duration of each `step()`/`interrupt()` call, so implementations
/// are free to record or script every access.
///
/// All operations are total. A bus never fails; at most it returns a
/// default byte for unmapped reads.
pub trait Bus {
    /// Read a byte from the given memory address.
    fn mem_read(&mut self, addr: u16) -> u8;

    /// Write a byte to the given memory address.
    fn mem_write(&mut self, addr: u16, value: u8);

    /// Read a byte from the given 16-bit I/O port.
    ///
    /// The high byte carries A or B depending on the instruction;
    /// implementations usually mask with `0xFF` for the canonical port
    /// number.
    fn io_read(&mut self, port: u16) -> u8;

    /// Write a byte to the given 16-bit I/O port.
    fn io_write(&mut self, port: u16, value: u8);
}
