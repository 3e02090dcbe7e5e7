//! Diagnostic formatters for registers and memory.

use z80_core::{Z80, CF, HF, NF, PF, SF, XF, YF, ZF};

use crate::memory::Memory;

/// One-line register summary, suitable for per-step trace output.
#[must_use]
pub fn brief_registers(cpu: &Z80) -> String {
    let regs = &cpu.regs;
    format!(
        "PC={:04X} AF={:04X} BC={:04X} DE={:04X} HL={:04X} IX={:04X} IY={:04X} SP={:04X} {}",
        regs.pc,
        regs.af(),
        regs.bc(),
        regs.de(),
        regs.hl(),
        regs.ix,
        regs.iy,
        regs.sp,
        flag_string(regs.f),
    )
}

/// Multi-line register dump including the shadow bank and interrupt state.
#[must_use]
pub fn full_registers(cpu: &Z80) -> String {
    let regs = &cpu.regs;
    let mut out = String::new();
    out.push_str(&format!(
        "AF ={:04X} BC ={:04X} DE ={:04X} HL ={:04X}  {}\n",
        regs.af(),
        regs.bc(),
        regs.de(),
        regs.hl(),
        flag_string(regs.f),
    ));
    out.push_str(&format!(
        "AF'={:04X} BC'={:04X} DE'={:04X} HL'={:04X}\n",
        regs.af_alt(),
        regs.bc_alt(),
        regs.de_alt(),
        regs.hl_alt(),
    ));
    out.push_str(&format!(
        "IX ={:04X} IY ={:04X} SP ={:04X} PC ={:04X}\n",
        regs.ix, regs.iy, regs.sp, regs.pc,
    ));
    out.push_str(&format!(
        "I  =  {:02X} R  =  {:02X} IM ={} IFF1={} IFF2={}{}",
        regs.i,
        regs.r,
        regs.im,
        u8::from(regs.iff1),
        u8::from(regs.iff2),
        if cpu.is_halted() { " HALTED" } else { "" },
    ));
    out
}

/// Hex dump with an ASCII column, 16 bytes per row.
#[must_use]
pub fn dump_memory(memory: &Memory, start: u16, length: usize) -> String {
    let mut out = String::new();
    let mut offset = 0;
    while offset < length {
        let row_addr = start.wrapping_add(offset as u16);
        let row_len = (length - offset).min(16);
        let bytes = memory.copy_range(row_addr, row_len);

        out.push_str(&format!("{row_addr:04X} "));
        for i in 0..16 {
            if i < bytes.len() {
                out.push_str(&format!(" {:02X}", bytes[i]));
            } else {
                out.push_str("   ");
            }
        }
        out.push_str("  |");
        for &byte in &bytes {
            out.push(if (0x20..0x7F).contains(&byte) {
                byte as char
            } else {
                '.'
            });
        }
        out.push_str("|\n");

        offset += row_len;
    }
    out
}

/// Flag letters, uppercase when set: `SZYHXPNC` with dots for clear bits.
fn flag_string(f: u8) -> String {
    [
        (SF, 'S'),
        (ZF, 'Z'),
        (YF, 'Y'),
        (HF, 'H'),
        (XF, 'X'),
        (PF, 'P'),
        (NF, 'N'),
        (CF, 'C'),
    ]
    .iter()
    .map(|&(bit, letter)| if f & bit != 0 { letter } else { '.' })
    .collect()
}
