//! End-to-end scenarios: hand-assembled routines driven through the
//! harness with breakpoints, scripted I/O and call mocks.

use std::cell::RefCell;
use std::rc::Rc;

use z80_bench::{Harness, IoSpy, Program, RunOptions};

/// start: ld a,0 / halt
/// org 20
/// newstart: or a / ld a,$12 / nop / nop / nop
/// breakhere: ld a,$13 / nop / jp newstart
fn break_program() -> Program {
    Program::from_bytes(vec![
        0x3E, 0x00, 0x76, 0x00, 0x00, 0x00, 0x00, 0x00, //
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
        0x00, 0x00, 0x00, 0x00, 0xB7, 0x3E, 0x12, 0x00, //
        0x00, 0x00, 0x3E, 0x13, 0x00, 0xC3, 0x14, 0x00,
    ])
    .symbol("start", 0)
    .symbol("newstart", 20)
    .symbol("breakhere", 26)
}

/// write_line: sends the NUL-terminated string at (HL) to port 8,
/// waiting for port 9 to report ready (0) before each byte.
///
/// ```text
/// write_line:  ld a,(hl)
///              or a
///              ret z
/// wl_wait:     in a,($09)
///              or a
///              jr nz,wl_wait
///              ld a,(hl)
///              out ($08),a
///              inc hl
///              jr write_line
/// ```
const WRITE_LINE: &[u8] = &[
    0x7E, 0xB7, 0xC8, 0xDB, 0x09, 0xB7, 0x20, 0xFB, 0x7E, 0xD3, 0x08, 0x23, 0x18, 0xF2,
];

/// read_char: waits for port 9 to report ready, then reads port 8.
///
/// ```text
/// read_char:   in a,($09)
///              or a
///              jr nz,read_char
///              in a,($08)
///              ret
/// ```
const READ_CHAR: &[u8] = &[0xDB, 0x09, 0xB7, 0x20, 0xFB, 0xDB, 0x08, 0xC9];

/// sound_bell: pulses port 6 high, burns a nested countdown, pulses it
/// low again.
///
/// ```text
/// sound_bell:  ld a,$ff
///              out ($06),a
///              ld bc,$ff10
/// sound_bell1: djnz sound_bell1
///              dec c
///              jr nz,sound_bell1
///              xor a
///              out ($06),a
///              ret
/// ```
const SOUND_BELL: &[u8] = &[
    0x3E, 0xFF, 0xD3, 0x06, 0x01, 0x10, 0xFF, 0x10, 0xFE, 0x0D, 0x20, 0xFB, 0xAF, 0xD3, 0x06,
    0xC9,
];

#[test]
fn compile_and_break() {
    let mut harness = Harness::new();
    harness.load_program(&break_program());

    harness
        .run(
            Some("newstart".into()),
            RunOptions::new().break_at("breakhere"),
        )
        .unwrap();

    assert_eq!(harness.cpu().regs.a, 0x12);
    assert!(harness.cpu().regs.flags().z, "or a of zero set Z");
}

#[test]
fn raw_bytes_with_numeric_breakpoint() {
    let mut harness = Harness::new();
    harness
        .load(
            &[
                0x3E, 0x00, 0x76, 0x00, 0x00, 0x00, 0x00, 0x00, //
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
                0x00, 0x00, 0x00, 0x00, 0xB7, 0x3E, 0x12, 0x00, //
                0x00, 0x00, 0x3E, 0x13, 0x00, 0xC3, 0x14, 0x00,
            ],
            0u16,
        )
        .unwrap();

    harness
        .run(Some(20u16.into()), RunOptions::new().break_at(26u16))
        .unwrap();

    assert_eq!(harness.cpu().regs.a, 0x12);
    assert!(harness.cpu().regs.flags().z);
}

#[test]
fn write_line_sends_the_string_to_port_8() {
    let mut harness = Harness::new();
    let program = Program::from_bytes({
        let mut data = vec![0; 0x0200];
        data.extend_from_slice(WRITE_LINE);
        data
    })
    .symbol("write_line", 0x0200);
    harness.load_program(&program);
    harness.load(b"Hello\0", 0x5000u16).unwrap();
    harness.cpu_mut().regs.set_hl(0x5000);

    // Port 9 always reads ready (0); exactly "Hello" goes out on port 8.
    let spy = IoSpy::new().expect_write(8u16, "Hello").ignoring_reads();
    spy.attach(&mut harness);

    harness
        .call("write_line", RunOptions::new().sp(0xFF00u16))
        .unwrap();

    spy.assert_complete();
    assert_eq!(harness.cpu().regs.hl(), 0x5005, "stopped on the NUL");
}

#[test]
fn read_char_waits_for_ready_then_reads() {
    let mut harness = Harness::new();
    let program = Program::from_bytes({
        let mut data = vec![0; 0x0240];
        data.extend_from_slice(READ_CHAR);
        data
    })
    .symbol("read_char", 0x0240);
    harness.load_program(&program);

    // Busy three times, then ready; then the data byte arrives.
    let spy = IoSpy::new()
        .expect_read(9u16, vec![0xFF, 0xFF, 0xFF, 0x00])
        .expect_read(8u16, 65u8);
    spy.attach(&mut harness);

    harness
        .call("read_char", RunOptions::new().sp(0xFF00u16))
        .unwrap();

    spy.assert_complete();
    assert_eq!(harness.cpu().regs.a, 65);
}

#[test]
fn sound_bell_pulses_the_speaker_and_spins_the_loop() {
    let mut harness = Harness::new();
    let program = Program::from_bytes({
        let mut data = vec![0; 0x0280];
        data.extend_from_slice(SOUND_BELL);
        data
    })
    .symbol("sound_bell", 0x0280)
    .symbol("sound_bell1", 0x0287);
    harness.load_program(&program);

    let spy = IoSpy::new().expect_write(6u16, vec![0xFF, 0x00]);
    spy.attach(&mut harness);

    // Count instruction fetches of the DJNZ at sound_bell1.
    let fetches = Rc::new(RefCell::new(0u64));
    let counter = fetches.clone();
    harness.on_mem_read(move |addr| {
        if addr == 0x0287 {
            *counter.borrow_mut() += 1;
        }
        None
    });

    harness
        .call("sound_bell", RunOptions::new().sp(0xFF00u16))
        .unwrap();

    spy.assert_complete();
    assert_eq!(
        *fetches.borrow(),
        0x100 * 0x10 - 1,
        "255 inner iterations on the first pass, 256 on the other fifteen"
    );
}

#[test]
fn fake_call_scenario() {
    // start: ld a,5 / call sub / add a,1 / halt ... sub: ret
    let program = Program::from_bytes(vec![
        0x3E, 0x05, // 0000: LD A,5
        0xCD, 0x08, 0x00, // 0002: CALL sub
        0xC6, 0x01, // 0005: ADD A,1
        0x76, // 0007: HALT
        0xC9, // 0008: sub: RET
    ])
    .symbol("start", 0)
    .symbol("sub", 8);

    // Without mocks the subroutine is a plain RET: A = 5 + 1.
    let mut harness = Harness::new();
    harness.load_program(&program);
    harness
        .run(Some("start".into()), RunOptions::new().sp(0xFF00u16))
        .unwrap();
    assert_eq!(harness.cpu().regs.a, 6);

    // With a fake call adding 10 the body is replaced: A = 5 + 10 + 1.
    let mut harness = Harness::new();
    harness.load_program(&program);
    harness
        .mock_call("sub", |ctx| {
            ctx.cpu.regs.a = ctx.cpu.regs.a.wrapping_add(10);
        })
        .unwrap();
    harness
        .run(Some("start".into()), RunOptions::new().sp(0xFF00u16))
        .unwrap();
    assert_eq!(harness.cpu().regs.a, 16);
}

#[test]
fn coverage_spans_the_executed_range() {
    let mut harness = Harness::new();
    harness.load_program(&break_program());

    let result = harness
        .run(
            Some("newstart".into()),
            RunOptions::new().break_at("breakhere").coverage(),
        )
        .unwrap();

    assert_eq!(result.coverage.get(&20), Some(&1), "or a");
    assert_eq!(result.coverage.get(&21), Some(&1), "ld a,$12");
    assert_eq!(result.coverage.get(&26), None, "never reached breakhere");
    assert_eq!(result.instructions, 5);
}
