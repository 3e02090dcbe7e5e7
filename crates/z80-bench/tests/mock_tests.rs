//! Step-mock chain behaviour: breakpoint-style stops, skips, fake calls
//! and chain ordering.

use std::cell::RefCell;
use std::rc::Rc;

use z80_bench::{Harness, RunOptions, StepAction};

#[test]
fn mock_step_can_break() {
    let mut harness = Harness::new();
    harness.load(&[
        0x3E, 0x01, // 0000: LD A,1
        0x3E, 0x02, // 0002: LD A,2
        0x76, // 0004: HALT
    ], 0u16).unwrap();
    harness
        .mock_step(0x0002u16, |_| StepAction::Break)
        .unwrap();

    let result = harness.run(None, RunOptions::new()).unwrap();

    assert_eq!(harness.cpu().regs.a, 1, "stopped before the second load");
    assert_eq!(result.instructions, 1);
}

#[test]
fn mock_step_skip_suppresses_the_instruction() {
    let mut harness = Harness::new();
    harness.load(&[
        0x3E, 0x01, // 0000: LD A,1
        0x3E, 0x02, // 0002: LD A,2 (skipped)
        0x06, 0x09, // 0004: LD B,9
        0x76, // 0006: HALT
    ], 0u16).unwrap();
    harness
        .mock_step(0x0002u16, |ctx| {
            // Step over the two-byte instruction ourselves.
            ctx.cpu.regs.pc = ctx.cpu.regs.pc.wrapping_add(2);
            StepAction::Skip
        })
        .unwrap();

    let result = harness.run(None, RunOptions::new()).unwrap();

    assert_eq!(harness.cpu().regs.a, 1, "skipped load never ran");
    assert_eq!(harness.cpu().regs.b, 9, "execution resumed after the skip");
    assert_eq!(result.instructions, 3, "skipped instruction not counted");
}

#[test]
fn mock_all_steps_sees_every_pc() {
    let mut harness = Harness::new();
    harness.load(&[0x00, 0x00, 0x00, 0x76], 0u16).unwrap();
    let pcs = Rc::new(RefCell::new(Vec::new()));
    let log = pcs.clone();
    harness.mock_all_steps(move |ctx| {
        log.borrow_mut().push(ctx.cpu.regs.pc);
        StepAction::Run
    });

    harness.run(None, RunOptions::new()).unwrap();

    assert_eq!(*pcs.borrow(), vec![0, 1, 2, 3]);
}

#[test]
fn fake_call_replaces_a_subroutine() {
    let mut harness = Harness::new();
    harness.load(&[
        0x3E, 0x05, // 0000: LD A,5
        0xCD, 0x10, 0x00, // 0002: CALL 0x0010
        0xC6, 0x01, // 0005: ADD A,1
        0x76, // 0007: HALT
    ], 0u16).unwrap();
    // The real body would clobber A; the mock adds 10 instead.
    harness.load(&[0xAF, 0xC9], 0x0010u16).unwrap(); // XOR A; RET
    harness
        .mock_call(0x0010u16, |ctx| {
            ctx.cpu.regs.a = ctx.cpu.regs.a.wrapping_add(10);
        })
        .unwrap();

    harness.run(Some(0u16.into()), RunOptions::new().sp(0xFF00u16)).unwrap();

    assert_eq!(harness.cpu().regs.a, 16, "5 + mock's 10 + 1");
}

#[test]
fn fake_call_fires_for_rst() {
    let mut harness = Harness::new();
    harness.load(&[
        0x3E, 0x01, // LD A,1
        0xD7, // RST 0x10
        0x76, // HALT
    ], 0u16).unwrap();
    harness.load(&[0x76], 0x0010u16).unwrap();
    harness
        .mock_call(0x0010u16, |ctx| ctx.cpu.regs.a = 0x77)
        .unwrap();

    harness.run(None, RunOptions::new().sp(0xFF00u16)).unwrap();

    assert_eq!(harness.cpu().regs.a, 0x77);
    assert_eq!(harness.cpu().regs.pc, 0x0004, "returned past the RST");
}

#[test]
fn fake_call_ignores_plain_jumps() {
    let mut harness = Harness::new();
    harness.load(&[
        0xC3, 0x10, 0x00, // JP 0x0010
    ], 0u16).unwrap();
    harness.load(&[
        0x3E, 0x0A, // 0010: LD A,10
        0x76, // HALT
    ], 0x0010u16).unwrap();
    let fired = Rc::new(RefCell::new(false));
    let flag = fired.clone();
    harness
        .mock_call(0x0010u16, move |_| *flag.borrow_mut() = true)
        .unwrap();

    harness.run(None, RunOptions::new()).unwrap();

    assert!(!*fired.borrow(), "jump must not trigger a call mock");
    assert_eq!(harness.cpu().regs.a, 10, "the real body ran");
}

#[test]
fn fake_call_preserves_stack_discipline() {
    let mut harness = Harness::new();
    harness.load(&[
        0x31, 0x00, 0x80, // LD SP, 0x8000
        0xCD, 0x20, 0x00, // CALL 0x0020
        0x76, // HALT
    ], 0u16).unwrap();
    harness.mock_call(0x0020u16, |_| {}).unwrap();

    harness.run(None, RunOptions::new()).unwrap();

    assert_eq!(harness.cpu().regs.sp, 0x8000, "simulated RET rebalanced SP");
    assert_eq!(harness.cpu().regs.pc, 0x0007, "halted after the call site");
}

#[test]
fn chain_short_circuits_on_first_non_run() {
    let mut harness = Harness::new();
    harness.load(&[0x00, 0x76], 0u16).unwrap();
    let later_ran = Rc::new(RefCell::new(false));

    // Same-kind mocks keep insertion order; the first BREAK wins and the
    // second observer must never fire at that step.
    harness
        .mock_step(0x0000u16, |_| StepAction::Break)
        .unwrap();
    let flag = later_ran.clone();
    harness
        .mock_step(0x0000u16, move |_| {
            *flag.borrow_mut() = true;
            StepAction::Run
        })
        .unwrap();

    harness.run(None, RunOptions::new()).unwrap();

    assert!(!*later_ran.borrow());
}

#[test]
fn fake_call_outranks_step_observers() {
    let mut harness = Harness::new();
    harness.load(&[
        0xCD, 0x10, 0x00, // CALL 0x0010
        0x76, // HALT
    ], 0u16).unwrap();
    let order = Rc::new(RefCell::new(Vec::new()));

    // Installed first, but the fake-call observer still runs first.
    let log = order.clone();
    harness
        .mock_step(0x0010u16, move |_| {
            log.borrow_mut().push("step");
            StepAction::Run
        })
        .unwrap();
    let log = order.clone();
    harness
        .mock_call(0x0010u16, move |_| log.borrow_mut().push("call"))
        .unwrap();

    harness.run(None, RunOptions::new().sp(0xFF00u16)).unwrap();

    assert_eq!(*order.borrow(), vec!["call"], "fake call skipped the step");
}

#[test]
fn mock_addresses_resolve_symbols() {
    let mut harness = Harness::new();
    let program = z80_bench::Program::from_bytes(vec![
        0xCD, 0x05, 0x00, // CALL 0x0005
        0x76, // HALT
        0x00, // pad
        0xC9, // 0005: sub: RET
    ])
    .symbol("sub", 5);
    harness.load_program(&program);
    harness
        .mock_call("sub", |ctx| ctx.cpu.regs.a = 0x42)
        .unwrap();

    harness.run(Some(0u16.into()), RunOptions::new().sp(0xFF00u16)).unwrap();

    assert_eq!(harness.cpu().regs.a, 0x42);

    let err = harness.mock_call("nosuch", |_| {}).unwrap_err();
    assert_eq!(err.to_string(), "Symbol nosuch not found");
}
