//! I/O spy behaviour: scripted reads, checked writes, direction rules,
//! symbolic ports and the completeness predicate.

use z80_bench::{Harness, IoSpy, Program, RunOptions};

#[test]
fn scripted_reads_are_answered_in_order() {
    let mut harness = Harness::new();
    harness.load(&[
        0xDB, 0x09, // IN A,(9)
        0x47, // LD B,A
        0xDB, 0x09, // IN A,(9)
        0x76, // HALT
    ], 0u16).unwrap();
    let spy = IoSpy::new().expect_read(9u16, vec![0x11, 0x22]);
    spy.attach(&mut harness);

    harness.run(None, RunOptions::new()).unwrap();

    assert_eq!(harness.cpu().regs.b, 0x11);
    assert_eq!(harness.cpu().regs.a, 0x22);
    assert!(spy.is_complete());
    assert!(spy.failures().is_empty());
    spy.assert_complete();
}

#[test]
fn write_values_are_checked() {
    let mut harness = Harness::new();
    harness.load(&[
        0x3E, 0x55, // LD A,0x55
        0xD3, 0x08, // OUT (8),A
        0x76,
    ], 0u16).unwrap();
    let spy = IoSpy::new().expect_write(8u16, 0x99u8);
    spy.attach(&mut harness);

    harness.run(None, RunOptions::new()).unwrap();

    assert!(spy.is_complete(), "the transaction was consumed");
    let failures = spy.failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("0x55"), "got: {}", failures[0]);
}

#[test]
fn wrong_port_is_recorded() {
    let mut harness = Harness::new();
    harness.load(&[
        0x3E, 0x01, // LD A,1
        0xD3, 0x07, // OUT (7),A
        0x76,
    ], 0u16).unwrap();
    let spy = IoSpy::new().expect_write(8u16, 0x01u8);
    spy.attach(&mut harness);

    harness.run(None, RunOptions::new()).unwrap();

    let failures = spy.failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("expected port"), "got: {}", failures[0]);
}

#[test]
fn wrong_direction_is_recorded() {
    let mut harness = Harness::new();
    harness.load(&[
        0xDB, 0x08, // IN A,(8) while a write is expected
        0x76,
    ], 0u16).unwrap();
    let spy = IoSpy::new().expect_write(8u16, 0x01u8);
    spy.attach(&mut harness);

    harness.run(None, RunOptions::new()).unwrap();

    let failures = spy.failures();
    assert_eq!(failures.len(), 1);
    assert!(
        failures[0].contains("not expecting an IO read"),
        "got: {}",
        failures[0]
    );
    assert!(!spy.is_complete());
}

#[test]
fn ignoring_reads_passes_them_silently_as_zero() {
    let mut harness = Harness::new();
    harness.load(&[
        0xDB, 0x09, // IN A,(9) - ignored, returns 0
        0x3E, 0x0A, // LD A,10
        0xD3, 0x08, // OUT (8),A
        0x76,
    ], 0u16).unwrap();
    let spy = IoSpy::new()
        .expect_write(8u16, 0x0Au8)
        .ignoring_reads();
    spy.attach(&mut harness);

    harness.run(None, RunOptions::new()).unwrap();

    assert!(spy.is_complete());
    assert!(spy.failures().is_empty());
}

#[test]
fn string_payload_expects_one_transaction_per_character() {
    let mut harness = Harness::new();
    harness.load(&[
        0x3E, 0x48, 0xD3, 0x08, // OUT 'H'
        0x3E, 0x69, 0xD3, 0x08, // OUT 'i'
        0x76,
    ], 0u16).unwrap();
    let spy = IoSpy::new().expect_write(8u16, "Hi");
    spy.attach(&mut harness);

    harness.run(None, RunOptions::new()).unwrap();

    assert!(spy.is_complete());
    assert!(spy.failures().is_empty());
}

#[test]
fn symbolic_ports_resolve_through_the_harness() {
    let mut harness = Harness::new();
    let program = Program::from_bytes(vec![
        0x3E, 0x01, // LD A,1
        0xD3, 0x20, // OUT (0x20),A
        0x76,
    ])
    .symbol("printer", 0x20);
    harness.load_program(&program);
    let spy = IoSpy::new().expect_write("printer", 0x01u8);
    spy.attach(&mut harness);

    harness.run(None, RunOptions::new()).unwrap();

    assert!(spy.is_complete());
    assert!(spy.failures().is_empty());
}

#[test]
fn unresolved_port_symbol_is_a_failure_not_a_crash() {
    let mut harness = Harness::new();
    harness.load(&[
        0x3E, 0x01, // LD A,1
        0xD3, 0x20, // OUT (0x20),A
        0x76,
    ], 0u16).unwrap();
    let spy = IoSpy::new().expect_write("printer", 0x01u8);
    spy.attach(&mut harness);

    harness.run(None, RunOptions::new()).unwrap();

    let failures = spy.failures();
    assert!(
        failures.iter().any(|f| f.contains("Symbol printer not found")),
        "got: {failures:?}"
    );
}

#[test]
fn traffic_after_script_completion_is_a_failure() {
    let mut harness = Harness::new();
    harness.load(&[
        0x3E, 0x01, // LD A,1
        0xD3, 0x08, // OUT (8),A
        0xD3, 0x08, // OUT (8),A again - unscripted
        0x76,
    ], 0u16).unwrap();
    let spy = IoSpy::new().expect_write(8u16, 0x01u8);
    spy.attach(&mut harness);

    harness.run(None, RunOptions::new()).unwrap();

    assert!(spy.is_complete());
    let failures = spy.failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("script complete"), "got: {}", failures[0]);
}

#[test]
#[should_panic(expected = "IO spy not satisfied")]
fn assert_complete_panics_on_leftover_expectations() {
    let spy = IoSpy::new().expect_read(9u16, vec![0xFF, 0x00]);
    spy.assert_complete();
}
