//! Z80 CPU tests
//!
//! Test suite for the Z80 CPU implementation, organized into:
//! - instructions.rs: Tests for individual instructions and instruction families
//! - interrupts.rs: HALT, EI/DI, interrupt modes, NMI and request queueing
//! - decode.rs: Decoder lengths, timings and prefix handling
//!
//! # References
//! - Z80 CPU User Manual (Zilog UM0080)
//! - The Undocumented Z80 Documented (Sean Young)

use super::*;
use crate::bus::Bus;


// ========== Test Helpers ==========

/// Place bytes in memory starting at `addr`
fn poke(bus: &mut Bus, addr: u16, bytes: &[u8]) {
    for (i, &b) in bytes.iter().enumerate() {
        bus.write_byte(addr.wrapping_add(i as u16), b);
    }
}

/// CPU and bus with `program` at address 0
fn setup(program: &[u8]) -> (Cpu, Bus) {
    let cpu = Cpu::new();
    let mut bus = Bus::new();
    poke(&mut bus, 0, program);
    (cpu, bus)
}

/// Run `n` steps, returning the total T-states
fn run(cpu: &mut Cpu, bus: &mut Bus, n: usize) -> u32 {
    (0..n).map(|_| cpu.step(bus)).sum()
}

/// Helper to assert flags match expected value with detailed output
fn assert_flags(cpu: &Cpu, expected: u8, context: &str) {
    let f = cpu.regs.f();
    let bit = |mask: u8| if f & mask != 0 { 1 } else { 0 };
    assert_eq!(
        f, expected,
        "{}: flags mismatch. Expected {:08b}, got {:08b} (S={} Z={} F5={} H={} F3={} PV={} N={} C={})",
        context,
        expected,
        f,
        bit(flags::S),
        bit(flags::Z),
        bit(flags::F5),
        bit(flags::H),
        bit(flags::F3),
        bit(flags::PV),
        bit(flags::N),
        bit(flags::C),
    );
}
