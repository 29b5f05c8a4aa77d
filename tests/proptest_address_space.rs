//! Property-based tests for the address space and CPU invariants.
//!
//! These tests use proptest to verify that the memory map, the display
//! projection and the register file hold their contracts across the whole
//! input range.

use proptest::prelude::*;
use z80_textmode::bus::Bus;
use z80_textmode::cpu::{Cpu, Reg8, RegPair};
use z80_textmode::{project, Cursor, Machine};

/// Bus with `bytes` placed at 0x0000
fn bus_with_program(bytes: &[u8]) -> Bus {
    let mut bus = Bus::new();
    for (i, &b) in bytes.iter().enumerate() {
        bus.write_byte(i as u16, b);
    }
    bus
}

// ========== Address Space Property Tests ==========

proptest! {
    /// Property: every RAM address stores and returns the written byte
    #[test]
    fn prop_ram_roundtrip(addr in 0x0000u16..=0xDFFF, value in any::<u8>()) {
        let mut bus = Bus::new();
        bus.write_byte(addr, value);
        prop_assert_eq!(bus.read_byte(addr), value);
    }

    /// Property: RAM writes never touch a neighboring byte
    #[test]
    fn prop_ram_write_is_isolated(addr in 0x0001u16..=0xDFFE, value in 1u8..=255) {
        let mut bus = Bus::new();
        bus.write_byte(addr, value);
        prop_assert_eq!(bus.read_byte(addr - 1), 0);
        prop_assert_eq!(bus.read_byte(addr + 1), 0);
    }

    /// Property: the unused range ignores writes and always reads 0
    #[test]
    fn prop_unused_reads_zero(addr in 0xE800u16..=0xFFFF, value in any::<u8>()) {
        let mut bus = Bus::new();
        bus.write_byte(addr, value);
        prop_assert_eq!(bus.read_byte(addr), 0);
        prop_assert_eq!(bus.display_generation(), 0);
    }

    /// Property: 16-bit accesses are little-endian across the whole RAM
    #[test]
    fn prop_word_little_endian(addr in 0x0000u16..=0xDFFE, value in any::<u16>()) {
        let mut bus = Bus::new();
        bus.write_word(addr, value);
        prop_assert_eq!(bus.read_byte(addr), value as u8);
        prop_assert_eq!(bus.read_byte(addr + 1), (value >> 8) as u8);
        prop_assert_eq!(bus.read_word(addr), value);
    }
}

// ========== Display Property Tests ==========

proptest! {
    /// Property: the projected cursor is the register value, clamped to the grid
    #[test]
    fn prop_cursor_clamps(x in any::<u8>(), y in any::<u8>()) {
        let mut bus = Bus::new();
        bus.write_byte(0xE7D7, x);
        bus.write_byte(0xE7D8, y);
        let frame = project(&bus);
        prop_assert_eq!(frame.cursor, Cursor { x: x.min(79), y: y.min(24) });
    }

    /// Property: a byte written to the screen buffer lands in the matching cell
    #[test]
    fn prop_screen_cell_mapping(index in 0u16..2000, ch in any::<u8>()) {
        let mut bus = Bus::new();
        bus.write_byte(0xE000 + index, ch);
        let frame = project(&bus);
        let (row, col) = ((index / 80) as usize, (index % 80) as usize);
        prop_assert_eq!(frame.cell(row, col).map(|c| c.ch), Some(ch));
    }
}

// ========== Register File Property Tests ==========

proptest! {
    /// Property: pair writes split into high and low registers
    #[test]
    fn prop_pair_endianness(value in any::<u16>()) {
        let mut cpu = Cpu::new();
        let hi = (value >> 8) as u8;
        let lo = value as u8;

        cpu.regs.set_pair(RegPair::BC, value);
        prop_assert_eq!(cpu.regs.pair(RegPair::BC), value);
        prop_assert_eq!(cpu.regs.get8(Reg8::B), hi);
        prop_assert_eq!(cpu.regs.get8(Reg8::C), lo);

        cpu.regs.set_pair(RegPair::HL, value);
        prop_assert_eq!(cpu.regs.get8(Reg8::H), hi);
        prop_assert_eq!(cpu.regs.get8(Reg8::L), lo);

        cpu.regs.set_pair(RegPair::IX, value);
        prop_assert_eq!(cpu.regs.get8(Reg8::IXH), hi);
        prop_assert_eq!(cpu.regs.get8(Reg8::IXL), lo);
    }

    /// Property: exchanging banks twice restores every register
    #[test]
    fn prop_exchange_is_involution(af in any::<u16>(), bc in any::<u16>(), de in any::<u16>(), hl in any::<u16>()) {
        let mut cpu = Cpu::new();
        cpu.regs.set_pair(RegPair::AF, af);
        cpu.regs.set_pair(RegPair::BC, bc);
        cpu.regs.set_pair(RegPair::DE, de);
        cpu.regs.set_pair(RegPair::HL, hl);
        let before = cpu.regs.clone();

        cpu.regs.exx();
        cpu.regs.ex_af();
        cpu.regs.exx();
        cpu.regs.ex_af();
        prop_assert_eq!(cpu.regs, before);
    }
}

// ========== Execution Property Tests ==========

proptest! {
    /// Property: NOP advances PC by 1, costs 4 T-states and only bumps R
    #[test]
    fn prop_nop_changes_nothing(
        af in any::<u16>(),
        bc in any::<u16>(),
        de in any::<u16>(),
        hl in any::<u16>(),
        r in any::<u8>(),
    ) {
        let mut cpu = Cpu::new();
        let mut bus = bus_with_program(&[0x00]);
        cpu.regs.set_pair(RegPair::AF, af);
        cpu.regs.set_pair(RegPair::BC, bc);
        cpu.regs.set_pair(RegPair::DE, de);
        cpu.regs.set_pair(RegPair::HL, hl);
        cpu.regs.r = r;

        let mut expected = cpu.regs.clone();
        expected.pc = 1;
        expected.r = (r & 0x80) | (r.wrapping_add(1) & 0x7F);

        prop_assert_eq!(cpu.step(&mut bus), 4);
        prop_assert_eq!(cpu.regs, expected);
    }

    /// Property: once halted, any number of steps leaves the registers alone
    #[test]
    fn prop_halt_is_stable(steps in 1usize..200, a in any::<u8>()) {
        let mut cpu = Cpu::new();
        let mut bus = bus_with_program(&[0x76]);
        cpu.regs.set_a(a);
        cpu.step(&mut bus);
        let before = cpu.regs.clone();

        for _ in 0..steps {
            prop_assert_eq!(cpu.step(&mut bus), 4);
        }
        prop_assert!(cpu.halted);
        prop_assert_eq!(cpu.regs, before);
    }

    /// Property: reset returns PC to 0 and clears HALT without touching memory
    #[test]
    fn prop_reset_restores_power_on(addr in 0x0100u16..=0xDFFF, value in any::<u8>()) {
        let mut machine = Machine::default();
        machine.load_image(&[0x76], 0).unwrap();
        machine.poke_byte(addr, value);
        machine.step();
        machine.reset();
        prop_assert_eq!(machine.cpu().regs.pc, 0);
        prop_assert!(!machine.is_halted());
        prop_assert_eq!(machine.peek_byte(addr), value);
    }

    /// Property: LD (nn),A stores A through the memory map
    #[test]
    fn prop_store_a_via_instruction(addr in 0x0010u16..=0xE7CF, value in any::<u8>()) {
        let mut cpu = Cpu::new();
        let mut bus = bus_with_program(&[0x32, addr as u8, (addr >> 8) as u8]);
        cpu.regs.set_a(value);
        prop_assert_eq!(cpu.step(&mut bus), 13);
        prop_assert_eq!(bus.read_byte(addr), value);
    }
}
