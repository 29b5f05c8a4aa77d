//! Integration tests for the memory-mapped text display
//!
//! These tests run small hand-assembled programs on a full machine and
//! check what a renderer would see through the projected frame.

#[cfg(test)]
mod tests {
    use crate::display::{Cursor, Rgb};
    use crate::machine::{Machine, StopReason};
    use crate::memory::addr;

    /// Load `program` at 0x0000 and run until it halts
    fn run_program(program: &[u8]) -> Machine {
        let mut machine = Machine::default();
        machine.load_image(program, 0).unwrap();
        machine.run_cycles(100_000);
        assert_eq!(
            machine.stop_reason(),
            StopReason::Halted,
            "program did not halt:\n{}",
            machine.dump_history()
        );
        machine
    }

    #[test]
    fn test_store_character_at_origin() {
        // LD A,'A' ; LD (0xE000),A ; HALT
        let machine = run_program(&[0x3E, 0x41, 0x32, 0x00, 0xE0, 0x76]);
        let frame = machine.project();
        assert_eq!(frame.cell(0, 0).map(|c| c.ch), Some(b'A'));
        assert!(frame.row_text(0).starts_with('A'));
        assert_eq!(machine.total_cycles(), 7 + 13 + 4);
    }

    #[test]
    fn test_colors_and_cursor_through_index_register() {
        let program = [
            0xDD, 0x21, 0xD0, 0xE7, // LD IX,0xE7D0
            0xDD, 0x36, 0x01, 0x10, // LD (IX+1),0x10  background R
            0xDD, 0x36, 0x02, 0x20, // LD (IX+2),0x20  background G
            0xDD, 0x36, 0x03, 0x30, // LD (IX+3),0x30  background B
            0xDD, 0x36, 0x04, 0xF0, // LD (IX+4),0xF0  foreground R
            0xDD, 0x36, 0x05, 0xE0, // LD (IX+5),0xE0  foreground G
            0xDD, 0x36, 0x06, 0xD0, // LD (IX+6),0xD0  foreground B
            0xDD, 0x36, 0x07, 0x55, // LD (IX+7),85    cursor X
            0xDD, 0x36, 0x08, 0x1E, // LD (IX+8),30    cursor Y
            0x76, // HALT
        ];
        let machine = run_program(&program);
        let frame = machine.project();
        assert_eq!(frame.background, Rgb::new(0x10, 0x20, 0x30));
        assert_eq!(frame.foreground, Rgb::new(0xF0, 0xE0, 0xD0));
        assert_eq!(frame.cursor, Cursor { x: 79, y: 24 });
        // Raw register values survive in memory
        assert_eq!(machine.peek_byte(addr::CURSOR_X), 85);
        assert_eq!(machine.peek_byte(addr::CURSOR_Y), 30);
    }

    #[test]
    fn test_cursor_in_range_is_exact() {
        // LD A,40 ; LD (0xE7D7),A ; LD A,12 ; LD (0xE7D8),A ; HALT
        let machine = run_program(&[
            0x3E, 0x28, 0x32, 0xD7, 0xE7, 0x3E, 0x0C, 0x32, 0xD8, 0xE7, 0x76,
        ]);
        assert_eq!(machine.project().cursor, Cursor { x: 40, y: 12 });
    }

    #[test]
    fn test_hello_world_block_copy() {
        let mut program = vec![
            0x21, 0x0C, 0x00, // LD HL,msg
            0x11, 0xA0, 0xE0, // LD DE,0xE0A0 (row 2)
            0x01, 0x0B, 0x00, // LD BC,11
            0xED, 0xB0, // LDIR
            0x76, // HALT
        ];
        program.extend_from_slice(b"HELLO WORLD");
        let machine = run_program(&program);
        let frame = machine.project();
        assert!(frame.row_text(2).starts_with("HELLO WORLD "));
        assert_eq!(frame.row_text(1).trim(), "");
        assert_eq!(machine.total_cycles(), 30 + 10 * 21 + 16 + 4);
    }

    #[test]
    fn test_fill_row_with_djnz() {
        let machine = run_program(&[
            0x21, 0x00, 0xE0, // LD HL,0xE000
            0x06, 0x50, // LD B,80
            0x3E, 0x2A, // LD A,'*'
            0x77, // loop: LD (HL),A
            0x23, // INC HL
            0x10, 0xFC, // DJNZ loop
            0x76, // HALT
        ]);
        let frame = machine.project();
        assert_eq!(frame.row_text(0), "*".repeat(80));
        assert_eq!(frame.row_text(1), " ".repeat(80));
    }

    #[test]
    fn test_print_subroutine_moves_cursor() {
        let mut program = vec![
            0x21, 0x16, 0x00, // LD HL,msg
            0x11, 0x00, 0xE0, // LD DE,0xE000
            0xCD, 0x0E, 0x00, // CALL print
            0x7B, // LD A,E
            0x32, 0xD7, 0xE7, // LD (0xE7D7),A
            0x76, // HALT
            // print:
            0x7E, // LD A,(HL)
            0xB7, // OR A
            0xC8, // RET Z
            0x12, // LD (DE),A
            0x23, // INC HL
            0x13, // INC DE
            0x18, 0xF8, // JR print
        ];
        program.extend_from_slice(b"Hi Z80\0");
        let machine = run_program(&program);
        let frame = machine.project();
        assert!(frame.row_text(0).starts_with("Hi Z80 "));
        assert_eq!(frame.cursor, Cursor { x: 6, y: 0 });
        assert_eq!(machine.cpu().regs.sp, 0xE000);
    }

    #[test]
    fn test_unused_region_reads_zero_from_code() {
        let machine = run_program(&[
            0x3E, 0x55, // LD A,0x55
            0x32, 0x00, 0xF0, // LD (0xF000),A
            0x3A, 0x00, 0xF0, // LD A,(0xF000)
            0xC6, 0x30, // ADD A,'0'
            0x32, 0x00, 0xE0, // LD (0xE000),A
            0x76, // HALT
        ]);
        assert_eq!(machine.project().cell(0, 0).map(|c| c.ch), Some(b'0'));
        assert_eq!(machine.bus().unused_writes(), 1);
    }

    #[test]
    fn test_interrupt_handler_updates_screen() {
        let mut machine = Machine::default();
        machine
            .load_image(
                &[
                    0xED, 0x56, // IM 1
                    0xFB, // loop: EI
                    0x76, // HALT
                    0x18, 0xFC, // JR loop
                ],
                0,
            )
            .unwrap();
        // 0x38: LD HL,0xE000 ; INC (HL) ; RET
        for (i, b) in [0x21, 0x00, 0xE0, 0x34, 0xC9].iter().enumerate() {
            machine.poke_byte(0x0038 + i as u16, *b);
        }

        machine.run_cycles(1000);
        assert_eq!(machine.stop_reason(), StopReason::Halted);

        for _ in 0..3 {
            assert!(machine.request_interrupt(0xFF));
            machine.run_cycles(1000);
            assert_eq!(machine.stop_reason(), StopReason::Halted);
        }
        assert_eq!(machine.project().cell(0, 0).map(|c| c.ch), Some(3));
    }

    #[test]
    fn test_mode2_vector_writes_last_cell() {
        let mut machine = Machine::default();
        machine
            .load_image(
                &[
                    0x3E, 0x80, // LD A,0x80
                    0xED, 0x47, // LD I,A
                    0xED, 0x5E, // IM 2
                    0xFB, // EI
                    0x76, // HALT
                ],
                0,
            )
            .unwrap();
        // Vector table entry 0x8040 -> 0x0100
        machine.poke_byte(0x8040, 0x00);
        machine.poke_byte(0x8041, 0x01);
        // 0x0100: LD A,'!' ; LD (0xE7CF),A ; HALT
        for (i, b) in [0x3E, 0x21, 0x32, 0xCF, 0xE7, 0x76].iter().enumerate() {
            machine.poke_byte(0x0100 + i as u16, *b);
        }

        machine.run_cycles(1000);
        machine.request_interrupt(0x40);
        machine.run_cycles(1000);

        let frame = machine.project();
        assert_eq!(frame.cell(24, 79).map(|c| c.ch), Some(b'!'));
        assert_eq!(machine.cpu().regs.pc, 0x0106);
    }

    #[test]
    fn test_generation_tracks_display_writes() {
        let mut machine = Machine::default();
        // LD A,1 ; LD (0x1000),A ; HALT
        machine
            .load_image(&[0x3E, 0x01, 0x32, 0x00, 0x10, 0x76], 0)
            .unwrap();
        let before = machine.project().generation;
        machine.run_cycles(1000);
        // RAM-only writes leave the frame generation alone
        assert_eq!(machine.project().generation, before);

        machine.poke_byte(addr::SCREEN_START, b'x');
        assert!(machine.project().generation > before);
    }
}
