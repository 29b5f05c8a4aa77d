//! Memory subsystem for the Z80 text-mode computer
//!
//! The Z80 sees a flat 16-bit address space:
//! - 0x0000 - 0xDFFF: RAM (56KB)
//! - 0xE000 - 0xE7CF: Screen text buffer (80x25 character codes)
//! - 0xE7D1 - 0xE7D3: Background color (R, G, B)
//! - 0xE7D4 - 0xE7D6: Foreground color (R, G, B)
//! - 0xE7D7 - 0xE7D8: Cursor X, cursor Y
//! - everything else: unused (reads 0, writes ignored)
//!
//! The display bytes are plain storage. Nothing here interprets them; the
//! display projector reads them back when a frame is requested.

/// Memory region address constants
pub mod addr {
    /// RAM start address
    pub const RAM_START: u16 = 0x0000;
    /// RAM end address (exclusive)
    pub const RAM_END: u16 = 0xE000;
    /// RAM size (56KB)
    pub const RAM_SIZE: usize = 0xE000;

    /// Screen text buffer start address
    pub const SCREEN_START: u16 = 0xE000;
    /// Screen text buffer end address (exclusive)
    pub const SCREEN_END: u16 = 0xE7D0;
    /// Number of character cells in the screen buffer
    pub const SCREEN_SIZE: usize = 2000;

    /// Background color, red component (green and blue follow)
    pub const BACKGROUND_RGB: u16 = 0xE7D1;
    /// Foreground color, red component (green and blue follow)
    pub const FOREGROUND_RGB: u16 = 0xE7D4;
    /// Cursor column
    pub const CURSOR_X: u16 = 0xE7D7;
    /// Cursor row
    pub const CURSOR_Y: u16 = 0xE7D8;

    /// First byte after the display registers. Unused from here to 0xFFFF.
    pub const DISPLAY_END: u16 = 0xE7D9;
}

/// Screen geometry
pub const SCREEN_COLUMNS: usize = 80;
pub const SCREEN_ROWS: usize = 25;

/// Register offsets within the display register block, relative to 0xE7D1
pub mod display_regs {
    pub const BACKGROUND_R: usize = 0;
    pub const BACKGROUND_G: usize = 1;
    pub const BACKGROUND_B: usize = 2;
    pub const FOREGROUND_R: usize = 3;
    pub const FOREGROUND_G: usize = 4;
    pub const FOREGROUND_B: usize = 5;
    pub const CURSOR_X: usize = 6;
    pub const CURSOR_Y: usize = 7;
    /// Number of register bytes
    pub const COUNT: usize = 8;
}

/// General purpose RAM
///
/// Covers 0x0000-0xDFFF. Offsets are taken relative to RAM start.
pub struct Ram {
    /// RAM contents
    data: Vec<u8>,
}

impl Ram {
    /// Create a new zero-filled RAM instance
    pub fn new() -> Self {
        Self {
            data: vec![0x00; addr::RAM_SIZE],
        }
    }

    /// Read a byte from RAM
    ///
    /// # Arguments
    /// * `offset` - Offset relative to RAM start (0 to RAM_SIZE-1)
    #[inline]
    pub fn read(&self, offset: u16) -> u8 {
        self.data[offset as usize % addr::RAM_SIZE]
    }

    /// Write a byte to RAM
    #[inline]
    pub fn write(&mut self, offset: u16, value: u8) {
        self.data[offset as usize % addr::RAM_SIZE] = value;
    }

    /// Raw RAM contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Clear RAM to zero
    pub fn reset(&mut self) {
        self.data.fill(0x00);
    }
}

impl Default for Ram {
    fn default() -> Self {
        Self::new()
    }
}

/// Backing store for the screen buffer and the display registers
///
/// Writes are stored as-is: a cursor byte of 200 stays 200 here, clamping is
/// a presentation concern.
pub struct DisplayMemory {
    /// One character code per cell, row-major
    text: Vec<u8>,
    /// Background RGB, foreground RGB, cursor X, cursor Y
    regs: [u8; display_regs::COUNT],
}

impl DisplayMemory {
    pub fn new() -> Self {
        Self {
            text: vec![0x00; addr::SCREEN_SIZE],
            regs: [0; display_regs::COUNT],
        }
    }

    /// Read a character cell by index (0..2000)
    #[inline]
    pub fn read_cell(&self, index: usize) -> u8 {
        self.text[index % addr::SCREEN_SIZE]
    }

    /// Write a character cell by index (0..2000)
    #[inline]
    pub fn write_cell(&mut self, index: usize, value: u8) {
        self.text[index % addr::SCREEN_SIZE] = value;
    }

    /// Read a display register by offset from 0xE7D1
    #[inline]
    pub fn read_reg(&self, offset: usize) -> u8 {
        self.regs[offset % display_regs::COUNT]
    }

    /// Write a display register by offset from 0xE7D1
    #[inline]
    pub fn write_reg(&mut self, offset: usize, value: u8) {
        self.regs[offset % display_regs::COUNT] = value;
    }

    /// All character cells, row-major
    pub fn text(&self) -> &[u8] {
        &self.text
    }

    pub fn regs(&self) -> &[u8; display_regs::COUNT] {
        &self.regs
    }

    /// Clear text and registers to zero
    pub fn reset(&mut self) {
        self.text.fill(0x00);
        self.regs = [0; display_regs::COUNT];
    }
}

impl Default for DisplayMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod ram_tests {
        use super::*;

        #[test]
        fn test_new_ram_is_zeroed() {
            let ram = Ram::new();
            assert_eq!(ram.read(0), 0x00);
            assert_eq!(ram.read(0x1234), 0x00);
            assert_eq!(ram.read(0xDFFF), 0x00);
            assert_eq!(ram.data().len(), addr::RAM_SIZE);
        }

        #[test]
        fn test_read_write() {
            let mut ram = Ram::new();
            ram.write(0x0000, 0x12);
            ram.write(0xDFFF, 0x34);
            assert_eq!(ram.read(0x0000), 0x12);
            assert_eq!(ram.read(0xDFFF), 0x34);
        }

        #[test]
        fn test_reset_clears() {
            let mut ram = Ram::new();
            ram.write(0x100, 0xAB);
            ram.reset();
            assert_eq!(ram.read(0x100), 0x00);
        }
    }

    mod display_memory_tests {
        use super::*;

        #[test]
        fn test_cells_and_regs_are_independent() {
            let mut mem = DisplayMemory::new();
            mem.write_cell(0, b'A');
            mem.write_cell(1999, b'Z');
            mem.write_reg(display_regs::CURSOR_X, 42);

            assert_eq!(mem.read_cell(0), b'A');
            assert_eq!(mem.read_cell(1999), b'Z');
            assert_eq!(mem.read_reg(display_regs::CURSOR_X), 42);
            assert_eq!(mem.read_reg(display_regs::CURSOR_Y), 0);
        }

        #[test]
        fn test_regs_store_raw_values() {
            let mut mem = DisplayMemory::new();
            mem.write_reg(display_regs::CURSOR_Y, 0xFF);
            assert_eq!(mem.regs()[display_regs::CURSOR_Y], 0xFF);
        }

        #[test]
        fn test_geometry_matches_buffer() {
            assert_eq!(SCREEN_COLUMNS * SCREEN_ROWS, addr::SCREEN_SIZE);
            assert_eq!(
                (addr::SCREEN_END - addr::SCREEN_START) as usize,
                addr::SCREEN_SIZE
            );
        }
    }
}
