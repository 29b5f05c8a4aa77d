//! System bus for the Z80 text-mode computer
//!
//! The bus provides address decoding and routes memory accesses to RAM, the
//! screen buffer, the display registers, or the unused region.
//!
//! Memory Map (16-bit address space):
//! ```text
//! 0x0000 - 0xDFFF : RAM (56KB)
//! 0xE000 - 0xE7CF : Screen text buffer (80x25)
//! 0xE7D0          : Unused
//! 0xE7D1 - 0xE7D3 : Background color R, G, B
//! 0xE7D4 - 0xE7D6 : Foreground color R, G, B
//! 0xE7D7          : Cursor X
//! 0xE7D8          : Cursor Y
//! 0xE7D9 - 0xFFFF : Unused
//! ```
//!
//! The region an address maps to is a pure function of the address. Reads and
//! writes never fail: unused reads return 0 and unused writes are dropped.

use crate::error::{LoadError, LoadResult};
use crate::memory::{addr, DisplayMemory, Ram};

/// Memory region that an address maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryRegion {
    /// General RAM (0x0000 - 0xDFFF)
    Ram,
    /// Screen character cell, with its index 0..2000
    Screen(u16),
    /// Background color component (0 = R, 1 = G, 2 = B)
    Background(u8),
    /// Foreground color component (0 = R, 1 = G, 2 = B)
    Foreground(u8),
    /// Cursor X position register
    CursorX,
    /// Cursor Y position register
    CursorY,
    /// Unused: reads return 0, writes have no effect
    Unused,
}

impl MemoryRegion {
    /// Whether a write to this region changes what the display shows
    pub fn is_display(&self) -> bool {
        !matches!(self, MemoryRegion::Ram | MemoryRegion::Unused)
    }
}

/// Value returned by IN when no device answers the port
pub const FLOATING_BUS: u8 = 0xFF;

/// System bus connecting the CPU to memory and the display registers
pub struct Bus {
    /// General purpose RAM
    pub ram: Ram,
    /// Screen text buffer and display registers
    pub display: DisplayMemory,
    /// Bumped on every write that lands in the display region
    display_generation: u64,
    /// Number of writes dropped because they targeted the unused region
    unused_writes: u64,
}

impl Bus {
    /// Create a new bus with zeroed memory
    pub fn new() -> Self {
        Self {
            ram: Ram::new(),
            display: DisplayMemory::new(),
            display_generation: 0,
            unused_writes: 0,
        }
    }

    /// Determine which memory region an address maps to
    pub fn decode_address(addr: u16) -> MemoryRegion {
        match addr {
            a if a < addr::RAM_END => MemoryRegion::Ram,
            a if a < addr::SCREEN_END => MemoryRegion::Screen(a - addr::SCREEN_START),
            a if (addr::BACKGROUND_RGB..addr::BACKGROUND_RGB + 3).contains(&a) => {
                MemoryRegion::Background((a - addr::BACKGROUND_RGB) as u8)
            }
            a if (addr::FOREGROUND_RGB..addr::FOREGROUND_RGB + 3).contains(&a) => {
                MemoryRegion::Foreground((a - addr::FOREGROUND_RGB) as u8)
            }
            addr::CURSOR_X => MemoryRegion::CursorX,
            addr::CURSOR_Y => MemoryRegion::CursorY,
            // 0xE7D0, 0xE7D9 - 0xFFFF
            _ => MemoryRegion::Unused,
        }
    }

    /// Offset of a display register region within the register block
    fn display_reg_offset(region: MemoryRegion) -> Option<usize> {
        use crate::memory::display_regs;
        match region {
            MemoryRegion::Background(c) => Some(display_regs::BACKGROUND_R + c as usize),
            MemoryRegion::Foreground(c) => Some(display_regs::FOREGROUND_R + c as usize),
            MemoryRegion::CursorX => Some(display_regs::CURSOR_X),
            MemoryRegion::CursorY => Some(display_regs::CURSOR_Y),
            _ => None,
        }
    }

    /// Read a byte from the bus
    ///
    /// Reads have no side effects, so decoding and disassembly can look at
    /// memory through a shared reference.
    #[inline]
    pub fn read_byte(&self, addr: u16) -> u8 {
        let region = Self::decode_address(addr);
        match region {
            MemoryRegion::Ram => self.ram.read(addr - addr::RAM_START),
            MemoryRegion::Screen(index) => self.display.read_cell(index as usize),
            MemoryRegion::Unused => 0x00,
            _ => match Self::display_reg_offset(region) {
                Some(offset) => self.display.read_reg(offset),
                None => 0x00,
            },
        }
    }

    /// Write a byte to the bus
    ///
    /// Display bytes are stored exactly like RAM; the only extra effect is the
    /// generation bump that tells render loops something changed.
    #[inline]
    pub fn write_byte(&mut self, addr: u16, value: u8) {
        let region = Self::decode_address(addr);
        match region {
            MemoryRegion::Ram => self.ram.write(addr - addr::RAM_START, value),
            MemoryRegion::Screen(index) => self.display.write_cell(index as usize, value),
            MemoryRegion::Unused => {
                self.unused_writes = self.unused_writes.wrapping_add(1);
            }
            _ => {
                if let Some(offset) = Self::display_reg_offset(region) {
                    self.display.write_reg(offset, value);
                }
            }
        }
        if region.is_display() {
            self.display_generation = self.display_generation.wrapping_add(1);
        }
    }

    /// Read a 16-bit word (little-endian), wrapping at 0xFFFF
    pub fn read_word(&self, addr: u16) -> u16 {
        let lo = self.read_byte(addr) as u16;
        let hi = self.read_byte(addr.wrapping_add(1)) as u16;
        lo | (hi << 8)
    }

    /// Write a 16-bit word (little-endian), wrapping at 0xFFFF
    pub fn write_word(&mut self, addr: u16, value: u16) {
        self.write_byte(addr, value as u8);
        self.write_byte(addr.wrapping_add(1), (value >> 8) as u8);
    }

    /// Copy a binary image into RAM starting at `origin`
    ///
    /// Every byte goes through `write_byte`. The image must fit entirely in
    /// 0x0000-0xDFFF; nothing is written if it does not.
    pub fn load_image(&mut self, data: &[u8], origin: u16) -> LoadResult<()> {
        if data.is_empty() {
            return Err(LoadError::Empty);
        }
        if origin as usize + data.len() > addr::RAM_SIZE {
            return Err(LoadError::TooLarge {
                origin,
                len: data.len(),
            });
        }
        for (i, &byte) in data.iter().enumerate() {
            self.write_byte(origin + i as u16, byte);
        }
        Ok(())
    }

    /// Read an I/O port (IN instructions)
    ///
    /// No devices sit on the port bus, every port reads as a floating bus.
    pub fn port_read(&mut self, port: u16) -> u8 {
        tracing::trace!("IO_READ port={:04X}", port);
        FLOATING_BUS
    }

    /// Write an I/O port (OUT instructions). The value is discarded.
    pub fn port_write(&mut self, port: u16, value: u8) {
        tracing::trace!("IO_WRITE port={:04X} value={:02X}", port, value);
    }

    /// Counter bumped on every write to the screen buffer or display registers
    pub fn display_generation(&self) -> u64 {
        self.display_generation
    }

    /// Number of writes that targeted the unused region
    pub fn unused_writes(&self) -> u64 {
        self.unused_writes
    }

    /// Clear all memory, the screen and the display registers
    pub fn reset(&mut self) {
        self.ram.reset();
        self.display.reset();
        self.display_generation = self.display_generation.wrapping_add(1);
        self.unused_writes = 0;
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_address_regions() {
        assert_eq!(Bus::decode_address(0x0000), MemoryRegion::Ram);
        assert_eq!(Bus::decode_address(0xDFFF), MemoryRegion::Ram);
        assert_eq!(Bus::decode_address(0xE000), MemoryRegion::Screen(0));
        assert_eq!(Bus::decode_address(0xE7CF), MemoryRegion::Screen(1999));
        assert_eq!(Bus::decode_address(0xE7D0), MemoryRegion::Unused);
        assert_eq!(Bus::decode_address(0xE7D1), MemoryRegion::Background(0));
        assert_eq!(Bus::decode_address(0xE7D3), MemoryRegion::Background(2));
        assert_eq!(Bus::decode_address(0xE7D4), MemoryRegion::Foreground(0));
        assert_eq!(Bus::decode_address(0xE7D6), MemoryRegion::Foreground(2));
        assert_eq!(Bus::decode_address(0xE7D7), MemoryRegion::CursorX);
        assert_eq!(Bus::decode_address(0xE7D8), MemoryRegion::CursorY);
        assert_eq!(Bus::decode_address(0xE7D9), MemoryRegion::Unused);
        assert_eq!(Bus::decode_address(0xE7FF), MemoryRegion::Unused);
        assert_eq!(Bus::decode_address(0xE800), MemoryRegion::Unused);
        assert_eq!(Bus::decode_address(0xFFFF), MemoryRegion::Unused);
    }

    #[test]
    fn test_ram_read_write() {
        let mut bus = Bus::new();
        bus.write_byte(0x1234, 0xAB);
        assert_eq!(bus.read_byte(0x1234), 0xAB);
        assert_eq!(bus.ram.read(0x1234), 0xAB);
    }

    #[test]
    fn test_unused_writes_are_dropped() {
        let mut bus = Bus::new();
        bus.write_byte(0xE800, 0x55);
        bus.write_byte(0xFFFF, 0x55);
        bus.write_byte(0xE7D0, 0x55);
        assert_eq!(bus.read_byte(0xE800), 0x00);
        assert_eq!(bus.read_byte(0xFFFF), 0x00);
        assert_eq!(bus.read_byte(0xE7D0), 0x00);
        assert_eq!(bus.unused_writes(), 3);
    }

    #[test]
    fn test_screen_write_is_stored_verbatim() {
        let mut bus = Bus::new();
        bus.write_byte(0xE000, b'A');
        bus.write_byte(0xE000 + 80, b'B');
        assert_eq!(bus.read_byte(0xE000), b'A');
        assert_eq!(bus.display.read_cell(80), b'B');
    }

    #[test]
    fn test_display_registers() {
        let mut bus = Bus::new();
        bus.write_byte(0xE7D1, 10);
        bus.write_byte(0xE7D2, 20);
        bus.write_byte(0xE7D3, 30);
        bus.write_byte(0xE7D4, 40);
        bus.write_byte(0xE7D5, 50);
        bus.write_byte(0xE7D6, 60);
        bus.write_byte(0xE7D7, 200);
        bus.write_byte(0xE7D8, 99);

        assert_eq!(bus.display.regs(), &[10, 20, 30, 40, 50, 60, 200, 99]);
        // Out of range cursor values are stored as-is
        assert_eq!(bus.read_byte(0xE7D7), 200);
    }

    #[test]
    fn test_display_generation_tracks_display_writes_only() {
        let mut bus = Bus::new();
        let start = bus.display_generation();

        bus.write_byte(0x0100, 1);
        bus.write_byte(0xF000, 1);
        assert_eq!(bus.display_generation(), start);

        bus.write_byte(0xE010, b'x');
        assert_eq!(bus.display_generation(), start + 1);

        bus.write_byte(0xE7D8, 3);
        assert_eq!(bus.display_generation(), start + 2);
    }

    #[test]
    fn test_word_access_little_endian() {
        let mut bus = Bus::new();
        bus.write_word(0x2000, 0x1234);
        assert_eq!(bus.read_byte(0x2000), 0x34);
        assert_eq!(bus.read_byte(0x2001), 0x12);
        assert_eq!(bus.read_word(0x2000), 0x1234);
    }

    #[test]
    fn test_word_read_wraps_address() {
        let mut bus = Bus::new();
        bus.write_byte(0x0000, 0x12);
        // 0xFFFF is unused and reads 0
        assert_eq!(bus.read_word(0xFFFF), 0x1200);
    }

    #[test]
    fn test_load_image() {
        let mut bus = Bus::new();
        bus.load_image(&[0x3E, 0x41, 0x76], 0x0100).unwrap();
        assert_eq!(bus.read_byte(0x0100), 0x3E);
        assert_eq!(bus.read_byte(0x0101), 0x41);
        assert_eq!(bus.read_byte(0x0102), 0x76);
    }

    #[test]
    fn test_load_image_fills_ram_exactly() {
        let mut bus = Bus::new();
        let image = vec![0xAA; addr::RAM_SIZE];
        assert!(bus.load_image(&image, 0).is_ok());
        assert_eq!(bus.read_byte(0xDFFF), 0xAA);
        assert_eq!(bus.read_byte(0xE000), 0x00);
    }

    #[test]
    fn test_load_image_rejects_overflow() {
        let mut bus = Bus::new();
        let result = bus.load_image(&[1, 2, 3], 0xDFFE);
        assert_eq!(result, Err(LoadError::TooLarge { origin: 0xDFFE, len: 3 }));
        // Nothing was written
        assert_eq!(bus.read_byte(0xDFFE), 0x00);
    }

    #[test]
    fn test_load_image_rejects_empty() {
        let mut bus = Bus::new();
        assert_eq!(bus.load_image(&[], 0), Err(LoadError::Empty));
    }

    #[test]
    fn test_ports_float() {
        let mut bus = Bus::new();
        bus.port_write(0x10, 0x55);
        assert_eq!(bus.port_read(0x10), FLOATING_BUS);
    }

    #[test]
    fn test_reset_clears_memory() {
        let mut bus = Bus::new();
        bus.write_byte(0x10, 1);
        bus.write_byte(0xE000, b'A');
        bus.write_byte(0xE7D7, 5);
        bus.reset();
        assert_eq!(bus.read_byte(0x10), 0);
        assert_eq!(bus.read_byte(0xE000), 0);
        assert_eq!(bus.read_byte(0xE7D7), 0);
    }
}
