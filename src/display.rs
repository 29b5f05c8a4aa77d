//! Text-mode display projection
//!
//! Reads the screen buffer and display registers out of the bus and builds a
//! [`DisplayFrame`]: an 80x25 grid of characters with their colors plus the
//! cursor position. Projection never writes to the bus, so render loops can
//! call it at their own cadence, independent of CPU steps.
//!
//! Cursor registers are stored raw in memory. The frame clamps them to the
//! last valid column (79) and row (24).

use std::fmt;

use crate::bus::Bus;
use crate::memory::{display_regs, SCREEN_COLUMNS, SCREEN_ROWS};

/// 24-bit color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Pack as 0xFFRRGGBB (ARGB8888, opaque)
    pub fn to_argb(self) -> u32 {
        0xFF00_0000 | ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }
}

/// Cursor position, always within the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    /// Column, 0..=79
    pub x: u8,
    /// Row, 0..=24
    pub y: u8,
}

impl Cursor {
    /// Clamp raw register values to the nearest valid cell
    pub fn clamped(x: u8, y: u8) -> Self {
        Self {
            x: x.min(SCREEN_COLUMNS as u8 - 1),
            y: y.min(SCREEN_ROWS as u8 - 1),
        }
    }
}

/// One character cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cell {
    /// Character code as stored in the screen buffer
    pub ch: u8,
    pub fg: Rgb,
    pub bg: Rgb,
}

/// Read-only snapshot of the display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayFrame {
    /// Row-major cells, SCREEN_COLUMNS * SCREEN_ROWS of them
    cells: Vec<Cell>,
    pub foreground: Rgb,
    pub background: Rgb,
    pub cursor: Cursor,
    /// Bus display generation the frame was captured at
    pub generation: u64,
}

/// Build a frame from the current bus contents
pub fn project(bus: &Bus) -> DisplayFrame {
    let regs = bus.display.regs();
    let background = Rgb::new(
        regs[display_regs::BACKGROUND_R],
        regs[display_regs::BACKGROUND_G],
        regs[display_regs::BACKGROUND_B],
    );
    let foreground = Rgb::new(
        regs[display_regs::FOREGROUND_R],
        regs[display_regs::FOREGROUND_G],
        regs[display_regs::FOREGROUND_B],
    );
    let cursor = Cursor::clamped(regs[display_regs::CURSOR_X], regs[display_regs::CURSOR_Y]);

    let cells = bus
        .display
        .text()
        .iter()
        .map(|&ch| Cell {
            ch,
            fg: foreground,
            bg: background,
        })
        .collect();

    DisplayFrame {
        cells,
        foreground,
        background,
        cursor,
        generation: bus.display_generation(),
    }
}

impl DisplayFrame {
    /// Cell at (row, col), `None` outside the grid
    pub fn cell(&self, row: usize, col: usize) -> Option<Cell> {
        if row >= SCREEN_ROWS || col >= SCREEN_COLUMNS {
            return None;
        }
        self.cells.get(row * SCREEN_COLUMNS + col).copied()
    }

    /// All cells, row-major
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Character codes of one row, `None` outside the grid
    pub fn row(&self, row: usize) -> Option<&[Cell]> {
        if row >= SCREEN_ROWS {
            return None;
        }
        let start = row * SCREEN_COLUMNS;
        self.cells.get(start..start + SCREEN_COLUMNS)
    }

    /// Printable text of one row; control and non-ASCII bytes show as spaces
    pub fn row_text(&self, row: usize) -> String {
        self.row(row)
            .map(|cells| cells.iter().map(|c| printable(c.ch)).collect())
            .unwrap_or_default()
    }
}

fn printable(ch: u8) -> char {
    if (0x20..0x7F).contains(&ch) {
        ch as char
    } else {
        ' '
    }
}

impl fmt::Display for DisplayFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..SCREEN_ROWS {
            if row > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", self.row_text(row))?;
        }
        Ok(())
    }
}
