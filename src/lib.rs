//! Z80 Text-Mode Computer Emulator Core
//!
//! This crate provides a platform-agnostic emulator core with a stable C ABI.
//! No OS APIs are used - all I/O is done through byte buffers.
//!
//! # Architecture
//!
//! The emulator is organized into several modules:
//! - `memory`: RAM and display storage
//! - `bus`: Address decoding and memory access routing
//! - `cpu`: Z80 CPU implementation (decoder, execution, interrupts)
//! - `display`: Text-mode frame projection
//! - `machine`: Main emulator orchestrator
//!
//! # Memory Map (16-bit Z80 address space)
//!
//! | Address Range   | Region                          |
//! |-----------------|---------------------------------|
//! | 0x0000 - 0xDFFF | RAM (56KB)                      |
//! | 0xE000 - 0xE7CF | Screen text buffer (80x25)      |
//! | 0xE7D0          | Unused                          |
//! | 0xE7D1 - 0xE7D3 | Background color R, G, B        |
//! | 0xE7D4 - 0xE7D6 | Foreground color R, G, B        |
//! | 0xE7D7 - 0xE7D8 | Cursor X, cursor Y              |
//! | 0xE7D9 - 0xFFFF | Unused (reads 0, writes ignored) |

pub mod memory;
pub mod bus;
pub mod cpu;
pub mod display;
pub mod disasm;
pub mod image;
pub mod config;
pub mod error;
mod machine;

#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::*;

#[cfg(test)]
mod display_integration_test;

use std::ffi::CStr;
use std::os::raw::c_char;
use std::slice;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub use config::MachineConfig;
pub use disasm::{disassemble, DisasmResult};
pub use display::{project, Cell, Cursor, DisplayFrame, Rgb};
pub use error::{ConfigError, LoadError};
pub use machine::{Machine, StopReason};

/// Status code for a null pointer argument
const ERR_NULL: i32 = -1;

/// Thread-safe wrapper for the machine.
/// All FFI calls go through this mutex so a render thread reading the
/// display never races the thread running cycles.
/// This is an opaque type from C's perspective (used via void*).
pub struct SyncMachine {
    inner: Mutex<Machine>,
}

impl SyncMachine {
    fn new(machine: Machine) -> Self {
        Self {
            inner: Mutex::new(machine),
        }
    }

    /// Lock the machine; a panic on another thread does not make it unusable
    fn lock(&self) -> MutexGuard<'_, Machine> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Borrow the wrapper behind a raw handle
fn handle<'a>(machine: *const SyncMachine) -> Option<&'a SyncMachine> {
    if machine.is_null() {
        None
    } else {
        Some(unsafe { &*machine })
    }
}

/// Create a new machine with the default configuration.
/// The returned pointer is thread-safe - all operations are synchronized.
#[no_mangle]
pub extern "C" fn z80_create() -> *mut SyncMachine {
    Box::into_raw(Box::new(SyncMachine::new(Machine::default())))
}

/// Create a machine from a JSON configuration (null-terminated UTF-8).
/// Returns null if the configuration does not parse or validate.
#[no_mangle]
pub extern "C" fn z80_create_with_config(json: *const c_char) -> *mut SyncMachine {
    if json.is_null() {
        return std::ptr::null_mut();
    }
    let text = unsafe { CStr::from_ptr(json) };
    let config = match text.to_str() {
        Ok(s) => MachineConfig::from_json(s),
        Err(_) => return std::ptr::null_mut(),
    };
    match config.and_then(Machine::new) {
        Ok(machine) => Box::into_raw(Box::new(SyncMachine::new(machine))),
        Err(err) => {
            tracing::warn!("CONFIG_REJECTED {}", err);
            std::ptr::null_mut()
        }
    }
}

/// Destroy a machine.
/// Safe to call with null pointer.
#[no_mangle]
pub extern "C" fn z80_destroy(machine: *mut SyncMachine) {
    if !machine.is_null() {
        unsafe {
            drop(Box::from_raw(machine));
        }
    }
}

/// Load a raw image into RAM at `origin` and point PC at it.
/// Returns 0 on success, negative error code on failure.
#[no_mangle]
pub extern "C" fn z80_load_image(
    machine: *mut SyncMachine,
    data: *const u8,
    len: usize,
    origin: u16,
) -> i32 {
    let Some(sync) = handle(machine) else {
        return ERR_NULL;
    };
    if data.is_null() {
        return ERR_NULL;
    }
    let image = unsafe { slice::from_raw_parts(data, len) };
    match sync.lock().load_image(image, origin) {
        Ok(()) => 0,
        Err(err) => err.code(),
    }
}

/// Load an image carrying its own 2-byte little-endian load address.
/// Returns the origin (0..=0xFFFF) on success, negative error code on failure.
#[no_mangle]
pub extern "C" fn z80_load_prefixed_image(
    machine: *mut SyncMachine,
    data: *const u8,
    len: usize,
) -> i32 {
    let Some(sync) = handle(machine) else {
        return ERR_NULL;
    };
    if data.is_null() {
        return ERR_NULL;
    }
    let image = unsafe { slice::from_raw_parts(data, len) };
    match sync.lock().load_prefixed_image(image) {
        Ok(origin) => origin as i32,
        Err(err) => err.code(),
    }
}

/// Reset the CPU to power-on state. Memory is kept.
#[no_mangle]
pub extern "C" fn z80_reset(machine: *mut SyncMachine) {
    if let Some(sync) = handle(machine) {
        sync.lock().reset();
    }
}

/// Execute one instruction. Returns the T-states used.
#[no_mangle]
pub extern "C" fn z80_step(machine: *mut SyncMachine) -> i32 {
    match handle(machine) {
        Some(sync) => sync.lock().step() as i32,
        None => 0,
    }
}

/// Run for at least the specified number of T-states.
/// Returns the number of T-states actually executed, which is lower than
/// requested only when the CPU halted with nothing to wake it.
#[no_mangle]
pub extern "C" fn z80_run_cycles(machine: *mut SyncMachine, cycles: i32) -> i32 {
    if cycles <= 0 {
        return 0;
    }
    match handle(machine) {
        Some(sync) => sync.lock().run_cycles(cycles as u64).min(i32::MAX as u64) as i32,
        None => 0,
    }
}

/// Queue a maskable interrupt with the given data-bus byte.
/// Returns 1 if queued, 0 if the queue was full, -1 on null pointer.
#[no_mangle]
pub extern "C" fn z80_request_interrupt(machine: *mut SyncMachine, vector: u8) -> i32 {
    match handle(machine) {
        Some(sync) => sync.lock().request_interrupt(vector) as i32,
        None => ERR_NULL,
    }
}

/// Raise a non-maskable interrupt.
#[no_mangle]
pub extern "C" fn z80_request_nmi(machine: *mut SyncMachine) {
    if let Some(sync) = handle(machine) {
        sync.lock().request_nmi();
    }
}

/// Read a byte through the memory map.
/// Returns 0 if machine pointer is null.
#[no_mangle]
pub extern "C" fn z80_read_byte(machine: *const SyncMachine, addr: u16) -> u8 {
    match handle(machine) {
        Some(sync) => sync.lock().peek_byte(addr),
        None => 0,
    }
}

/// Write a byte through the memory map.
#[no_mangle]
pub extern "C" fn z80_write_byte(machine: *mut SyncMachine, addr: u16, value: u8) {
    if let Some(sync) = handle(machine) {
        sync.lock().poke_byte(addr, value);
    }
}

/// Copy the screen character codes (row-major, 80x25) into `out`.
/// Returns the number of bytes copied, or -1 on null pointer.
#[no_mangle]
pub extern "C" fn z80_screen_chars(machine: *const SyncMachine, out: *mut u8, cap: usize) -> i32 {
    let Some(sync) = handle(machine) else {
        return ERR_NULL;
    };
    if out.is_null() {
        return ERR_NULL;
    }
    let frame = sync.lock().project();
    let buffer = unsafe { slice::from_raw_parts_mut(out, cap) };
    let count = cap.min(frame.cells().len());
    for (dst, cell) in buffer.iter_mut().zip(frame.cells()).take(count) {
        *dst = cell.ch;
    }
    count as i32
}

/// Write the clamped cursor position to `x` and `y` (either may be null).
/// Returns 0 on success, -1 if machine pointer is null.
#[no_mangle]
pub extern "C" fn z80_cursor(machine: *const SyncMachine, x: *mut i32, y: *mut i32) -> i32 {
    let Some(sync) = handle(machine) else {
        return ERR_NULL;
    };
    let cursor = sync.lock().project().cursor;
    if !x.is_null() {
        unsafe { *x = cursor.x as i32 };
    }
    if !y.is_null() {
        unsafe { *y = cursor.y as i32 };
    }
    0
}

/// Write foreground and background colors as ARGB8888 (either may be null).
/// Returns 0 on success, -1 if machine pointer is null.
#[no_mangle]
pub extern "C" fn z80_colors(machine: *const SyncMachine, fg: *mut u32, bg: *mut u32) -> i32 {
    let Some(sync) = handle(machine) else {
        return ERR_NULL;
    };
    let frame = sync.lock().project();
    if !fg.is_null() {
        unsafe { *fg = frame.foreground.to_argb() };
    }
    if !bg.is_null() {
        unsafe { *bg = frame.background.to_argb() };
    }
    0
}

/// Returns 1 if the CPU is halted, 0 otherwise (or on null pointer).
#[no_mangle]
pub extern "C" fn z80_is_halted(machine: *const SyncMachine) -> i32 {
    match handle(machine) {
        Some(sync) => sync.lock().is_halted() as i32,
        None => 0,
    }
}
