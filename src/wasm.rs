//! WebAssembly bindings for the Z80 text-mode machine
//!
//! This module provides JavaScript-friendly APIs using wasm-bindgen.

use wasm_bindgen::prelude::*;

use crate::config::MachineConfig;
use crate::machine::Machine;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    fn warn(s: &str);
    #[wasm_bindgen(js_namespace = console)]
    fn log(s: &str);
}

/// WASM-friendly wrapper around the machine.
/// Unlike the C FFI, this owns the machine directly without mutex
/// since WASM is single-threaded.
#[wasm_bindgen]
pub struct WasmMachine {
    inner: Machine,
}

#[wasm_bindgen]
impl WasmMachine {
    /// Create a new machine with the default configuration.
    #[wasm_bindgen(constructor)]
    pub fn new() -> WasmMachine {
        // Set up console panic hook for better error messages
        console_error_panic_hook::set_once();

        WasmMachine {
            inner: Machine::default(),
        }
    }

    /// Create a machine from a JSON configuration.
    /// Throws with the validation message if the configuration is rejected.
    #[wasm_bindgen]
    pub fn with_config(json: &str) -> Result<WasmMachine, JsValue> {
        console_error_panic_hook::set_once();

        MachineConfig::from_json(json)
            .and_then(Machine::new)
            .map(|inner| WasmMachine { inner })
            .map_err(|err| JsValue::from_str(&err.to_string()))
    }

    /// Load a raw image at `origin` and point PC at it.
    /// Returns 0 on success, negative error code on failure.
    #[wasm_bindgen]
    pub fn load_image(&mut self, data: &[u8], origin: u16) -> i32 {
        log(&format!("[WASM] load_image: {} bytes at {:04X}", data.len(), origin));
        match self.inner.load_image(data, origin) {
            Ok(()) => 0,
            Err(err) => {
                warn(&format!("[WASM] load_image: {}", err));
                err.code()
            }
        }
    }

    /// Load an image that carries its own 2-byte load address.
    /// Returns the origin on success, negative error code on failure.
    #[wasm_bindgen]
    pub fn load_prefixed_image(&mut self, data: &[u8]) -> i32 {
        log(&format!("[WASM] load_prefixed_image: {} bytes", data.len()));
        match self.inner.load_prefixed_image(data) {
            Ok(origin) => origin as i32,
            Err(err) => {
                warn(&format!("[WASM] load_prefixed_image: {}", err));
                err.code()
            }
        }
    }

    /// Reset the CPU. Memory is kept.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.inner.reset();
    }

    /// Run for at least the specified number of T-states.
    /// Returns the number of T-states actually executed.
    #[wasm_bindgen]
    pub fn run_cycles(&mut self, cycles: i32) -> i32 {
        if cycles <= 0 {
            return 0;
        }
        self.inner.run_cycles(cycles as u64).min(i32::MAX as u64) as i32
    }

    /// Run for the given number of milliseconds of emulated time.
    #[wasm_bindgen]
    pub fn run_millis(&mut self, millis: u32) -> f64 {
        self.inner
            .run_for(std::time::Duration::from_millis(millis as u64)) as f64
    }

    /// Queue a maskable interrupt. Returns false if the queue was full.
    #[wasm_bindgen]
    pub fn request_interrupt(&mut self, vector: u8) -> bool {
        self.inner.request_interrupt(vector)
    }

    #[wasm_bindgen]
    pub fn request_nmi(&mut self) {
        self.inner.request_nmi();
    }

    #[wasm_bindgen]
    pub fn is_halted(&self) -> bool {
        self.inner.is_halted()
    }

    #[wasm_bindgen]
    pub fn read_byte(&self, addr: u16) -> u8 {
        self.inner.peek_byte(addr)
    }

    #[wasm_bindgen]
    pub fn write_byte(&mut self, addr: u16, value: u8) {
        self.inner.poke_byte(addr, value);
    }

    /// Screen character codes, row-major 80x25.
    #[wasm_bindgen]
    pub fn screen_chars(&self) -> Vec<u8> {
        self.inner.project().cells().iter().map(|c| c.ch).collect()
    }

    /// Screen contents as text, one line per row.
    #[wasm_bindgen]
    pub fn screen_text(&self) -> String {
        self.inner.project().to_string()
    }

    /// Display generation; changes whenever display memory is written.
    #[wasm_bindgen]
    pub fn display_generation(&self) -> f64 {
        self.inner.bus().display_generation() as f64
    }

    /// Clamped cursor position as [x, y].
    #[wasm_bindgen]
    pub fn cursor(&self) -> Vec<u8> {
        let cursor = self.inner.project().cursor;
        vec![cursor.x, cursor.y]
    }

    /// Foreground then background color as [r, g, b, r, g, b].
    #[wasm_bindgen]
    pub fn colors(&self) -> Vec<u8> {
        let frame = self.inner.project();
        let (fg, bg) = (frame.foreground, frame.background);
        vec![fg.r, fg.g, fg.b, bg.r, bg.g, bg.b]
    }

    /// Get diagnostic info for debugging freezes.
    #[wasm_bindgen]
    pub fn debug_status(&self) -> String {
        format!(
            "{} cycles={} stop={:?} pending={} nmi={}",
            self.inner.dump_registers(),
            self.inner.total_cycles(),
            self.inner.stop_reason(),
            self.inner.cpu().pending_interrupts(),
            self.inner.cpu().nmi_pending(),
        )
    }

    /// Recently executed instructions with disassembly.
    #[wasm_bindgen]
    pub fn dump_history(&self) -> String {
        self.inner.dump_history()
    }
}

impl Default for WasmMachine {
    fn default() -> Self {
        Self::new()
    }
}
