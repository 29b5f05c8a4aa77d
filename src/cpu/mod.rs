//! Z80 CPU implementation
//!
//! The execution engine: each `step()` decodes the instruction at PC, advances
//! PC past it, executes it against the register file and the bus, and returns
//! the T-states it cost.
//!
//! # Module Organization
//!
//! - `flags`: Flag bit constants for the F register
//! - `registers`: Register file with main and alternate banks
//! - `decode`: Opcode bytes to [`Instruction`]
//! - `helpers`: Operand access, stack, ALU and flag computation
//! - `execute`: Per-operation handlers
//!
//! # Interrupts
//!
//! Interrupt sources live outside the CPU. They call `request_interrupt()` or
//! `request_nmi()` at any time; requests are queued and only serviced at the
//! start of a `step()`, never in the middle of an instruction.
//!
//! # References
//! - Z80 CPU User Manual (Zilog UM0080)
//! - The Undocumented Z80 Documented (Sean Young)

use std::collections::VecDeque;

use crate::bus::Bus;

// Module declarations
pub mod decode;
mod execute;
pub mod flags;
mod helpers;
pub mod registers;

#[cfg(test)]
mod tests;

pub use decode::{decode, Instruction, Op};
pub use registers::{InterruptMode, Reg8, RegPair, RegisterFile};

/// Default power-on stack pointer: top of RAM, first push lands at 0xDFFF
pub const DEFAULT_STACK_POINTER: u16 = 0xE000;

/// Default depth of the maskable interrupt request queue
pub const DEFAULT_MAX_PENDING: usize = 16;

/// Address the CPU jumps to when accepting an NMI
pub const NMI_VECTOR: u16 = 0x0066;

/// T-states consumed by one step while halted
pub const HALT_CYCLES: u32 = 4;

/// Z80 CPU state
pub struct Cpu {
    /// Register file
    pub regs: RegisterFile,
    /// CPU is halted (executing internal NOPs until an interrupt)
    pub halted: bool,
    /// Set by EI: maskable interrupts are not accepted at the next boundary
    ei_delay: bool,
    /// Pending NMI
    nmi_pending: bool,
    /// Queued maskable interrupt vectors, oldest first
    pending: VecDeque<u8>,
    /// Maximum number of queued maskable requests
    max_pending: usize,
    /// Stack pointer applied on reset
    reset_sp: u16,
    /// Number of illegal opcodes executed since reset
    illegal_opcodes: u64,
}

impl Cpu {
    /// Create a new CPU in reset state
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_STACK_POINTER, DEFAULT_MAX_PENDING)
    }

    /// Create a CPU with a custom power-on stack pointer and interrupt queue depth
    pub fn with_settings(reset_sp: u16, max_pending: usize) -> Self {
        Self {
            regs: RegisterFile::new(reset_sp),
            halted: false,
            ei_delay: false,
            nmi_pending: false,
            pending: VecDeque::with_capacity(max_pending),
            max_pending,
            reset_sp,
            illegal_opcodes: 0,
        }
    }

    /// Reset the CPU to power-on state
    ///
    /// PC=0, SP=the configured reset value, AF=AF'=0xFFFF, other registers 0,
    /// interrupts disabled in mode 0. Pending requests are dropped. Memory is
    /// not touched.
    pub fn reset(&mut self) {
        self.regs.reset(self.reset_sp);
        self.halted = false;
        self.ei_delay = false;
        self.nmi_pending = false;
        self.pending.clear();
        self.illegal_opcodes = 0;
    }

    // ========== Interrupt Requests ==========

    /// Queue a maskable interrupt with the byte the device places on the bus
    ///
    /// Returns false if the queue is full and the request was dropped.
    pub fn request_interrupt(&mut self, vector: u8) -> bool {
        if self.pending.len() >= self.max_pending {
            tracing::warn!(
                "IRQ_DROPPED vector={:02X} pending={}",
                vector,
                self.pending.len()
            );
            return false;
        }
        self.pending.push_back(vector);
        true
    }

    /// Latch a non-maskable interrupt
    pub fn request_nmi(&mut self) {
        self.nmi_pending = true;
    }

    /// Number of maskable requests waiting for acceptance
    pub fn pending_interrupts(&self) -> usize {
        self.pending.len()
    }

    pub fn nmi_pending(&self) -> bool {
        self.nmi_pending
    }

    /// Whether the next `step` accepts an interrupt instead of fetching
    pub fn interrupt_ready(&self) -> bool {
        self.nmi_pending || (self.regs.iff1 && !self.ei_delay && !self.pending.is_empty())
    }

    /// Illegal opcodes executed since reset
    pub fn illegal_opcodes(&self) -> u64 {
        self.illegal_opcodes
    }

    // ========== Instruction Execution ==========

    /// Execute one instruction (or accept one interrupt), returns T-states used
    pub fn step(&mut self, bus: &mut Bus) -> u32 {
        // EI blocks acceptance for exactly one boundary
        let ei_blocked = std::mem::take(&mut self.ei_delay);

        if self.nmi_pending {
            self.nmi_pending = false;
            return self.handle_nmi(bus);
        }

        if self.regs.iff1 && !ei_blocked {
            if let Some(vector) = self.pending.pop_front() {
                return self.handle_irq(bus, vector);
            }
        }

        if self.halted {
            return HALT_CYCLES;
        }

        let inst = decode::decode(bus, self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(inst.length as u16);
        for _ in 0..inst.opcode_fetches() {
            self.regs.bump_r();
        }

        if let Op::Illegal { prefix, opcode } = inst.op {
            self.illegal_opcodes += 1;
            tracing::warn!(
                "ILLEGAL_OPCODE prefix={:?} opcode={:02X} pc={:04X}",
                prefix,
                opcode,
                self.regs.pc.wrapping_sub(inst.length as u16)
            );
        }

        let taken = self.execute(bus, inst.op);
        inst.cost(taken)
    }

    /// Accept a non-maskable interrupt: push PC, jump to 0x0066
    fn handle_nmi(&mut self, bus: &mut Bus) -> u32 {
        self.leave_halt();
        self.regs.bump_r();
        self.regs.iff2 = self.regs.iff1;
        self.regs.iff1 = false;
        let pc = self.regs.pc;
        self.push_word(bus, pc);
        self.regs.pc = NMI_VECTOR;
        tracing::debug!("NMI_ACCEPTED return={:04X}", pc);
        11
    }

    /// Accept a maskable interrupt in the current interrupt mode
    fn handle_irq(&mut self, bus: &mut Bus, vector: u8) -> u32 {
        self.leave_halt();
        self.regs.bump_r();
        self.regs.iff1 = false;
        self.regs.iff2 = false;
        let pc = self.regs.pc;
        self.push_word(bus, pc);

        let (target, cycles) = match self.regs.im {
            InterruptMode::Mode0 => {
                // The vector byte is the opcode on the data bus; only RST is supported
                let target = if vector & 0xC7 == 0xC7 {
                    (vector & 0x38) as u16
                } else {
                    0x0038
                };
                (target, 13)
            }
            InterruptMode::Mode1 => (0x0038, 13),
            InterruptMode::Mode2 => {
                let table = ((self.regs.i as u16) << 8) | vector as u16;
                (bus.read_word(table), 19)
            }
        };
        self.regs.pc = target;
        tracing::debug!(
            "IRQ_ACCEPTED mode={:?} vector={:02X} target={:04X}",
            self.regs.im,
            vector,
            target
        );
        cycles
    }

    fn leave_halt(&mut self) {
        if self.halted {
            self.halted = false;
            tracing::debug!("HALT_EXIT pc={:04X}", self.regs.pc);
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
