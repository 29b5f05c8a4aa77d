//! Machine orchestrator
//!
//! Owns the CPU, the bus and the configuration, and drives execution in
//! cycle budgets. Hosts feed interrupts in between runs and take display
//! frames with [`Machine::project`] whenever they want to render.

use std::time::Duration;

use crate::bus::Bus;
use crate::config::MachineConfig;
use crate::cpu::{decode, flags, Cpu, RegPair};
use crate::disasm::disassemble;
use crate::display::{self, DisplayFrame};
use crate::error::{ConfigError, LoadResult};
use crate::image::PrefixedImage;

/// Longest instruction encoding, in bytes
const MAX_INSTRUCTION_LEN: usize = 4;

/// Single entry in the execution history
#[derive(Clone, Copy, Default)]
struct HistoryEntry {
    /// Program counter before the instruction
    pc: u16,
    /// Instruction bytes, prefixes included
    opcode: [u8; MAX_INSTRUCTION_LEN],
    /// Number of valid opcode bytes
    opcode_len: u8,
}

impl HistoryEntry {
    fn bytes(&self) -> &[u8] {
        &self.opcode[..self.opcode_len as usize]
    }
}

/// Ring buffer of recently executed instructions
struct ExecutionHistory {
    entries: Vec<HistoryEntry>,
    /// Next position to write
    write_idx: usize,
    /// Number of entries written, at most the capacity
    count: usize,
}

impl ExecutionHistory {
    fn new(depth: usize) -> Self {
        Self {
            entries: vec![HistoryEntry::default(); depth],
            write_idx: 0,
            count: 0,
        }
    }

    fn record(&mut self, pc: u16, opcode: &[u8]) {
        let depth = self.entries.len();
        if depth == 0 {
            return;
        }
        let len = opcode.len().min(MAX_INSTRUCTION_LEN);
        let mut entry = HistoryEntry {
            pc,
            opcode: [0; MAX_INSTRUCTION_LEN],
            opcode_len: len as u8,
        };
        entry.opcode[..len].copy_from_slice(&opcode[..len]);
        self.entries[self.write_idx] = entry;
        self.write_idx = (self.write_idx + 1) % depth;
        if self.count < depth {
            self.count += 1;
        }
    }

    /// Entries oldest to newest
    fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        let depth = self.entries.len();
        let start = if self.count < depth { 0 } else { self.write_idx };
        (0..self.count).map(move |i| &self.entries[(start + i) % depth])
    }

    fn clear(&mut self) {
        self.write_idx = 0;
        self.count = 0;
    }
}

/// Reason the last run returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The cycle budget was used up
    BudgetComplete,
    /// The CPU is halted with nothing pending that could wake it
    Halted,
}

/// A complete machine: CPU, memory map and display
pub struct Machine {
    cpu: Cpu,
    bus: Bus,
    config: MachineConfig,
    /// Recently executed instructions for diagnostics
    history: ExecutionHistory,
    last_stop: StopReason,
    /// T-states executed since the last reset
    total_cycles: u64,
}

impl Machine {
    /// Create a machine after validating `config`
    pub fn new(config: MachineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        tracing::info!(
            "CONFIG_APPLIED clock_hz={} sp={:04X} queue={} history={} trace={}",
            config.clock_hz,
            config.stack_pointer,
            config.max_pending_interrupts,
            config.history_depth,
            config.trace_instructions
        );
        Ok(Self::build(config))
    }

    fn build(config: MachineConfig) -> Self {
        Self {
            cpu: Cpu::with_settings(config.stack_pointer, config.max_pending_interrupts),
            bus: Bus::new(),
            history: ExecutionHistory::new(config.history_depth),
            last_stop: StopReason::BudgetComplete,
            total_cycles: 0,
            config,
        }
    }

    /// Copy a raw image into RAM at `origin` and start executing there
    ///
    /// The CPU is reset first. Memory outside the image is left as it was.
    pub fn load_image(&mut self, data: &[u8], origin: u16) -> LoadResult<()> {
        self.bus.load_image(data, origin)?;
        tracing::info!("IMAGE_LOADED origin={:04X} bytes={}", origin, data.len());
        self.reset();
        self.cpu.regs.pc = origin;
        Ok(())
    }

    /// Load an image that starts with its own 2-byte load address
    ///
    /// Returns the origin the payload was placed at.
    pub fn load_prefixed_image(&mut self, data: &[u8]) -> LoadResult<u16> {
        let image = PrefixedImage::parse(data)?;
        self.load_image(&image.payload, image.origin)?;
        Ok(image.origin)
    }

    /// Reset the CPU to power-on state; memory is kept
    pub fn reset(&mut self) {
        tracing::info!("RESET");
        self.cpu.reset();
        self.history.clear();
        self.last_stop = StopReason::BudgetComplete;
        self.total_cycles = 0;
    }

    /// Execute one instruction (or accept one interrupt), returns T-states used
    pub fn step(&mut self) -> u32 {
        let pc = self.cpu.regs.pc;
        if !self.cpu.halted && !self.cpu.interrupt_ready() {
            self.record(pc);
        }
        let cycles = self.cpu.step(&mut self.bus);
        self.total_cycles += cycles as u64;
        cycles
    }

    fn record(&mut self, pc: u16) {
        let tracing_on = self.config.trace_instructions;
        if self.config.history_depth == 0 && !tracing_on {
            return;
        }
        let len = (decode(&self.bus, pc).length as usize).min(MAX_INSTRUCTION_LEN);
        let mut bytes = [0u8; MAX_INSTRUCTION_LEN];
        for (i, byte) in bytes.iter_mut().take(len).enumerate() {
            *byte = self.bus.read_byte(pc.wrapping_add(i as u16));
        }
        self.history.record(pc, &bytes[..len]);

        if tracing_on {
            let dis = disassemble(&self.bus, pc);
            let regs = &self.cpu.regs;
            tracing::trace!(
                "{:04X}  {:<12} {:<20} AF={:04X} BC={:04X} DE={:04X} HL={:04X} IX={:04X} IY={:04X} SP={:04X}",
                pc,
                dis.bytes,
                dis.mnemonic,
                regs.pair(RegPair::AF),
                regs.pair(RegPair::BC),
                regs.pair(RegPair::DE),
                regs.pair(RegPair::HL),
                regs.ix,
                regs.iy,
                regs.sp
            );
        }
    }

    /// Run whole instructions until at least `budget` T-states have elapsed
    ///
    /// Stops early with [`StopReason::Halted`] when the CPU sits in HALT and
    /// no request is pending that could wake it. Returns the T-states
    /// actually executed, which can overshoot the budget by part of one
    /// instruction.
    pub fn run_cycles(&mut self, budget: u64) -> u64 {
        let start = self.total_cycles;
        while self.total_cycles - start < budget {
            if self.cpu.halted && !self.wake_pending() {
                self.last_stop = StopReason::Halted;
                return self.total_cycles - start;
            }
            self.step();
        }
        self.last_stop = StopReason::BudgetComplete;
        self.total_cycles - start
    }

    /// Run for the given stretch of emulated time at the configured clock
    pub fn run_for(&mut self, duration: Duration) -> u64 {
        let budget = duration.as_nanos() * self.config.clock_hz as u128 / 1_000_000_000;
        self.run_cycles(budget.min(u64::MAX as u128) as u64)
    }

    /// Whether the next step would accept an interrupt and leave HALT
    fn wake_pending(&self) -> bool {
        self.cpu.nmi_pending() || (self.cpu.regs.iff1 && self.cpu.pending_interrupts() > 0)
    }

    /// Queue a maskable interrupt; false if the queue was full
    pub fn request_interrupt(&mut self, vector: u8) -> bool {
        self.cpu.request_interrupt(vector)
    }

    pub fn request_nmi(&mut self) {
        self.cpu.request_nmi();
    }

    /// Snapshot of the text display
    pub fn project(&self) -> DisplayFrame {
        display::project(&self.bus)
    }

    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    pub fn stop_reason(&self) -> StopReason {
        self.last_stop
    }

    pub fn is_halted(&self) -> bool {
        self.cpu.halted
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    /// Read a byte through the memory map
    pub fn peek_byte(&self, addr: u16) -> u8 {
        self.bus.read_byte(addr)
    }

    /// Write a byte through the memory map, display side effects included
    pub fn poke_byte(&mut self, addr: u16, value: u8) {
        self.bus.write_byte(addr, value);
    }

    /// Recently executed instructions as (pc, bytes), oldest first
    pub fn history(&self) -> Vec<(u16, Vec<u8>)> {
        self.history
            .iter()
            .map(|e| (e.pc, e.bytes().to_vec()))
            .collect()
    }

    /// Execution history with disassembly, for debugging
    pub fn dump_history(&self) -> String {
        let mut output = String::new();
        output.push_str("Execution history (oldest to newest):\n");

        for entry in self.history.iter() {
            let opcode_str = entry
                .bytes()
                .iter()
                .map(|b| format!("{:02X}", b))
                .collect::<Vec<_>>()
                .join(" ");
            output.push_str(&format!(
                "  PC={:04X}  {:12}  {}\n",
                entry.pc,
                opcode_str,
                disassemble(&self.bus, entry.pc).mnemonic
            ));
        }

        output.push_str(&format!("\nCurrent PC: {:04X}\n", self.cpu.regs.pc));
        output.push_str(&format!("Total cycles: {}\n", self.total_cycles));
        output.push_str(&format!("Stop reason: {:?}\n", self.last_stop));
        output
    }

    /// One-line register summary
    pub fn dump_registers(&self) -> String {
        let regs = &self.cpu.regs;
        let f = regs.f();
        let bit = |mask: u8| (f & mask != 0) as u8;
        format!(
            "AF={:04X} BC={:04X} DE={:04X} HL={:04X} IX={:04X} IY={:04X} SP={:04X} PC={:04X} \
             S={} Z={} H={} PV={} N={} C={} I={:02X} R={:02X} IFF1={} IFF2={} IM={:?} HALT={}",
            regs.pair(RegPair::AF),
            regs.pair(RegPair::BC),
            regs.pair(RegPair::DE),
            regs.pair(RegPair::HL),
            regs.ix,
            regs.iy,
            regs.sp,
            regs.pc,
            bit(flags::S),
            bit(flags::Z),
            bit(flags::H),
            bit(flags::PV),
            bit(flags::N),
            bit(flags::C),
            regs.i,
            regs.r,
            regs.iff1 as u8,
            regs.iff2 as u8,
            regs.im,
            self.cpu.halted as u8,
        )
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::build(MachineConfig::default())
    }
}
