//! Z80 Disassembler
//!
//! Renders decoded instructions in Zilog syntax for instruction tracing and
//! debugging. Disassembly goes through the same decoder the CPU executes
//! with, so the text always matches what the core will do.

use std::fmt;

use crate::bus::Bus;
use crate::cpu::decode::{AluOp, BlockOp, Cond, IndexReg, Operand8, Prefix, RotOp};
use crate::cpu::{decode, InterruptMode, Op, Reg8, RegPair};

/// Result of disassembling an instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisasmResult {
    /// Raw opcode bytes as hex string (e.g., "DD 7E 05")
    pub bytes: String,
    /// Mnemonic with operands (e.g., "LD A,(IX+5)")
    pub mnemonic: String,
    /// Length of the instruction in bytes
    pub length: usize,
}

/// Disassemble the instruction at `pc`
///
/// Relative jumps are shown with their absolute target.
pub fn disassemble(bus: &Bus, pc: u16) -> DisasmResult {
    let inst = decode(bus, pc);
    let length = inst.length as usize;
    let next = pc.wrapping_add(inst.length as u16);

    let mnemonic = match inst.op {
        Op::Jr { cond, offset } => {
            let target = next.wrapping_add(offset as i16 as u16);
            match cond {
                Some(cc) => format!("JR {},0x{:04X}", cc, target),
                None => format!("JR 0x{:04X}", target),
            }
        }
        Op::Djnz(offset) => format!("DJNZ 0x{:04X}", next.wrapping_add(offset as i16 as u16)),
        op => op.to_string(),
    };

    let bytes = (0..inst.length as u16)
        .map(|i| format!("{:02X}", bus.read_byte(pc.wrapping_add(i))))
        .collect::<Vec<_>>()
        .join(" ");

    DisasmResult {
        bytes,
        mnemonic,
        length,
    }
}

// ========== Operand names ==========

impl fmt::Display for Reg8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reg8::A => "A",
            Reg8::B => "B",
            Reg8::C => "C",
            Reg8::D => "D",
            Reg8::E => "E",
            Reg8::H => "H",
            Reg8::L => "L",
            Reg8::IXH => "IXH",
            Reg8::IXL => "IXL",
            Reg8::IYH => "IYH",
            Reg8::IYL => "IYL",
        };
        f.write_str(name)
    }
}

impl fmt::Display for RegPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegPair::AF => "AF",
            RegPair::BC => "BC",
            RegPair::DE => "DE",
            RegPair::HL => "HL",
            RegPair::SP => "SP",
            RegPair::IX => "IX",
            RegPair::IY => "IY",
        };
        f.write_str(name)
    }
}

impl fmt::Display for IndexReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.pair(), f)
    }
}

impl fmt::Display for Operand8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Operand8::Reg(r) => write!(f, "{}", r),
            Operand8::Imm(n) => write!(f, "0x{:02X}", n),
            Operand8::Ind(rp) => write!(f, "({})", rp),
            Operand8::Indexed(ix, d) if d < 0 => write!(f, "({}-{})", ix, -(d as i16)),
            Operand8::Indexed(ix, d) => write!(f, "({}+{})", ix, d),
            Operand8::Abs(addr) => write!(f, "(0x{:04X})", addr),
        }
    }
}

impl fmt::Display for Cond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Cond::NZ => "NZ",
            Cond::Z => "Z",
            Cond::NC => "NC",
            Cond::C => "C",
            Cond::PO => "PO",
            Cond::PE => "PE",
            Cond::P => "P",
            Cond::M => "M",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = match self {
            Prefix::None => "",
            Prefix::CB => "CB",
            Prefix::ED => "ED",
            Prefix::DD => "DD",
            Prefix::FD => "FD",
            Prefix::DDCB => "DD CB",
            Prefix::FDCB => "FD CB",
        };
        f.write_str(bytes)
    }
}

fn alu_name(op: AluOp) -> &'static str {
    match op {
        AluOp::Add => "ADD A,",
        AluOp::Adc => "ADC A,",
        AluOp::Sub => "SUB ",
        AluOp::Sbc => "SBC A,",
        AluOp::And => "AND ",
        AluOp::Xor => "XOR ",
        AluOp::Or => "OR ",
        AluOp::Cp => "CP ",
    }
}

fn rot_name(op: RotOp) -> &'static str {
    match op {
        RotOp::Rlc => "RLC",
        RotOp::Rrc => "RRC",
        RotOp::Rl => "RL",
        RotOp::Rr => "RR",
        RotOp::Sla => "SLA",
        RotOp::Sra => "SRA",
        RotOp::Sll => "SLL",
        RotOp::Srl => "SRL",
    }
}

fn block_name(op: BlockOp, repeat: bool) -> &'static str {
    match (op, repeat) {
        (BlockOp::Ldi, false) => "LDI",
        (BlockOp::Ldi, true) => "LDIR",
        (BlockOp::Ldd, false) => "LDD",
        (BlockOp::Ldd, true) => "LDDR",
        (BlockOp::Cpi, false) => "CPI",
        (BlockOp::Cpi, true) => "CPIR",
        (BlockOp::Cpd, false) => "CPD",
        (BlockOp::Cpd, true) => "CPDR",
        (BlockOp::Ini, false) => "INI",
        (BlockOp::Ini, true) => "INIR",
        (BlockOp::Ind, false) => "IND",
        (BlockOp::Ind, true) => "INDR",
        (BlockOp::Outi, false) => "OUTI",
        (BlockOp::Outi, true) => "OTIR",
        (BlockOp::Outd, false) => "OUTD",
        (BlockOp::Outd, true) => "OTDR",
    }
}

/// Write `MNEMONIC target` with the undocumented `,r` register copy appended
fn write_with_copy(
    f: &mut fmt::Formatter<'_>,
    mnemonic: fmt::Arguments<'_>,
    copy: Option<Reg8>,
) -> fmt::Result {
    f.write_fmt(mnemonic)?;
    match copy {
        Some(r) => write!(f, ",{}", r),
        None => Ok(()),
    }
}

// ========== Instructions ==========

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Op::Nop => f.write_str("NOP"),
            Op::Halt => f.write_str("HALT"),

            Op::Ld8 { dst, src } => write!(f, "LD {},{}", dst, src),
            Op::LdAI => f.write_str("LD A,I"),
            Op::LdAR => f.write_str("LD A,R"),
            Op::LdIA => f.write_str("LD I,A"),
            Op::LdRA => f.write_str("LD R,A"),

            Op::Ld16 { dst, value } => write!(f, "LD {},0x{:04X}", dst, value),
            Op::Ld16Load { dst, addr } => write!(f, "LD {},(0x{:04X})", dst, addr),
            Op::Ld16Store { addr, src } => write!(f, "LD (0x{:04X}),{}", addr, src),
            Op::LdSp(src) => write!(f, "LD SP,{}", src),
            Op::Push(rp) => write!(f, "PUSH {}", rp),
            Op::Pop(rp) => write!(f, "POP {}", rp),

            Op::ExAf => f.write_str("EX AF,AF'"),
            Op::Exx => f.write_str("EXX"),
            Op::ExDeHl => f.write_str("EX DE,HL"),
            Op::ExSp(rp) => write!(f, "EX (SP),{}", rp),

            Op::Alu { op, src } => write!(f, "{}{}", alu_name(op), src),
            Op::Inc8(target) => write!(f, "INC {}", target),
            Op::Dec8(target) => write!(f, "DEC {}", target),
            Op::Daa => f.write_str("DAA"),
            Op::Cpl => f.write_str("CPL"),
            Op::Neg => f.write_str("NEG"),
            Op::Ccf => f.write_str("CCF"),
            Op::Scf => f.write_str("SCF"),

            Op::Add16 { dst, src } => write!(f, "ADD {},{}", dst, src),
            Op::Adc16(src) => write!(f, "ADC HL,{}", src),
            Op::Sbc16(src) => write!(f, "SBC HL,{}", src),
            Op::Inc16(rp) => write!(f, "INC {}", rp),
            Op::Dec16(rp) => write!(f, "DEC {}", rp),

            Op::Rlca => f.write_str("RLCA"),
            Op::Rrca => f.write_str("RRCA"),
            Op::Rla => f.write_str("RLA"),
            Op::Rra => f.write_str("RRA"),
            Op::Rld => f.write_str("RLD"),
            Op::Rrd => f.write_str("RRD"),
            Op::Rot { op, target, copy } => {
                write_with_copy(f, format_args!("{} {}", rot_name(op), target), copy)
            }
            Op::Bit { bit, src } => write!(f, "BIT {},{}", bit, src),
            Op::Res { bit, target, copy } => {
                write_with_copy(f, format_args!("RES {},{}", bit, target), copy)
            }
            Op::Set { bit, target, copy } => {
                write_with_copy(f, format_args!("SET {},{}", bit, target), copy)
            }

            Op::Jp { cond: Some(cc), addr } => write!(f, "JP {},0x{:04X}", cc, addr),
            Op::Jp { cond: None, addr } => write!(f, "JP 0x{:04X}", addr),
            Op::JpInd(rp) => write!(f, "JP ({})", rp),
            Op::Jr { cond: Some(cc), offset } => write!(f, "JR {},{}", cc, offset),
            Op::Jr { cond: None, offset } => write!(f, "JR {}", offset),
            Op::Djnz(offset) => write!(f, "DJNZ {}", offset),
            Op::Call { cond: Some(cc), addr } => write!(f, "CALL {},0x{:04X}", cc, addr),
            Op::Call { cond: None, addr } => write!(f, "CALL 0x{:04X}", addr),
            Op::Ret(Some(cc)) => write!(f, "RET {}", cc),
            Op::Ret(None) => f.write_str("RET"),
            Op::Reti => f.write_str("RETI"),
            Op::Retn => f.write_str("RETN"),
            Op::Rst(target) => write!(f, "RST 0x{:02X}", target),

            Op::Di => f.write_str("DI"),
            Op::Ei => f.write_str("EI"),
            Op::Im(mode) => {
                let n = match mode {
                    InterruptMode::Mode0 => 0,
                    InterruptMode::Mode1 => 1,
                    InterruptMode::Mode2 => 2,
                };
                write!(f, "IM {}", n)
            }

            Op::Block { op, repeat } => f.write_str(block_name(op, repeat)),

            Op::InAN(port) => write!(f, "IN A,(0x{:02X})", port),
            Op::OutNA(port) => write!(f, "OUT (0x{:02X}),A", port),
            Op::InC(Some(r)) => write!(f, "IN {},(C)", r),
            Op::InC(None) => f.write_str("IN (C)"),
            Op::OutC(Some(r)) => write!(f, "OUT (C),{}", r),
            Op::OutC(None) => f.write_str("OUT (C),0"),

            Op::Illegal { prefix, opcode } => write!(f, "??? {} {:02X}", prefix, opcode),
        }
    }
}
