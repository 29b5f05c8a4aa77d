//! Z80 instruction decoder
//!
//! Turns the byte stream at an address into an [`Instruction`]: what to do,
//! how many bytes it occupies and how many T-states it costs. Decoding only
//! reads memory through `Bus::read_byte`, so it never mutates anything and the
//! same bytes always decode to the same instruction.
//!
//! Opcodes are split into fields the way the Z80 encodes them:
//! ```text
//!   7 6 5 4 3 2 1 0
//!  | x |   y   |  z  |
//!      | p | q |
//! ```
//!
//! # References
//! - Z80 CPU User Manual (Zilog UM0080)
//! - "Decoding Z80 Opcodes" (Cristian Dinu)

use super::registers::{InterruptMode, Reg8, RegPair};
use crate::bus::Bus;

/// Index register selected by a DD or FD prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexReg {
    IX,
    IY,
}

impl IndexReg {
    pub fn pair(self) -> RegPair {
        match self {
            IndexReg::IX => RegPair::IX,
            IndexReg::IY => RegPair::IY,
        }
    }

    fn high(self) -> Reg8 {
        match self {
            IndexReg::IX => Reg8::IXH,
            IndexReg::IY => Reg8::IYH,
        }
    }

    fn low(self) -> Reg8 {
        match self {
            IndexReg::IX => Reg8::IXL,
            IndexReg::IY => Reg8::IYL,
        }
    }
}

/// Prefix bytes an instruction was encoded with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    None,
    CB,
    ED,
    DD,
    FD,
    DDCB,
    FDCB,
}

/// An 8-bit operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand8 {
    /// Register
    Reg(Reg8),
    /// Immediate byte
    Imm(u8),
    /// Memory addressed by a register pair: (BC), (DE), (HL)
    Ind(RegPair),
    /// Memory addressed by an index register plus displacement: (IX+d)
    Indexed(IndexReg, i8),
    /// Memory at an absolute address: (nn)
    Abs(u16),
}

impl Operand8 {
    /// Whether the operand lives in memory
    pub fn is_memory(&self) -> bool {
        matches!(
            self,
            Operand8::Ind(_) | Operand8::Indexed(..) | Operand8::Abs(_)
        )
    }
}

/// Branch conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    NZ,
    Z,
    NC,
    C,
    PO,
    PE,
    P,
    M,
}

impl Cond {
    fn from_code(code: u8) -> Cond {
        match code & 7 {
            0 => Cond::NZ,
            1 => Cond::Z,
            2 => Cond::NC,
            3 => Cond::C,
            4 => Cond::PO,
            5 => Cond::PE,
            6 => Cond::P,
            _ => Cond::M,
        }
    }
}

/// 8-bit arithmetic and logic operations on A
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

impl AluOp {
    fn from_code(code: u8) -> AluOp {
        match code & 7 {
            0 => AluOp::Add,
            1 => AluOp::Adc,
            2 => AluOp::Sub,
            3 => AluOp::Sbc,
            4 => AluOp::And,
            5 => AluOp::Xor,
            6 => AluOp::Or,
            _ => AluOp::Cp,
        }
    }
}

/// CB-prefixed rotate and shift operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotOp {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    /// Undocumented: shift left, bit 0 set
    Sll,
    Srl,
}

impl RotOp {
    fn from_code(code: u8) -> RotOp {
        match code & 7 {
            0 => RotOp::Rlc,
            1 => RotOp::Rrc,
            2 => RotOp::Rl,
            3 => RotOp::Rr,
            4 => RotOp::Sla,
            5 => RotOp::Sra,
            6 => RotOp::Sll,
            _ => RotOp::Srl,
        }
    }
}

/// Block transfer, search and I/O operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOp {
    Ldi,
    Ldd,
    Cpi,
    Cpd,
    Ini,
    Ind,
    Outi,
    Outd,
}

impl BlockOp {
    /// True for the decrementing variants
    pub fn decrements(self) -> bool {
        matches!(self, BlockOp::Ldd | BlockOp::Cpd | BlockOp::Ind | BlockOp::Outd)
    }
}

/// Operation kind with its operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Nop,
    Halt,

    // 8-bit loads
    Ld8 { dst: Operand8, src: Operand8 },
    LdAI,
    LdAR,
    LdIA,
    LdRA,

    // 16-bit loads
    Ld16 { dst: RegPair, value: u16 },
    Ld16Load { dst: RegPair, addr: u16 },
    Ld16Store { addr: u16, src: RegPair },
    LdSp(RegPair),
    Push(RegPair),
    Pop(RegPair),

    // Exchange
    ExAf,
    Exx,
    ExDeHl,
    ExSp(RegPair),

    // 8-bit arithmetic
    Alu { op: AluOp, src: Operand8 },
    Inc8(Operand8),
    Dec8(Operand8),
    Daa,
    Cpl,
    Neg,
    Ccf,
    Scf,

    // 16-bit arithmetic
    Add16 { dst: RegPair, src: RegPair },
    Adc16(RegPair),
    Sbc16(RegPair),
    Inc16(RegPair),
    Dec16(RegPair),

    // Rotates, shifts and bits
    Rlca,
    Rrca,
    Rla,
    Rra,
    Rld,
    Rrd,
    /// `copy` is the undocumented DDCB/FDCB register copy of the result
    Rot { op: RotOp, target: Operand8, copy: Option<Reg8> },
    Bit { bit: u8, src: Operand8 },
    Res { bit: u8, target: Operand8, copy: Option<Reg8> },
    Set { bit: u8, target: Operand8, copy: Option<Reg8> },

    // Control flow
    Jp { cond: Option<Cond>, addr: u16 },
    JpInd(RegPair),
    Jr { cond: Option<Cond>, offset: i8 },
    Djnz(i8),
    Call { cond: Option<Cond>, addr: u16 },
    Ret(Option<Cond>),
    Reti,
    Retn,
    Rst(u8),

    // CPU control
    Di,
    Ei,
    Im(InterruptMode),

    // Block operations
    Block { op: BlockOp, repeat: bool },

    // Input and output
    InAN(u8),
    OutNA(u8),
    /// IN r,(C); `None` is the flags-only form IN (C)
    InC(Option<Reg8>),
    /// OUT (C),r; `None` is the undocumented OUT (C),0
    OutC(Option<Reg8>),

    /// Opcode with no defined behavior; executes as a NOP
    Illegal { prefix: Prefix, opcode: u8 },
}

/// A decoded instruction
///
/// Produced at fetch time, consumed by the execution step, then dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub op: Op,
    pub prefix: Prefix,
    /// Bytes consumed, prefixes and operands included
    pub length: u8,
    /// T-states when a conditional is not taken (or for unconditional ops)
    pub cycles: u8,
    /// T-states when a branch is taken or a block instruction repeats
    pub cycles_taken: u8,
}

impl Instruction {
    /// Number of opcode fetch (M1) cycles, which is how far R advances
    pub fn opcode_fetches(&self) -> u8 {
        if self.prefix == Prefix::None || self.length == 1 {
            1
        } else {
            2
        }
    }

    /// Cost in T-states given whether the branch was taken
    pub fn cost(&self, taken: bool) -> u32 {
        if taken {
            self.cycles_taken as u32
        } else {
            self.cycles as u32
        }
    }
}

/// Decode the instruction starting at `pc`
pub fn decode(bus: &Bus, pc: u16) -> Instruction {
    let mut d = Decoder::new(bus, pc);
    let opcode = d.byte();
    match opcode {
        0xCB => d.decode_cb(),
        0xED => d.decode_ed(),
        0xDD => d.decode_indexed(IndexReg::IX, Prefix::DD),
        0xFD => d.decode_indexed(IndexReg::IY, Prefix::FD),
        _ => d.decode_main(opcode),
    }
}

/// Cursor over the instruction bytes plus the prefix context
struct Decoder<'a> {
    bus: &'a Bus,
    pc: u16,
    len: u8,
    prefix: Prefix,
    index: Option<IndexReg>,
    disp: Option<i8>,
}

impl<'a> Decoder<'a> {
    fn new(bus: &'a Bus, pc: u16) -> Self {
        Self {
            bus,
            pc,
            len: 0,
            prefix: Prefix::None,
            index: None,
            disp: None,
        }
    }

    fn peek(&self) -> u8 {
        self.bus.read_byte(self.pc.wrapping_add(self.len as u16))
    }

    fn byte(&mut self) -> u8 {
        let b = self.peek();
        self.len += 1;
        b
    }

    fn word(&mut self) -> u16 {
        let lo = self.byte() as u16;
        let hi = self.byte() as u16;
        lo | (hi << 8)
    }

    fn finish(&self, op: Op, cycles: u8) -> Instruction {
        self.finish_cond(op, cycles, cycles)
    }

    fn finish_cond(&self, op: Op, cycles: u8, cycles_taken: u8) -> Instruction {
        Instruction {
            op,
            prefix: self.prefix,
            length: self.len,
            cycles,
            cycles_taken,
        }
    }

    // ========== Operand Tables ==========

    /// Register table `r`: B C D E H L (HL) A
    ///
    /// Under DD/FD, H and L become the index halves unless the instruction
    /// also addresses (IX+d), in which case they stay H and L.
    fn r(&self, code: u8) -> Operand8 {
        match code & 7 {
            0 => Operand8::Reg(Reg8::B),
            1 => Operand8::Reg(Reg8::C),
            2 => Operand8::Reg(Reg8::D),
            3 => Operand8::Reg(Reg8::E),
            4 => match (self.index, self.disp) {
                (Some(ix), None) => Operand8::Reg(ix.high()),
                _ => Operand8::Reg(Reg8::H),
            },
            5 => match (self.index, self.disp) {
                (Some(ix), None) => Operand8::Reg(ix.low()),
                _ => Operand8::Reg(Reg8::L),
            },
            6 => match (self.index, self.disp) {
                (Some(ix), Some(d)) => Operand8::Indexed(ix, d),
                _ => Operand8::Ind(RegPair::HL),
            },
            _ => Operand8::Reg(Reg8::A),
        }
    }

    /// HL, or the index register under DD/FD
    fn hl(&self) -> RegPair {
        self.index.map_or(RegPair::HL, IndexReg::pair)
    }

    /// Register pair table `rp`: BC DE HL SP
    fn rp(&self, p: u8) -> RegPair {
        match p & 3 {
            0 => RegPair::BC,
            1 => RegPair::DE,
            2 => self.hl(),
            _ => RegPair::SP,
        }
    }

    /// Register pair table `rp2`: BC DE HL AF
    fn rp2(&self, p: u8) -> RegPair {
        match p & 3 {
            0 => RegPair::BC,
            1 => RegPair::DE,
            2 => self.hl(),
            _ => RegPair::AF,
        }
    }

    /// Plain register for ED-table and undocumented copy forms
    fn plain_reg(code: u8) -> Option<Reg8> {
        match code & 7 {
            0 => Some(Reg8::B),
            1 => Some(Reg8::C),
            2 => Some(Reg8::D),
            3 => Some(Reg8::E),
            4 => Some(Reg8::H),
            5 => Some(Reg8::L),
            6 => None,
            _ => Some(Reg8::A),
        }
    }

    // ========== Prefix Handling ==========

    fn decode_indexed(mut self, index: IndexReg, prefix: Prefix) -> Instruction {
        self.prefix = prefix;
        match self.peek() {
            // Another prefix follows: this one is dropped as a 4 T-state no-op
            0xDD | 0xFD | 0xED => self.finish(Op::Nop, 4),
            0xCB => {
                self.len += 1;
                self.decode_indexed_cb(index)
            }
            _ => {
                self.index = Some(index);
                let opcode = self.byte();
                let mut inst = self.decode_main(opcode);
                inst.cycles += 4;
                inst.cycles_taken += 4;
                inst
            }
        }
    }

    /// DD CB d op / FD CB d op
    fn decode_indexed_cb(mut self, index: IndexReg) -> Instruction {
        self.prefix = match index {
            IndexReg::IX => Prefix::DDCB,
            IndexReg::IY => Prefix::FDCB,
        };
        let d = self.byte() as i8;
        let opcode = self.byte();
        let x = opcode >> 6;
        let y = (opcode >> 3) & 7;
        let z = opcode & 7;
        let target = Operand8::Indexed(index, d);
        let copy = Self::plain_reg(z);
        match x {
            0 => self.finish(
                Op::Rot {
                    op: RotOp::from_code(y),
                    target,
                    copy,
                },
                23,
            ),
            1 => self.finish(Op::Bit { bit: y, src: target }, 20),
            2 => self.finish(Op::Res { bit: y, target, copy }, 23),
            _ => self.finish(Op::Set { bit: y, target, copy }, 23),
        }
    }

    fn decode_cb(mut self) -> Instruction {
        self.prefix = Prefix::CB;
        let opcode = self.byte();
        let x = opcode >> 6;
        let y = (opcode >> 3) & 7;
        let operand = self.r(opcode);
        let mem = operand.is_memory();
        match x {
            0 => self.finish(
                Op::Rot {
                    op: RotOp::from_code(y),
                    target: operand,
                    copy: None,
                },
                if mem { 15 } else { 8 },
            ),
            1 => self.finish(Op::Bit { bit: y, src: operand }, if mem { 12 } else { 8 }),
            2 => self.finish(
                Op::Res {
                    bit: y,
                    target: operand,
                    copy: None,
                },
                if mem { 15 } else { 8 },
            ),
            _ => self.finish(
                Op::Set {
                    bit: y,
                    target: operand,
                    copy: None,
                },
                if mem { 15 } else { 8 },
            ),
        }
    }

    fn decode_ed(mut self) -> Instruction {
        self.prefix = Prefix::ED;
        let opcode = self.byte();
        let x = opcode >> 6;
        let y = (opcode >> 3) & 7;
        let z = opcode & 7;
        let p = y >> 1;
        let q = y & 1;

        match (x, z) {
            (1, 0) => self.finish(Op::InC(Self::plain_reg(y)), 12),
            (1, 1) => self.finish(Op::OutC(Self::plain_reg(y)), 12),
            (1, 2) => {
                let rp = self.rp(p);
                let op = if q == 0 { Op::Sbc16(rp) } else { Op::Adc16(rp) };
                self.finish(op, 15)
            }
            (1, 3) => {
                let rp = self.rp(p);
                let addr = self.word();
                let op = if q == 0 {
                    Op::Ld16Store { addr, src: rp }
                } else {
                    Op::Ld16Load { dst: rp, addr }
                };
                self.finish(op, 20)
            }
            (1, 4) => self.finish(Op::Neg, 8),
            (1, 5) => {
                let op = if y == 1 { Op::Reti } else { Op::Retn };
                self.finish(op, 14)
            }
            (1, 6) => {
                let mode = match y & 3 {
                    2 => InterruptMode::Mode1,
                    3 => InterruptMode::Mode2,
                    _ => InterruptMode::Mode0,
                };
                self.finish(Op::Im(mode), 8)
            }
            (1, 7) => match y {
                0 => self.finish(Op::LdIA, 9),
                1 => self.finish(Op::LdRA, 9),
                2 => self.finish(Op::LdAI, 9),
                3 => self.finish(Op::LdAR, 9),
                4 => self.finish(Op::Rrd, 18),
                5 => self.finish(Op::Rld, 18),
                _ => self.illegal(opcode),
            },
            (2, 0..=3) if y >= 4 => {
                let repeat = y >= 6;
                let op = match (z, y & 1) {
                    (0, 0) => BlockOp::Ldi,
                    (0, _) => BlockOp::Ldd,
                    (1, 0) => BlockOp::Cpi,
                    (1, _) => BlockOp::Cpd,
                    (2, 0) => BlockOp::Ini,
                    (2, _) => BlockOp::Ind,
                    (3, 0) => BlockOp::Outi,
                    _ => BlockOp::Outd,
                };
                if repeat {
                    self.finish_cond(Op::Block { op, repeat }, 16, 21)
                } else {
                    self.finish(Op::Block { op, repeat }, 16)
                }
            }
            _ => self.illegal(opcode),
        }
    }

    fn illegal(&self, opcode: u8) -> Instruction {
        self.finish(
            Op::Illegal {
                prefix: self.prefix,
                opcode,
            },
            8,
        )
    }

    /// Whether an unprefixed opcode addresses (HL), which becomes (IX+d)
    fn uses_hl_indirect(opcode: u8) -> bool {
        let x = opcode >> 6;
        let y = (opcode >> 3) & 7;
        let z = opcode & 7;
        match x {
            0 => y == 6 && (4..=6).contains(&z),
            1 => opcode != 0x76 && (y == 6 || z == 6),
            2 => z == 6,
            _ => false,
        }
    }

    // ========== Unprefixed Table ==========

    /// Decode an unprefixed opcode, or the opcode after DD/FD
    ///
    /// For indexed forms the (IX+d) surcharge is applied here; the flat
    /// 4 T-state prefix cost is added by the caller.
    fn decode_main(&mut self, opcode: u8) -> Instruction {
        if self.index.is_some() && Self::uses_hl_indirect(opcode) {
            self.disp = Some(self.byte() as i8);
        }
        let mut inst = self.decode_main_op(opcode);
        if self.disp.is_some() {
            let surcharge = if opcode == 0x36 { 5 } else { 8 };
            inst.cycles += surcharge;
            inst.cycles_taken += surcharge;
        }
        inst
    }

    fn decode_main_op(&mut self, opcode: u8) -> Instruction {
        let x = opcode >> 6;
        let y = (opcode >> 3) & 7;
        let z = opcode & 7;
        let p = y >> 1;
        let q = y & 1;

        match x {
            0 => self.decode_x0(y, z, p, q),
            1 => {
                if opcode == 0x76 {
                    return self.finish(Op::Halt, 4);
                }
                let dst = self.r(y);
                let src = self.r(z);
                let mem = dst.is_memory() || src.is_memory();
                self.finish(Op::Ld8 { dst, src }, if mem { 7 } else { 4 })
            }
            2 => {
                let src = self.r(z);
                let cycles = if src.is_memory() { 7 } else { 4 };
                self.finish(
                    Op::Alu {
                        op: AluOp::from_code(y),
                        src,
                    },
                    cycles,
                )
            }
            _ => self.decode_x3(y, z, p, q),
        }
    }

    fn decode_x0(&mut self, y: u8, z: u8, p: u8, q: u8) -> Instruction {
        match z {
            0 => match y {
                0 => self.finish(Op::Nop, 4),
                1 => self.finish(Op::ExAf, 4),
                2 => {
                    let offset = self.byte() as i8;
                    self.finish_cond(Op::Djnz(offset), 8, 13)
                }
                3 => {
                    let offset = self.byte() as i8;
                    self.finish(Op::Jr { cond: None, offset }, 12)
                }
                _ => {
                    let offset = self.byte() as i8;
                    let cond = Some(Cond::from_code(y - 4));
                    self.finish_cond(Op::Jr { cond, offset }, 7, 12)
                }
            },
            1 => {
                if q == 0 {
                    let dst = self.rp(p);
                    let value = self.word();
                    self.finish(Op::Ld16 { dst, value }, 10)
                } else {
                    let op = Op::Add16 {
                        dst: self.hl(),
                        src: self.rp(p),
                    };
                    self.finish(op, 11)
                }
            }
            2 => {
                let a = Operand8::Reg(Reg8::A);
                match (p, q) {
                    (0, 0) => self.finish(
                        Op::Ld8 {
                            dst: Operand8::Ind(RegPair::BC),
                            src: a,
                        },
                        7,
                    ),
                    (1, 0) => self.finish(
                        Op::Ld8 {
                            dst: Operand8::Ind(RegPair::DE),
                            src: a,
                        },
                        7,
                    ),
                    (2, 0) => {
                        let addr = self.word();
                        let src = self.hl();
                        self.finish(Op::Ld16Store { addr, src }, 16)
                    }
                    (3, 0) => {
                        let addr = self.word();
                        self.finish(
                            Op::Ld8 {
                                dst: Operand8::Abs(addr),
                                src: a,
                            },
                            13,
                        )
                    }
                    (0, _) => self.finish(
                        Op::Ld8 {
                            dst: a,
                            src: Operand8::Ind(RegPair::BC),
                        },
                        7,
                    ),
                    (1, _) => self.finish(
                        Op::Ld8 {
                            dst: a,
                            src: Operand8::Ind(RegPair::DE),
                        },
                        7,
                    ),
                    (2, _) => {
                        let addr = self.word();
                        let dst = self.hl();
                        self.finish(Op::Ld16Load { dst, addr }, 16)
                    }
                    _ => {
                        let addr = self.word();
                        self.finish(
                            Op::Ld8 {
                                dst: a,
                                src: Operand8::Abs(addr),
                            },
                            13,
                        )
                    }
                }
            }
            3 => {
                let rp = self.rp(p);
                let op = if q == 0 { Op::Inc16(rp) } else { Op::Dec16(rp) };
                self.finish(op, 6)
            }
            4 | 5 => {
                let target = self.r(y);
                let cycles = if target.is_memory() { 11 } else { 4 };
                let op = if z == 4 {
                    Op::Inc8(target)
                } else {
                    Op::Dec8(target)
                };
                self.finish(op, cycles)
            }
            6 => {
                let dst = self.r(y);
                let n = self.byte();
                let cycles = if dst.is_memory() { 10 } else { 7 };
                self.finish(
                    Op::Ld8 {
                        dst,
                        src: Operand8::Imm(n),
                    },
                    cycles,
                )
            }
            _ => {
                let op = match y {
                    0 => Op::Rlca,
                    1 => Op::Rrca,
                    2 => Op::Rla,
                    3 => Op::Rra,
                    4 => Op::Daa,
                    5 => Op::Cpl,
                    6 => Op::Scf,
                    _ => Op::Ccf,
                };
                self.finish(op, 4)
            }
        }
    }

    fn decode_x3(&mut self, y: u8, z: u8, p: u8, q: u8) -> Instruction {
        match z {
            0 => self.finish_cond(Op::Ret(Some(Cond::from_code(y))), 5, 11),
            1 => {
                if q == 0 {
                    return self.finish(Op::Pop(self.rp2(p)), 10);
                }
                match p {
                    0 => self.finish(Op::Ret(None), 10),
                    1 => self.finish(Op::Exx, 4),
                    2 => self.finish(Op::JpInd(self.hl()), 4),
                    _ => self.finish(Op::LdSp(self.hl()), 6),
                }
            }
            2 => {
                let addr = self.word();
                let cond = Some(Cond::from_code(y));
                self.finish(Op::Jp { cond, addr }, 10)
            }
            3 => match y {
                0 => {
                    let addr = self.word();
                    self.finish(Op::Jp { cond: None, addr }, 10)
                }
                // 0xCB is dispatched before reaching this table
                1 => self.finish(Op::Nop, 4),
                2 => {
                    let n = self.byte();
                    self.finish(Op::OutNA(n), 11)
                }
                3 => {
                    let n = self.byte();
                    self.finish(Op::InAN(n), 11)
                }
                4 => self.finish(Op::ExSp(self.hl()), 19),
                5 => self.finish(Op::ExDeHl, 4),
                6 => self.finish(Op::Di, 4),
                _ => self.finish(Op::Ei, 4),
            },
            4 => {
                let addr = self.word();
                let cond = Some(Cond::from_code(y));
                self.finish_cond(Op::Call { cond, addr }, 10, 17)
            }
            5 => {
                if q == 0 {
                    return self.finish(Op::Push(self.rp2(p)), 11);
                }
                // p == 0; the DD/ED/FD slots are dispatched before reaching here
                let addr = self.word();
                self.finish(Op::Call { cond: None, addr }, 17)
            }
            6 => {
                let n = self.byte();
                self.finish(
                    Op::Alu {
                        op: AluOp::from_code(y),
                        src: Operand8::Imm(n),
                    },
                    7,
                )
            }
            _ => self.finish(Op::Rst(y * 8), 11),
        }
    }
}
