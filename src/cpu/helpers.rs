//! Z80 CPU helper functions
//!
//! This module contains helper functions for the Z80 CPU implementation including:
//! - Operand access (operand_addr, read_operand, write_operand)
//! - Stack operations (push_word, pop_word)
//! - Condition evaluation
//! - ALU operations (alu, alu_inc, alu_dec, add16, adc16, sbc16, daa, rotate)
//!
//! Flag results follow the documented Z80 behavior, including the undocumented
//! F5/F3 copies where they are well defined.
//!
//! # References
//! - Z80 CPU User Manual (Zilog UM0080)
//! - The Undocumented Z80 Documented (Sean Young)

use super::decode::{AluOp, Cond, Operand8, RotOp};
use super::flags::{self, sz53, sz53p};
use super::registers::RegPair;
use super::Cpu;
use crate::bus::Bus;

impl Cpu {
    // ========== Operand Access ==========

    /// Effective address of a memory operand, `None` for registers and immediates
    pub(super) fn operand_addr(&self, operand: Operand8) -> Option<u16> {
        match operand {
            Operand8::Ind(pair) => Some(self.regs.pair(pair)),
            Operand8::Indexed(index, d) => {
                Some(self.regs.pair(index.pair()).wrapping_add(d as i16 as u16))
            }
            Operand8::Abs(addr) => Some(addr),
            Operand8::Reg(_) | Operand8::Imm(_) => None,
        }
    }

    pub(super) fn read_operand(&self, bus: &Bus, operand: Operand8) -> u8 {
        match operand {
            Operand8::Reg(reg) => self.regs.get8(reg),
            Operand8::Imm(n) => n,
            _ => match self.operand_addr(operand) {
                Some(addr) => bus.read_byte(addr),
                None => 0,
            },
        }
    }

    /// Store to an operand; writes to an immediate are ignored
    pub(super) fn write_operand(&mut self, bus: &mut Bus, operand: Operand8, val: u8) {
        match operand {
            Operand8::Reg(reg) => self.regs.set8(reg, val),
            Operand8::Imm(_) => {}
            _ => {
                if let Some(addr) = self.operand_addr(operand) {
                    bus.write_byte(addr, val);
                }
            }
        }
    }

    // ========== Stack Operations ==========

    /// Push a 16-bit value: high byte at SP-1, low byte at SP-2
    pub(super) fn push_word(&mut self, bus: &mut Bus, val: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(2);
        bus.write_word(self.regs.sp, val);
    }

    pub(super) fn pop_word(&mut self, bus: &mut Bus) -> u16 {
        let val = bus.read_word(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(2);
        val
    }

    // ========== Conditions ==========

    pub(super) fn condition(&self, cond: Cond) -> bool {
        match cond {
            Cond::NZ => !self.regs.flag_z(),
            Cond::Z => self.regs.flag_z(),
            Cond::NC => !self.regs.flag_c(),
            Cond::C => self.regs.flag_c(),
            Cond::PO => !self.regs.flag_pv(),
            Cond::PE => self.regs.flag_pv(),
            Cond::P => !self.regs.flag_s(),
            Cond::M => self.regs.flag_s(),
        }
    }

    // ========== 8-bit ALU ==========

    /// Apply an ALU operation to A
    pub(super) fn alu(&mut self, op: AluOp, val: u8) {
        let a = self.regs.a();
        let carry = self.regs.flag_c();
        match op {
            AluOp::Add => {
                let r = self.alu_add(a, val, false);
                self.regs.set_a(r);
            }
            AluOp::Adc => {
                let r = self.alu_add(a, val, carry);
                self.regs.set_a(r);
            }
            AluOp::Sub => {
                let r = self.alu_sub(a, val, false);
                self.regs.set_a(r);
            }
            AluOp::Sbc => {
                let r = self.alu_sub(a, val, carry);
                self.regs.set_a(r);
            }
            AluOp::And => {
                let r = a & val;
                self.regs.set_a(r);
                self.regs.set_f(sz53p(r) | flags::H);
            }
            AluOp::Xor => {
                let r = a ^ val;
                self.regs.set_a(r);
                self.regs.set_f(sz53p(r));
            }
            AluOp::Or => {
                let r = a | val;
                self.regs.set_a(r);
                self.regs.set_f(sz53p(r));
            }
            AluOp::Cp => {
                self.alu_sub(a, val, false);
                // CP takes F5/F3 from the operand, not the result
                let f = (self.regs.f() & !flags::XY) | (val & flags::XY);
                self.regs.set_f(f);
            }
        }
    }

    /// 8-bit add with optional carry in, sets all flags
    pub(super) fn alu_add(&mut self, a: u8, val: u8, carry: bool) -> u8 {
        let sum = a as u16 + val as u16 + carry as u16;
        let r = sum as u8;
        let mut f = sz53(r) | ((a ^ val ^ r) & flags::H);
        if (a ^ !val) & (a ^ r) & 0x80 != 0 {
            f |= flags::PV;
        }
        if sum > 0xFF {
            f |= flags::C;
        }
        self.regs.set_f(f);
        r
    }

    /// 8-bit subtract with optional borrow in, sets all flags
    pub(super) fn alu_sub(&mut self, a: u8, val: u8, carry: bool) -> u8 {
        let diff = (a as i16) - (val as i16) - (carry as i16);
        let r = diff as u8;
        let mut f = sz53(r) | flags::N | ((a ^ val ^ r) & flags::H);
        if (a ^ val) & (a ^ r) & 0x80 != 0 {
            f |= flags::PV;
        }
        if diff < 0 {
            f |= flags::C;
        }
        self.regs.set_f(f);
        r
    }

    /// INC: carry preserved
    pub(super) fn alu_inc(&mut self, val: u8) -> u8 {
        let r = val.wrapping_add(1);
        let mut f = (self.regs.f() & flags::C) | sz53(r);
        if val & 0x0F == 0x0F {
            f |= flags::H;
        }
        if val == 0x7F {
            f |= flags::PV;
        }
        self.regs.set_f(f);
        r
    }

    /// DEC: carry preserved
    pub(super) fn alu_dec(&mut self, val: u8) -> u8 {
        let r = val.wrapping_sub(1);
        let mut f = (self.regs.f() & flags::C) | sz53(r) | flags::N;
        if val & 0x0F == 0x00 {
            f |= flags::H;
        }
        if val == 0x80 {
            f |= flags::PV;
        }
        self.regs.set_f(f);
        r
    }

    // ========== 16-bit ALU ==========

    /// ADD HL/IX/IY,rp: S, Z and PV preserved
    pub(super) fn add16(&mut self, a: u16, b: u16) -> u16 {
        let sum = a as u32 + b as u32;
        let r = sum as u16;
        let mut f = self.regs.f() & (flags::S | flags::Z | flags::PV);
        f |= ((r >> 8) as u8) & flags::XY;
        if (a ^ b ^ r) & 0x1000 != 0 {
            f |= flags::H;
        }
        if sum > 0xFFFF {
            f |= flags::C;
        }
        self.regs.set_f(f);
        r
    }

    /// ADC HL,rp
    pub(super) fn adc16(&mut self, a: u16, b: u16) -> u16 {
        let carry = self.regs.flag_c() as u32;
        let sum = a as u32 + b as u32 + carry;
        let r = sum as u16;
        let mut f = ((r >> 8) as u8) & (flags::S | flags::XY);
        if r == 0 {
            f |= flags::Z;
        }
        if (a ^ b ^ r) & 0x1000 != 0 {
            f |= flags::H;
        }
        if (a ^ !b) & (a ^ r) & 0x8000 != 0 {
            f |= flags::PV;
        }
        if sum > 0xFFFF {
            f |= flags::C;
        }
        self.regs.set_f(f);
        r
    }

    /// SBC HL,rp
    pub(super) fn sbc16(&mut self, a: u16, b: u16) -> u16 {
        let carry = self.regs.flag_c() as i32;
        let diff = a as i32 - b as i32 - carry;
        let r = diff as u16;
        let mut f = (((r >> 8) as u8) & (flags::S | flags::XY)) | flags::N;
        if r == 0 {
            f |= flags::Z;
        }
        if (a ^ b ^ r) & 0x1000 != 0 {
            f |= flags::H;
        }
        if (a ^ b) & (a ^ r) & 0x8000 != 0 {
            f |= flags::PV;
        }
        if diff < 0 {
            f |= flags::C;
        }
        self.regs.set_f(f);
        r
    }

    // ========== Accumulator Specials ==========

    /// Decimal adjust A after BCD add or subtract
    pub(super) fn daa(&mut self) {
        let a = self.regs.a();
        let f = self.regs.f();
        let subtract = f & flags::N != 0;
        let mut carry = f & flags::C != 0;
        let mut adjust = 0u8;

        if f & flags::H != 0 || a & 0x0F > 9 {
            adjust |= 0x06;
        }
        if carry || a > 0x99 {
            adjust |= 0x60;
            carry = true;
        }

        let (r, half) = if subtract {
            (a.wrapping_sub(adjust), f & flags::H != 0 && a & 0x0F < 6)
        } else {
            (a.wrapping_add(adjust), a & 0x0F > 9)
        };

        let mut nf = sz53p(r) | (f & flags::N);
        if half {
            nf |= flags::H;
        }
        if carry {
            nf |= flags::C;
        }
        self.regs.set_a(r);
        self.regs.set_f(nf);
    }

    /// RLCA/RRCA/RLA/RRA: only H, N and C change (plus F5/F3 from A)
    pub(super) fn rotate_a(&mut self, op: RotOp) {
        let a = self.regs.a();
        let (r, carry) = self.rotate_value(op, a);
        let mut f = (self.regs.f() & (flags::S | flags::Z | flags::PV)) | (r & flags::XY);
        if carry {
            f |= flags::C;
        }
        self.regs.set_a(r);
        self.regs.set_f(f);
    }

    /// CB-prefix rotate/shift: returns the result and sets S, Z, PV (parity) and C
    pub(super) fn rotate(&mut self, op: RotOp, val: u8) -> u8 {
        let (r, carry) = self.rotate_value(op, val);
        let mut f = sz53p(r);
        if carry {
            f |= flags::C;
        }
        self.regs.set_f(f);
        r
    }

    /// Raw rotate/shift result and carry out
    fn rotate_value(&self, op: RotOp, v: u8) -> (u8, bool) {
        let cin = self.regs.flag_c() as u8;
        match op {
            RotOp::Rlc => (v.rotate_left(1), v & 0x80 != 0),
            RotOp::Rrc => (v.rotate_right(1), v & 0x01 != 0),
            RotOp::Rl => ((v << 1) | cin, v & 0x80 != 0),
            RotOp::Rr => ((v >> 1) | (cin << 7), v & 0x01 != 0),
            RotOp::Sla => (v << 1, v & 0x80 != 0),
            RotOp::Sra => ((v >> 1) | (v & 0x80), v & 0x01 != 0),
            RotOp::Sll => ((v << 1) | 0x01, v & 0x80 != 0),
            RotOp::Srl => (v >> 1, v & 0x01 != 0),
        }
    }

    /// BIT b: Z and PV set when the bit is clear, S only for bit 7
    ///
    /// `xy_source` supplies F5/F3: the operand for registers, the high byte of
    /// the effective address for (IX+d).
    pub(super) fn bit_test(&mut self, bit: u8, val: u8, xy_source: u8) {
        let set = val & (1 << bit) != 0;
        let mut f = (self.regs.f() & flags::C) | flags::H | (xy_source & flags::XY);
        if !set {
            f |= flags::Z | flags::PV;
        }
        if bit == 7 && set {
            f |= flags::S;
        }
        self.regs.set_f(f);
    }

    /// Flags for LD A,I and LD A,R: PV reflects IFF2
    pub(super) fn ld_a_special_flags(&mut self) {
        let a = self.regs.a();
        let mut f = (self.regs.f() & flags::C) | sz53(a);
        if self.regs.iff2 {
            f |= flags::PV;
        }
        self.regs.set_f(f);
    }

    /// 16-bit value of a register pair, used where the pair is an operand
    #[inline]
    pub(super) fn rp(&self, pair: RegPair) -> u16 {
        self.regs.pair(pair)
    }
}
