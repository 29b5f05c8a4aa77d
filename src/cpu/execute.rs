//! Z80 instruction execution
//!
//! One handler per [`Op`]. PC has already been advanced past the instruction
//! when these run, so relative jumps and pushed return addresses are computed
//! from the post-fetch PC. Control flow handlers overwrite PC afterwards.
//!
//! Every handler returns whether a conditional branch was taken (or a block
//! instruction repeated), which selects the taken or not-taken cycle count.
//!
//! # References
//! - Z80 CPU User Manual (Zilog UM0080)
//! - The Undocumented Z80 Documented (Sean Young)

use super::decode::{BlockOp, Op, Operand8, RotOp};
use super::flags::{self, sz53, sz53p};
use super::registers::{Reg8, RegPair};
use super::Cpu;
use crate::bus::Bus;

impl Cpu {
    /// Execute a decoded operation. Returns true if a branch was taken.
    pub(super) fn execute(&mut self, bus: &mut Bus, op: Op) -> bool {
        match op {
            Op::Nop | Op::Illegal { .. } => false,
            Op::Halt => {
                self.halted = true;
                tracing::debug!("HALT_ENTER pc={:04X}", self.regs.pc);
                false
            }

            // ========== 8-bit Loads ==========
            Op::Ld8 { dst, src } => {
                let val = self.read_operand(bus, src);
                self.write_operand(bus, dst, val);
                false
            }
            Op::LdAI => {
                self.regs.set_a(self.regs.i);
                self.ld_a_special_flags();
                false
            }
            Op::LdAR => {
                self.regs.set_a(self.regs.r);
                self.ld_a_special_flags();
                false
            }
            Op::LdIA => {
                self.regs.i = self.regs.a();
                false
            }
            Op::LdRA => {
                self.regs.r = self.regs.a();
                false
            }

            // ========== 16-bit Loads ==========
            Op::Ld16 { dst, value } => {
                self.regs.set_pair(dst, value);
                false
            }
            Op::Ld16Load { dst, addr } => {
                let val = bus.read_word(addr);
                self.regs.set_pair(dst, val);
                false
            }
            Op::Ld16Store { addr, src } => {
                bus.write_word(addr, self.rp(src));
                false
            }
            Op::LdSp(src) => {
                self.regs.sp = self.rp(src);
                false
            }
            Op::Push(pair) => {
                let val = self.rp(pair);
                self.push_word(bus, val);
                false
            }
            Op::Pop(pair) => {
                let val = self.pop_word(bus);
                self.regs.set_pair(pair, val);
                false
            }

            // ========== Exchange ==========
            Op::ExAf => {
                self.regs.ex_af();
                false
            }
            Op::Exx => {
                self.regs.exx();
                false
            }
            Op::ExDeHl => {
                self.regs.ex_de_hl();
                false
            }
            Op::ExSp(pair) => {
                let sp = self.regs.sp;
                let mem = bus.read_word(sp);
                bus.write_word(sp, self.rp(pair));
                self.regs.set_pair(pair, mem);
                false
            }

            // ========== 8-bit Arithmetic ==========
            Op::Alu { op, src } => {
                let val = self.read_operand(bus, src);
                self.alu(op, val);
                false
            }
            Op::Inc8(target) => {
                let val = self.read_operand(bus, target);
                let r = self.alu_inc(val);
                self.write_operand(bus, target, r);
                false
            }
            Op::Dec8(target) => {
                let val = self.read_operand(bus, target);
                let r = self.alu_dec(val);
                self.write_operand(bus, target, r);
                false
            }
            Op::Daa => {
                self.daa();
                false
            }
            Op::Cpl => {
                let a = !self.regs.a();
                self.regs.set_a(a);
                let f = (self.regs.f() & (flags::S | flags::Z | flags::PV | flags::C))
                    | flags::H
                    | flags::N
                    | (a & flags::XY);
                self.regs.set_f(f);
                false
            }
            Op::Neg => {
                let a = self.regs.a();
                let r = self.alu_sub(0, a, false);
                self.regs.set_a(r);
                false
            }
            Op::Scf => {
                let f = (self.regs.f() & (flags::S | flags::Z | flags::PV))
                    | flags::C
                    | (self.regs.a() & flags::XY);
                self.regs.set_f(f);
                false
            }
            Op::Ccf => {
                let old_carry = self.regs.flag_c();
                let mut f =
                    (self.regs.f() & (flags::S | flags::Z | flags::PV)) | (self.regs.a() & flags::XY);
                if old_carry {
                    f |= flags::H;
                } else {
                    f |= flags::C;
                }
                self.regs.set_f(f);
                false
            }

            // ========== 16-bit Arithmetic ==========
            Op::Add16 { dst, src } => {
                let r = self.add16(self.rp(dst), self.rp(src));
                self.regs.set_pair(dst, r);
                false
            }
            Op::Adc16(src) => {
                let r = self.adc16(self.rp(RegPair::HL), self.rp(src));
                self.regs.set_pair(RegPair::HL, r);
                false
            }
            Op::Sbc16(src) => {
                let r = self.sbc16(self.rp(RegPair::HL), self.rp(src));
                self.regs.set_pair(RegPair::HL, r);
                false
            }
            Op::Inc16(pair) => {
                self.regs.set_pair(pair, self.rp(pair).wrapping_add(1));
                false
            }
            Op::Dec16(pair) => {
                self.regs.set_pair(pair, self.rp(pair).wrapping_sub(1));
                false
            }

            // ========== Rotates, Shifts and Bits ==========
            Op::Rlca => {
                self.rotate_a(RotOp::Rlc);
                false
            }
            Op::Rrca => {
                self.rotate_a(RotOp::Rrc);
                false
            }
            Op::Rla => {
                self.rotate_a(RotOp::Rl);
                false
            }
            Op::Rra => {
                self.rotate_a(RotOp::Rr);
                false
            }
            Op::Rld => {
                self.rotate_digits(bus, true);
                false
            }
            Op::Rrd => {
                self.rotate_digits(bus, false);
                false
            }
            Op::Rot { op, target, copy } => {
                let val = self.read_operand(bus, target);
                let r = self.rotate(op, val);
                self.store_with_copy(bus, target, copy, r);
                false
            }
            Op::Bit { bit, src } => {
                let val = self.read_operand(bus, src);
                let xy = match src {
                    Operand8::Indexed(..) => {
                        (self.operand_addr(src).unwrap_or_default() >> 8) as u8
                    }
                    _ => val,
                };
                self.bit_test(bit, val, xy);
                false
            }
            Op::Res { bit, target, copy } => {
                let r = self.read_operand(bus, target) & !(1 << bit);
                self.store_with_copy(bus, target, copy, r);
                false
            }
            Op::Set { bit, target, copy } => {
                let r = self.read_operand(bus, target) | (1 << bit);
                self.store_with_copy(bus, target, copy, r);
                false
            }

            // ========== Control Flow ==========
            Op::Jp { cond, addr } => {
                let taken = cond.map_or(true, |c| self.condition(c));
                if taken {
                    self.regs.pc = addr;
                }
                taken
            }
            Op::JpInd(pair) => {
                self.regs.pc = self.rp(pair);
                false
            }
            Op::Jr { cond, offset } => {
                let taken = cond.map_or(true, |c| self.condition(c));
                if taken {
                    self.regs.pc = self.regs.pc.wrapping_add(offset as i16 as u16);
                }
                taken
            }
            Op::Djnz(offset) => {
                let b = self.regs.get8(Reg8::B).wrapping_sub(1);
                self.regs.set8(Reg8::B, b);
                if b != 0 {
                    self.regs.pc = self.regs.pc.wrapping_add(offset as i16 as u16);
                }
                b != 0
            }
            Op::Call { cond, addr } => {
                let taken = cond.map_or(true, |c| self.condition(c));
                if taken {
                    let ret = self.regs.pc;
                    self.push_word(bus, ret);
                    self.regs.pc = addr;
                }
                taken
            }
            Op::Ret(cond) => {
                let taken = cond.map_or(true, |c| self.condition(c));
                if taken {
                    self.regs.pc = self.pop_word(bus);
                }
                taken
            }
            Op::Reti | Op::Retn => {
                self.regs.pc = self.pop_word(bus);
                self.regs.iff1 = self.regs.iff2;
                false
            }
            Op::Rst(target) => {
                let ret = self.regs.pc;
                self.push_word(bus, ret);
                self.regs.pc = target as u16;
                false
            }

            // ========== CPU Control ==========
            Op::Di => {
                self.regs.iff1 = false;
                self.regs.iff2 = false;
                false
            }
            Op::Ei => {
                self.regs.iff1 = true;
                self.regs.iff2 = true;
                self.ei_delay = true;
                false
            }
            Op::Im(mode) => {
                self.regs.im = mode;
                false
            }

            // ========== Block and I/O ==========
            Op::Block { op, repeat } => self.block(bus, op, repeat),
            Op::InAN(n) => {
                let port = ((self.regs.a() as u16) << 8) | n as u16;
                let val = bus.port_read(port);
                self.regs.set_a(val);
                false
            }
            Op::OutNA(n) => {
                let a = self.regs.a();
                bus.port_write(((a as u16) << 8) | n as u16, a);
                false
            }
            Op::InC(reg) => {
                let val = bus.port_read(self.rp(RegPair::BC));
                let f = (self.regs.f() & flags::C) | sz53p(val);
                self.regs.set_f(f);
                if let Some(reg) = reg {
                    self.regs.set8(reg, val);
                }
                false
            }
            Op::OutC(reg) => {
                let val = reg.map_or(0, |r| self.regs.get8(r));
                bus.port_write(self.rp(RegPair::BC), val);
                false
            }
        }
    }

    /// Store a CB-family result, plus the undocumented register copy
    fn store_with_copy(&mut self, bus: &mut Bus, target: Operand8, copy: Option<Reg8>, val: u8) {
        self.write_operand(bus, target, val);
        if let Some(reg) = copy {
            self.regs.set8(reg, val);
        }
    }

    /// RLD (left) / RRD (right): rotate BCD digits between A and (HL)
    fn rotate_digits(&mut self, bus: &mut Bus, left: bool) {
        let hl = self.rp(RegPair::HL);
        let a = self.regs.a();
        let m = bus.read_byte(hl);
        let (new_a, new_m) = if left {
            ((a & 0xF0) | (m >> 4), (m << 4) | (a & 0x0F))
        } else {
            ((a & 0xF0) | (m & 0x0F), (a << 4) | (m >> 4))
        };
        bus.write_byte(hl, new_m);
        self.regs.set_a(new_a);
        let f = (self.regs.f() & flags::C) | sz53p(new_a);
        self.regs.set_f(f);
    }

    /// LDI/LDD/CPI/CPD/INI/IND/OUTI/OUTD and their repeating forms
    ///
    /// A repeating form that has not finished rewinds PC to itself so the next
    /// step executes it again.
    fn block(&mut self, bus: &mut Bus, op: BlockOp, repeat: bool) -> bool {
        let delta: u16 = if op.decrements() { 0xFFFF } else { 1 };
        let hl = self.rp(RegPair::HL);

        let again = match op {
            BlockOp::Ldi | BlockOp::Ldd => {
                let de = self.rp(RegPair::DE);
                let val = bus.read_byte(hl);
                bus.write_byte(de, val);
                self.regs.set_pair(RegPair::HL, hl.wrapping_add(delta));
                self.regs.set_pair(RegPair::DE, de.wrapping_add(delta));
                let bc = self.rp(RegPair::BC).wrapping_sub(1);
                self.regs.set_pair(RegPair::BC, bc);

                let n = val.wrapping_add(self.regs.a());
                let mut f = (self.regs.f() & (flags::S | flags::Z | flags::C))
                    | (n & flags::F3)
                    | ((n << 4) & flags::F5);
                if bc != 0 {
                    f |= flags::PV;
                }
                self.regs.set_f(f);
                bc != 0
            }
            BlockOp::Cpi | BlockOp::Cpd => {
                let a = self.regs.a();
                let val = bus.read_byte(hl);
                let r = a.wrapping_sub(val);
                let half = (a ^ val ^ r) & flags::H != 0;
                self.regs.set_pair(RegPair::HL, hl.wrapping_add(delta));
                let bc = self.rp(RegPair::BC).wrapping_sub(1);
                self.regs.set_pair(RegPair::BC, bc);

                let n = r.wrapping_sub(half as u8);
                let mut f = (self.regs.f() & flags::C)
                    | flags::N
                    | (sz53(r) & !flags::XY)
                    | (n & flags::F3)
                    | ((n << 4) & flags::F5);
                if half {
                    f |= flags::H;
                }
                if bc != 0 {
                    f |= flags::PV;
                }
                self.regs.set_f(f);
                bc != 0 && r != 0
            }
            BlockOp::Ini | BlockOp::Ind => {
                let val = bus.port_read(self.rp(RegPair::BC));
                bus.write_byte(hl, val);
                self.regs.set_pair(RegPair::HL, hl.wrapping_add(delta));
                let c = self.regs.get8(Reg8::C);
                let c_adj = if op.decrements() {
                    c.wrapping_sub(1)
                } else {
                    c.wrapping_add(1)
                };
                let b = self.regs.get8(Reg8::B).wrapping_sub(1);
                self.regs.set8(Reg8::B, b);
                self.io_block_flags(val, val as u16 + c_adj as u16);
                b != 0
            }
            BlockOp::Outi | BlockOp::Outd => {
                let val = bus.read_byte(hl);
                let b = self.regs.get8(Reg8::B).wrapping_sub(1);
                self.regs.set8(Reg8::B, b);
                bus.port_write(self.rp(RegPair::BC), val);
                self.regs.set_pair(RegPair::HL, hl.wrapping_add(delta));
                let l = self.regs.get8(Reg8::L);
                self.io_block_flags(val, val as u16 + l as u16);
                b != 0
            }
        };

        if repeat && again {
            self.regs.pc = self.regs.pc.wrapping_sub(2);
            true
        } else {
            false
        }
    }

    /// Flags after INI/IND/OUTI/OUTD, computed from the transferred byte and
    /// the auxiliary sum `k`
    fn io_block_flags(&mut self, val: u8, k: u16) {
        let b = self.regs.get8(Reg8::B);
        let mut f = sz53(b);
        if val & 0x80 != 0 {
            f |= flags::N;
        }
        if k > 0xFF {
            f |= flags::H | flags::C;
        }
        f |= sz53p(((k & 7) as u8) ^ b) & flags::PV;
        self.regs.set_f(f);
    }
}
