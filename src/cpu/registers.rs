//! Z80 register file
//!
//! The eight 8-bit registers live in two named banks, `main` and
//! `alternate`. Two indicators select which bank is live: one for AF (flipped
//! by `EX AF,AF'`) and one for BC/DE/HL (flipped by `EXX`). Swapping never
//! copies register values.
//!
//! Register pairs compose high:low in Z80 order, so BC is B:C with B as the
//! high byte.

use super::flags;

/// Interrupt modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterruptMode {
    /// Mode 0: execute the opcode placed on the data bus
    #[default]
    Mode0,
    /// Mode 1: call to 0x0038
    Mode1,
    /// Mode 2: vectored through the table at I:vector
    Mode2,
}

/// 8-bit registers addressable by instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg8 {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
    IXH,
    IXL,
    IYH,
    IYL,
}

/// 16-bit register pairs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegPair {
    AF,
    BC,
    DE,
    HL,
    SP,
    IX,
    IY,
}

/// Which of the two banks is live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bank {
    #[default]
    Main,
    Alternate,
}

impl Bank {
    fn other(self) -> Bank {
        match self {
            Bank::Main => Bank::Alternate,
            Bank::Alternate => Bank::Main,
        }
    }
}

/// One bank of the eight general purpose registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterBank {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
}

/// Complete Z80 register state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    /// First register bank
    pub main: RegisterBank,
    /// Second register bank (the "shadow" set)
    pub alternate: RegisterBank,
    /// Bank currently holding the live A and F
    af_bank: Bank,
    /// Bank currently holding the live BC, DE and HL
    gp_bank: Bank,

    /// IX index register
    pub ix: u16,
    /// IY index register
    pub iy: u16,
    /// Stack pointer
    pub sp: u16,
    /// Program counter, always the address of the next fetch
    pub pc: u16,
    /// Interrupt vector base
    pub i: u8,
    /// Refresh register (low 7 bits count, bit 7 preserved)
    pub r: u8,

    /// Interrupt enable flip-flop 1
    pub iff1: bool,
    /// Interrupt enable flip-flop 2
    pub iff2: bool,
    /// Interrupt mode
    pub im: InterruptMode,
}

impl RegisterFile {
    /// Create a register file in power-on state with the given stack pointer
    pub fn new(sp: u16) -> Self {
        let mut regs = Self {
            main: RegisterBank::default(),
            alternate: RegisterBank::default(),
            af_bank: Bank::Main,
            gp_bank: Bank::Main,
            ix: 0,
            iy: 0,
            sp,
            pc: 0,
            i: 0,
            r: 0,
            iff1: false,
            iff2: false,
            im: InterruptMode::Mode0,
        };
        regs.reset(sp);
        regs
    }

    /// Power-on values: AF and AF' are 0xFFFF, everything else zero except SP
    pub fn reset(&mut self, sp: u16) {
        self.main = RegisterBank {
            a: 0xFF,
            f: 0xFF,
            ..RegisterBank::default()
        };
        self.alternate = self.main;
        self.af_bank = Bank::Main;
        self.gp_bank = Bank::Main;
        self.ix = 0;
        self.iy = 0;
        self.sp = sp;
        self.pc = 0;
        self.i = 0;
        self.r = 0;
        self.iff1 = false;
        self.iff2 = false;
        self.im = InterruptMode::Mode0;
    }

    fn bank(&self, bank: Bank) -> &RegisterBank {
        match bank {
            Bank::Main => &self.main,
            Bank::Alternate => &self.alternate,
        }
    }

    fn bank_mut(&mut self, bank: Bank) -> &mut RegisterBank {
        match bank {
            Bank::Main => &mut self.main,
            Bank::Alternate => &mut self.alternate,
        }
    }

    /// Bank holding the live AF
    pub fn af_bank(&self) -> Bank {
        self.af_bank
    }

    /// Bank holding the live BC/DE/HL
    pub fn gp_bank(&self) -> Bank {
        self.gp_bank
    }

    // ========== 8-bit Access ==========

    #[inline]
    pub fn a(&self) -> u8 {
        self.bank(self.af_bank).a
    }

    #[inline]
    pub fn set_a(&mut self, val: u8) {
        self.bank_mut(self.af_bank).a = val;
    }

    #[inline]
    pub fn f(&self) -> u8 {
        self.bank(self.af_bank).f
    }

    #[inline]
    pub fn set_f(&mut self, val: u8) {
        self.bank_mut(self.af_bank).f = val;
    }

    /// Read an 8-bit register from the live bank
    pub fn get8(&self, reg: Reg8) -> u8 {
        let gp = self.bank(self.gp_bank);
        match reg {
            Reg8::A => self.a(),
            Reg8::B => gp.b,
            Reg8::C => gp.c,
            Reg8::D => gp.d,
            Reg8::E => gp.e,
            Reg8::H => gp.h,
            Reg8::L => gp.l,
            Reg8::IXH => (self.ix >> 8) as u8,
            Reg8::IXL => self.ix as u8,
            Reg8::IYH => (self.iy >> 8) as u8,
            Reg8::IYL => self.iy as u8,
        }
    }

    /// Write an 8-bit register in the live bank
    pub fn set8(&mut self, reg: Reg8, val: u8) {
        let bank = self.gp_bank;
        match reg {
            Reg8::A => self.set_a(val),
            Reg8::B => self.bank_mut(bank).b = val,
            Reg8::C => self.bank_mut(bank).c = val,
            Reg8::D => self.bank_mut(bank).d = val,
            Reg8::E => self.bank_mut(bank).e = val,
            Reg8::H => self.bank_mut(bank).h = val,
            Reg8::L => self.bank_mut(bank).l = val,
            Reg8::IXH => self.ix = (self.ix & 0x00FF) | ((val as u16) << 8),
            Reg8::IXL => self.ix = (self.ix & 0xFF00) | val as u16,
            Reg8::IYH => self.iy = (self.iy & 0x00FF) | ((val as u16) << 8),
            Reg8::IYL => self.iy = (self.iy & 0xFF00) | val as u16,
        }
    }

    // ========== 16-bit Access ==========

    /// Read a register pair; the first named register is the high byte
    pub fn pair(&self, pair: RegPair) -> u16 {
        let hi_lo = |hi: u8, lo: u8| ((hi as u16) << 8) | lo as u16;
        let gp = self.bank(self.gp_bank);
        match pair {
            RegPair::AF => hi_lo(self.a(), self.f()),
            RegPair::BC => hi_lo(gp.b, gp.c),
            RegPair::DE => hi_lo(gp.d, gp.e),
            RegPair::HL => hi_lo(gp.h, gp.l),
            RegPair::SP => self.sp,
            RegPair::IX => self.ix,
            RegPair::IY => self.iy,
        }
    }

    /// Write a register pair; the high byte goes to the first named register
    pub fn set_pair(&mut self, pair: RegPair, val: u16) {
        let hi = (val >> 8) as u8;
        let lo = val as u8;
        let bank = self.gp_bank;
        match pair {
            RegPair::AF => {
                let af = self.bank_mut(self.af_bank);
                af.a = hi;
                af.f = lo;
            }
            RegPair::BC => {
                let gp = self.bank_mut(bank);
                gp.b = hi;
                gp.c = lo;
            }
            RegPair::DE => {
                let gp = self.bank_mut(bank);
                gp.d = hi;
                gp.e = lo;
            }
            RegPair::HL => {
                let gp = self.bank_mut(bank);
                gp.h = hi;
                gp.l = lo;
            }
            RegPair::SP => self.sp = val,
            RegPair::IX => self.ix = val,
            RegPair::IY => self.iy = val,
        }
    }

    /// Read a pair from the inactive bank (AF', BC', DE', HL')
    ///
    /// SP, IX and IY have no shadow and read their live value.
    pub fn shadow_pair(&self, pair: RegPair) -> u16 {
        let hi_lo = |hi: u8, lo: u8| ((hi as u16) << 8) | lo as u16;
        let af = self.bank(self.af_bank.other());
        let gp = self.bank(self.gp_bank.other());
        match pair {
            RegPair::AF => hi_lo(af.a, af.f),
            RegPair::BC => hi_lo(gp.b, gp.c),
            RegPair::DE => hi_lo(gp.d, gp.e),
            RegPair::HL => hi_lo(gp.h, gp.l),
            other => self.pair(other),
        }
    }

    // ========== Flags ==========

    #[inline]
    pub fn flag(&self, mask: u8) -> bool {
        self.f() & mask != 0
    }

    #[inline]
    pub fn set_flag(&mut self, mask: u8, val: bool) {
        let f = self.f();
        self.set_f(if val { f | mask } else { f & !mask });
    }

    #[inline]
    pub fn flag_c(&self) -> bool {
        self.flag(flags::C)
    }

    #[inline]
    pub fn flag_z(&self) -> bool {
        self.flag(flags::Z)
    }

    #[inline]
    pub fn flag_s(&self) -> bool {
        self.flag(flags::S)
    }

    #[inline]
    pub fn flag_h(&self) -> bool {
        self.flag(flags::H)
    }

    #[inline]
    pub fn flag_pv(&self) -> bool {
        self.flag(flags::PV)
    }

    #[inline]
    pub fn flag_n(&self) -> bool {
        self.flag(flags::N)
    }

    // ========== Exchange ==========

    /// EX AF,AF'
    pub fn ex_af(&mut self) {
        self.af_bank = self.af_bank.other();
    }

    /// EXX: swap BC, DE, HL with their shadows
    pub fn exx(&mut self) {
        self.gp_bank = self.gp_bank.other();
    }

    /// EX DE,HL within the live bank
    pub fn ex_de_hl(&mut self) {
        let de = self.pair(RegPair::DE);
        let hl = self.pair(RegPair::HL);
        self.set_pair(RegPair::DE, hl);
        self.set_pair(RegPair::HL, de);
    }

    /// Increment the 7-bit refresh counter, preserving bit 7
    #[inline]
    pub fn bump_r(&mut self) {
        self.r = (self.r & 0x80) | (self.r.wrapping_add(1) & 0x7F);
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new(0xE000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_endianness() {
        let mut regs = RegisterFile::default();
        regs.set_pair(RegPair::BC, 0x1234);
        assert_eq!(regs.pair(RegPair::BC), 0x1234);
        assert_eq!(regs.get8(Reg8::B), 0x12);
        assert_eq!(regs.get8(Reg8::C), 0x34);
    }

    #[test]
    fn test_af_pair_maps_a_high() {
        let mut regs = RegisterFile::default();
        regs.set_pair(RegPair::AF, 0x41C3);
        assert_eq!(regs.a(), 0x41);
        assert_eq!(regs.f(), 0xC3);
    }

    #[test]
    fn test_index_halves() {
        let mut regs = RegisterFile::default();
        regs.ix = 0xABCD;
        assert_eq!(regs.get8(Reg8::IXH), 0xAB);
        assert_eq!(regs.get8(Reg8::IXL), 0xCD);
        regs.set8(Reg8::IYH, 0x12);
        regs.set8(Reg8::IYL, 0x34);
        assert_eq!(regs.iy, 0x1234);
    }

    #[test]
    fn test_reset_values() {
        let mut regs = RegisterFile::default();
        regs.set_pair(RegPair::HL, 0x5555);
        regs.pc = 0x4000;
        regs.iff1 = true;
        regs.exx();
        regs.reset(0xE000);
        assert_eq!(regs.pc, 0);
        assert_eq!(regs.sp, 0xE000);
        assert_eq!(regs.pair(RegPair::AF), 0xFFFF);
        assert_eq!(regs.shadow_pair(RegPair::AF), 0xFFFF);
        assert_eq!(regs.pair(RegPair::HL), 0);
        assert_eq!(regs.gp_bank(), Bank::Main);
        assert!(!regs.iff1);
    }

    #[test]
    fn test_exx_switches_banks_not_values() {
        let mut regs = RegisterFile::default();
        regs.set_pair(RegPair::BC, 0x1111);
        regs.set_pair(RegPair::HL, 0x3333);
        regs.exx();
        assert_eq!(regs.gp_bank(), Bank::Alternate);
        assert_eq!(regs.pair(RegPair::BC), 0);
        assert_eq!(regs.shadow_pair(RegPair::BC), 0x1111);
        regs.set_pair(RegPair::BC, 0x2222);
        regs.exx();
        assert_eq!(regs.pair(RegPair::BC), 0x1111);
        assert_eq!(regs.pair(RegPair::HL), 0x3333);
        assert_eq!(regs.alternate.b, 0x22);
    }

    #[test]
    fn test_ex_af_is_independent_of_exx() {
        let mut regs = RegisterFile::default();
        regs.set_a(0x10);
        regs.ex_af();
        regs.set_a(0x20);
        regs.exx();
        assert_eq!(regs.a(), 0x20);
        regs.ex_af();
        assert_eq!(regs.a(), 0x10);
    }

    #[test]
    fn test_ex_de_hl() {
        let mut regs = RegisterFile::default();
        regs.set_pair(RegPair::DE, 0x1234);
        regs.set_pair(RegPair::HL, 0xABCD);
        regs.ex_de_hl();
        assert_eq!(regs.pair(RegPair::DE), 0xABCD);
        assert_eq!(regs.pair(RegPair::HL), 0x1234);
    }

    #[test]
    fn test_bump_r_preserves_bit7() {
        let mut regs = RegisterFile::default();
        regs.r = 0xFF;
        regs.bump_r();
        assert_eq!(regs.r, 0x80);
        regs.r = 0x05;
        regs.bump_r();
        assert_eq!(regs.r, 0x06);
    }

    #[test]
    fn test_flag_helpers() {
        let mut regs = RegisterFile::default();
        regs.set_f(0);
        regs.set_flag(flags::C, true);
        regs.set_flag(flags::Z, true);
        assert!(regs.flag_c());
        assert!(regs.flag_z());
        assert!(!regs.flag_s());
        regs.set_flag(flags::C, false);
        assert_eq!(regs.f(), flags::Z);
    }
}
