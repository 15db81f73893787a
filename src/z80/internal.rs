/*
    z80core: ZiLOG Z80 processor emulation engine.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! Private bus cycle, register selection and interrupt entry methods of [Z80].
use log::debug;
use crate::host::{Bus, cycles::*};
use crate::{IRQ_RESTART, NMI_RESTART};
use super::*;

/// Constants for internal cycles.
pub(super) mod cycles {
    pub const NO_MREQ_X1: i32 = 1;
    pub const NO_MREQ_X2: i32 = 2;
    pub const NO_MREQ_X4: i32 = 4;
    pub const NO_MREQ_X5: i32 = 5;
    pub const NO_MREQ_X7: i32 = 7;
}
use cycles::*;

impl Z80 {
    /// Decreases the T-state budget.
    #[inline(always)]
    pub(super) fn charge(&mut self, ts: i32) {
        self.ts = self.ts.saturating_sub(ts);
    }

    #[inline(always)]
    pub(super) fn flags(&self) -> CpuFlags {
        CpuFlags::from_bits_retain(self.af.get8lo())
    }

    #[inline(always)]
    pub(super) fn acc(&self) -> u8 {
        self.af.get8hi()
    }

    #[inline(always)]
    pub(super) fn set_acc_flags(&mut self, acc: u8, flags: CpuFlags) {
        self.af.set(acc, flags.bits());
    }

    /// An M1 cycle: reads the op-code at `PC`, increments `PC` and `R`.
    #[inline]
    pub(super) fn fetch_opcode<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u8 {
        let code = bus.read_byte(self.pc.get16());
        self.pc.inc16();
        self.inc_r();
        self.charge(M1_CYCLE);
        code
    }

    /// Reads an immediate byte or a displacement at `PC` and increments `PC`.
    #[inline]
    pub(super) fn fetch_byte<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u8 {
        let val = bus.read_byte(self.pc.get16());
        self.pc.inc16();
        self.charge(MEMRW_CYCLE);
        val
    }

    #[inline]
    pub(super) fn fetch_word<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch_byte(bus);
        let hi = self.fetch_byte(bus);
        u16::from_le_bytes([lo, hi])
    }

    /// Adds a signed displacement to `PC`.
    #[inline]
    pub(super) fn jump_relative(&mut self, d: u8) {
        self.pc.set16(self.pc.get16().wrapping_add(d as i8 as i16 as u16));
    }

    #[inline]
    pub(super) fn read_mem<B: Bus + ?Sized>(&mut self, bus: &mut B, addr: u16) -> u8 {
        self.charge(MEMRW_CYCLE);
        bus.read_byte(addr)
    }

    #[inline]
    pub(super) fn write_mem<B: Bus + ?Sized>(&mut self, bus: &mut B, addr: u16, val: u8) {
        self.charge(MEMRW_CYCLE);
        bus.write_byte(addr, val)
    }

    #[inline]
    pub(super) fn read_mem16<B: Bus + ?Sized>(&mut self, bus: &mut B, addr: u16) -> u16 {
        self.charge(2 * MEMRW_CYCLE);
        bus.read_word(addr)
    }

    #[inline]
    pub(super) fn write_mem16<B: Bus + ?Sized>(&mut self, bus: &mut B, addr: u16, val: u16) {
        self.charge(2 * MEMRW_CYCLE);
        bus.write_word(addr, val)
    }

    #[inline]
    pub(super) fn read_io<B: Bus + ?Sized>(&mut self, bus: &mut B, port: u16) -> u8 {
        self.charge(IO_CYCLE);
        bus.read_io(port)
    }

    #[inline]
    pub(super) fn write_io<B: Bus + ?Sized>(&mut self, bus: &mut B, port: u16, val: u8) {
        self.charge(IO_CYCLE);
        bus.write_io(port, val)
    }

    /// Pushes `val` on the stack, the most significant byte first.
    pub(super) fn push16<B: Bus + ?Sized>(&mut self, bus: &mut B, val: u16) {
        let [lo, hi] = val.to_le_bytes();
        self.sp.dec16();
        self.write_mem(bus, self.sp.get16(), hi);
        self.sp.dec16();
        self.write_mem(bus, self.sp.get16(), lo);
    }

    pub(super) fn pop16<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u16 {
        let lo = self.read_mem(bus, self.sp.get16());
        self.sp.inc16();
        let hi = self.read_mem(bus, self.sp.get16());
        self.sp.inc16();
        u16::from_le_bytes([lo, hi])
    }

    /// Returns `HL`, `IX` or `IY` depending on the index mode.
    #[inline]
    pub(super) fn hl_ref(&self, prefix: Option<Prefix>) -> &RegisterPair {
        match prefix {
            None => &self.regs.hl,
            Some(Prefix::Xdd) => &self.index.ix,
            Some(Prefix::Yfd) => &self.index.iy,
        }
    }

    #[inline]
    pub(super) fn hl_mut(&mut self, prefix: Option<Prefix>) -> &mut RegisterPair {
        match prefix {
            None => &mut self.regs.hl,
            Some(Prefix::Xdd) => &mut self.index.ix,
            Some(Prefix::Yfd) => &mut self.index.iy,
        }
    }

    /// Returns an 8-bit register, `H` and `L` mean the halves of `IX` or `IY` in the index mode.
    pub(super) fn get_reg8(&self, reg: Reg8, prefix: Option<Prefix>) -> u8 {
        match reg {
            Reg8::B => self.regs.bc.get8hi(),
            Reg8::C => self.regs.bc.get8lo(),
            Reg8::D => self.regs.de.get8hi(),
            Reg8::E => self.regs.de.get8lo(),
            Reg8::H => self.hl_ref(prefix).get8hi(),
            Reg8::L => self.hl_ref(prefix).get8lo(),
            Reg8::A => self.af.get8hi(),
        }
    }

    pub(super) fn set_reg8(&mut self, reg: Reg8, prefix: Option<Prefix>, val: u8) {
        match reg {
            Reg8::B => self.regs.bc.set8hi(val),
            Reg8::C => self.regs.bc.set8lo(val),
            Reg8::D => self.regs.de.set8hi(val),
            Reg8::E => self.regs.de.set8lo(val),
            Reg8::H => self.hl_mut(prefix).set8hi(val),
            Reg8::L => self.hl_mut(prefix).set8lo(val),
            Reg8::A => self.af.set8hi(val),
        }
    }

    pub(super) fn get_reg16(&self, rp: Reg16, prefix: Option<Prefix>) -> u16 {
        match rp {
            Reg16::BC => self.regs.bc.get16(),
            Reg16::DE => self.regs.de.get16(),
            Reg16::HL => self.hl_ref(prefix).get16(),
            Reg16::SP => self.sp.get16(),
        }
    }

    pub(super) fn set_reg16(&mut self, rp: Reg16, prefix: Option<Prefix>, val: u16) {
        match rp {
            Reg16::BC => self.regs.bc.set16(val),
            Reg16::DE => self.regs.de.set16(val),
            Reg16::HL => self.hl_mut(prefix).set16(val),
            Reg16::SP => self.sp.set16(val),
        }
    }

    pub(super) fn get_stk_reg16(&self, rp: StkReg16, prefix: Option<Prefix>) -> u16 {
        match rp {
            StkReg16::BC => self.regs.bc.get16(),
            StkReg16::DE => self.regs.de.get16(),
            StkReg16::HL => self.hl_ref(prefix).get16(),
            StkReg16::AF => self.af.get16(),
        }
    }

    pub(super) fn set_stk_reg16(&mut self, rp: StkReg16, prefix: Option<Prefix>, val: u16) {
        match rp {
            StkReg16::BC => self.regs.bc.set16(val),
            StkReg16::DE => self.regs.de.set16(val),
            StkReg16::HL => self.hl_mut(prefix).set16(val),
            StkReg16::AF => self.af.set16(val),
        }
    }

    /// Returns the address of the memory operand: `HL` or `IX+d`/`IY+d` in the index mode.
    ///
    /// In the index mode the displacement is fetched and `internal` cycles are added.
    pub(super) fn mem_operand_addr<B: Bus + ?Sized>(
            &mut self,
            bus: &mut B,
            prefix: Option<Prefix>,
            internal: i32
        ) -> u16
    {
        match prefix {
            None => self.regs.hl.get16(),
            Some(_) => {
                let d = self.fetch_byte(bus);
                self.charge(internal);
                self.hl_ref(prefix).get16().wrapping_add(d as i8 as i16 as u16)
            }
        }
    }

    /// Reads the value of an 8-bit operand. In the index mode the memory operand is `(IX+d)`
    /// or `(IY+d)`, and `H`/`L` refer to the index register halves.
    pub(super) fn read_arg8<B: Bus + ?Sized>(&mut self, bus: &mut B, arg: Arg8, prefix: Option<Prefix>) -> u8 {
        match arg {
            Arg8::Reg(reg) => self.get_reg8(reg, prefix),
            Arg8::MemHl => {
                let addr = self.mem_operand_addr(bus, prefix, NO_MREQ_X5);
                self.read_mem(bus, addr)
            }
        }
    }

    /// Applies a read-modify-write operation to an 8-bit operand.
    pub(super) fn modify_arg8<B, F>(&mut self, bus: &mut B, arg: Arg8, prefix: Option<Prefix>, op: F)
        where B: Bus + ?Sized,
              F: FnOnce(u8, CpuFlags) -> (u8, CpuFlags)
    {
        match arg {
            Arg8::Reg(reg) => {
                let (res, flags) = op(self.get_reg8(reg, prefix), self.flags());
                self.set_reg8(reg, prefix, res);
                self.set_flags(flags);
            }
            Arg8::MemHl => {
                let addr = self.mem_operand_addr(bus, prefix, NO_MREQ_X5);
                let val = self.read_mem(bus, addr);
                self.charge(NO_MREQ_X1);
                let (res, flags) = op(val, self.flags());
                self.write_mem(bus, addr, res);
                self.set_flags(flags);
            }
        }
    }

    /// Accepts a maskable interrupt if `IFF1` is set.
    pub(super) fn irq<B: Bus + ?Sized>(&mut self, bus: &mut B) -> bool {
        if !self.iff1 {
            debug!("interrupt rejected at {:04x}", self.pc.get16());
            return false
        }
        debug!("interrupt accepted at {:04x} in {:?}", self.pc.get16(), self.im);
        self.iff1 = false;
        self.iff2 = false;
        self.halt = false;
        self.inc_r();
        self.charge(IRQ_ACK_CYCLE + NO_MREQ_X1);
        self.push16(bus, self.pc.get16());
        let pc = match self.im {
            InterruptMode::Mode0|InterruptMode::Mode1 => IRQ_RESTART,
            InterruptMode::Mode2 => {
                let vaddr = u16::from_le_bytes([u8::MAX, self.i]);
                self.read_mem16(bus, vaddr)
            }
        };
        self.pc.set16(pc);
        true
    }

    pub(super) fn nmi<B: Bus + ?Sized>(&mut self, bus: &mut B) {
        debug!("non-maskable interrupt at {:04x}", self.pc.get16());
        self.iff1 = false;
        self.halt = false;
        self.inc_r();
        self.charge(M1_CYCLE + NO_MREQ_X1);
        self.push16(bus, self.pc.get16());
        self.pc.set16(NMI_RESTART);
    }
}

