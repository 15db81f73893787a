/*
    z80core: ZiLOG Z80 processor emulation engine.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! A home of the [Z80] Cpu implementation.
mod execute;
mod internal;
pub mod ops;

use core::mem::swap;
use log::debug;
#[cfg(feature = "serde")] use serde::{Serialize, Deserialize};
#[cfg(feature = "rand")] use rand::RngCore;

use crate::cpu::*;
use crate::host::Bus;
use crate::CpuError;

const SP_RESET: u16 = 0xFFFF;
const R_COUNTER_MASK: u8 = 0x7F;

/// The Z80 processor state with the eager Flags computation.
///
/// Every instance is independent: the engine owns no memory, all bus accesses go through
/// the [Bus] passed to the executing methods.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Z80 {
    af: RegisterPair,
    af_alt: RegisterPair,
    regs: GeneralRegisters,
    regs_alt: GeneralRegisters,
    index: IndexRegisters,
    sp: RegisterPair,
    pc: RegisterPair,
    i: u8,
    r: u8,
    iff1: bool,
    iff2: bool,
    im: InterruptMode,
    halt: bool,
    ts: i32,
}

impl Default for Z80 {
    fn default() -> Self {
        Z80::new()
    }
}

impl Z80 {
    /// Creates a new instance of Z80 with the state just after `RESET` and all the general
    /// purpose registers cleared.
    pub fn new() -> Self {
        Z80 {
            af: RegisterPair::default(),
            af_alt: RegisterPair::default(),
            regs: GeneralRegisters::default(),
            regs_alt: GeneralRegisters::default(),
            index: IndexRegisters::default(),
            sp: RegisterPair::from(SP_RESET),
            pc: RegisterPair::default(),
            i: 0,
            r: 0,
            iff1: false,
            iff2: false,
            im: InterruptMode::Mode0,
            halt: false,
            ts: 0,
        }
    }

    /// Fills the general purpose registers with values from `rng` and resets the control
    /// registers, emulating the undefined power-on state of the real chip.
    #[cfg(feature = "rand")]
    pub fn reset_with_rng<R: RngCore + ?Sized>(&mut self, rng: &mut R) {
        for pair in [&mut self.af, &mut self.af_alt,
                     &mut self.regs.bc, &mut self.regs.de, &mut self.regs.hl,
                     &mut self.regs_alt.bc, &mut self.regs_alt.de, &mut self.regs_alt.hl,
                     &mut self.index.ix, &mut self.index.iy] {
            pair.set16(rng.next_u32() as u16);
        }
        self.control_reset();
    }

    /// Swaps the `AF` register with its alternative counterpart `AF'`.
    #[inline]
    pub fn ex_af_af(&mut self) {
        swap(&mut self.af, &mut self.af_alt);
    }

    /// Swaps the `BC`, `DE` and `HL` registers with their alternative counterparts.
    #[inline]
    pub fn exx(&mut self) {
        swap(&mut self.regs, &mut self.regs_alt);
    }

    /// Decodes the instruction at the current `PC` without executing it.
    pub fn peek_instruction<B: Bus + ?Sized>(&self, bus: &mut B) -> Result<Decoded, CpuError> {
        decode_at(bus, self.pc.get16())
    }

    fn control_reset(&mut self) {
        self.pc.set16(0);
        self.sp.set16(SP_RESET);
        self.i = 0;
        self.r = 0;
        self.iff1 = false;
        self.iff2 = false;
        self.im = InterruptMode::Mode0;
        self.halt = false;
    }
}

impl Cpu for Z80 {
    fn reset(&mut self) {
        debug!("reset");
        #[cfg(all(feature = "rand", feature = "std"))]
        {
            self.reset_with_rng(&mut rand::thread_rng());
        }
        #[cfg(not(all(feature = "rand", feature = "std")))]
        {
            self.control_reset();
        }
    }

    #[inline]
    fn get_pc(&self) -> u16 {
        self.pc.get16()
    }

    #[inline]
    fn set_pc(&mut self, pc: u16) {
        self.pc.set16(pc)
    }

    #[inline]
    fn get_sp(&self) -> u16 {
        self.sp.get16()
    }

    #[inline]
    fn set_sp(&mut self, sp: u16) {
        self.sp.set16(sp)
    }

    #[inline]
    fn get_acc(&self) -> u8 {
        self.af.get8hi()
    }

    #[inline]
    fn set_acc(&mut self, val: u8) {
        self.af.set8hi(val)
    }

    #[inline(always)]
    fn get_flags(&self) -> CpuFlags {
        CpuFlags::from_bits_retain(self.af.get8lo())
    }

    #[inline(always)]
    fn set_flags(&mut self, flags: CpuFlags) {
        self.af.set8lo(flags.bits())
    }

    #[inline]
    fn inc_r(&mut self) {
        self.r = (self.r & !R_COUNTER_MASK) | (self.r.wrapping_add(1) & R_COUNTER_MASK);
    }

    #[inline]
    fn get_r(&self) -> u8 {
        self.r
    }

    #[inline]
    fn set_r(&mut self, r: u8) {
        self.r = r
    }

    #[inline]
    fn get_i(&self) -> u8 {
        self.i
    }

    #[inline]
    fn set_i(&mut self, i: u8) {
        self.i = i
    }

    #[inline]
    fn get_iffs(&self) -> (bool, bool) {
        (self.iff1, self.iff2)
    }

    #[inline]
    fn set_iffs(&mut self, iff1: bool, iff2: bool) {
        self.iff1 = iff1;
        self.iff2 = iff2;
    }

    #[inline]
    fn get_im(&self) -> InterruptMode {
        self.im
    }

    #[inline]
    fn set_im(&mut self, im: InterruptMode) {
        self.im = im
    }

    #[inline]
    fn set_halt_state(&mut self, halt: bool) {
        self.halt = halt
    }

    #[inline]
    fn is_halted(&self) -> bool {
        self.halt
    }

    fn get_reg(&self, reg: Reg) -> u8 {
        match reg {
            Reg::B    => self.regs.bc.get8hi(),
            Reg::C    => self.regs.bc.get8lo(),
            Reg::D    => self.regs.de.get8hi(),
            Reg::E    => self.regs.de.get8lo(),
            Reg::H    => self.regs.hl.get8hi(),
            Reg::L    => self.regs.hl.get8lo(),
            Reg::F    => self.af.get8lo(),
            Reg::A    => self.af.get8hi(),
            Reg::AltB => self.regs_alt.bc.get8hi(),
            Reg::AltC => self.regs_alt.bc.get8lo(),
            Reg::AltD => self.regs_alt.de.get8hi(),
            Reg::AltE => self.regs_alt.de.get8lo(),
            Reg::AltH => self.regs_alt.hl.get8hi(),
            Reg::AltL => self.regs_alt.hl.get8lo(),
            Reg::AltF => self.af_alt.get8lo(),
            Reg::AltA => self.af_alt.get8hi(),
            Reg::XH   => self.index.ix.get8hi(),
            Reg::XL   => self.index.ix.get8lo(),
            Reg::YH   => self.index.iy.get8hi(),
            Reg::YL   => self.index.iy.get8lo(),
            Reg::SPH  => self.sp.get8hi(),
            Reg::SPL  => self.sp.get8lo(),
            Reg::PCH  => self.pc.get8hi(),
            Reg::PCL  => self.pc.get8lo(),
            Reg::I    => self.i,
            Reg::R    => self.r,
            Reg::ImIff => pack_im_iff(self.iff1, self.iff2, self.im),
        }
    }

    fn set_reg(&mut self, reg: Reg, val: u8) {
        match reg {
            Reg::B    => self.regs.bc.set8hi(val),
            Reg::C    => self.regs.bc.set8lo(val),
            Reg::D    => self.regs.de.set8hi(val),
            Reg::E    => self.regs.de.set8lo(val),
            Reg::H    => self.regs.hl.set8hi(val),
            Reg::L    => self.regs.hl.set8lo(val),
            Reg::F    => self.af.set8lo(val),
            Reg::A    => self.af.set8hi(val),
            Reg::AltB => self.regs_alt.bc.set8hi(val),
            Reg::AltC => self.regs_alt.bc.set8lo(val),
            Reg::AltD => self.regs_alt.de.set8hi(val),
            Reg::AltE => self.regs_alt.de.set8lo(val),
            Reg::AltH => self.regs_alt.hl.set8hi(val),
            Reg::AltL => self.regs_alt.hl.set8lo(val),
            Reg::AltF => self.af_alt.set8lo(val),
            Reg::AltA => self.af_alt.set8hi(val),
            Reg::XH   => self.index.ix.set8hi(val),
            Reg::XL   => self.index.ix.set8lo(val),
            Reg::YH   => self.index.iy.set8hi(val),
            Reg::YL   => self.index.iy.set8lo(val),
            Reg::SPH  => self.sp.set8hi(val),
            Reg::SPL  => self.sp.set8lo(val),
            Reg::PCH  => self.pc.set8hi(val),
            Reg::PCL  => self.pc.set8lo(val),
            Reg::I    => self.i = val,
            Reg::R    => self.r = val,
            Reg::ImIff => match unpack_im_iff(val) {
                Ok((iff1, iff2, im)) => {
                    self.iff1 = iff1;
                    self.iff2 = iff2;
                    self.im = im;
                }
                Err(err) => panic!("{}", err)
            }
        }
    }

    #[inline]
    fn set_tstate_budget(&mut self, ts: i32) {
        self.ts = ts
    }

    #[inline]
    fn get_tstate_budget(&self) -> i32 {
        self.ts
    }

    fn interrupt<B: Bus + ?Sized>(&mut self, bus: &mut B) -> bool {
        self.irq(bus)
    }

    fn non_maskable_interrupt<B: Bus + ?Sized>(&mut self, bus: &mut B) {
        self.nmi(bus)
    }

    fn execute_next_instruction<B: Bus + ?Sized>(&mut self, bus: &mut B) -> Result<(), CpuError> {
        self.step(bus)
    }
}
